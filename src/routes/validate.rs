use email_address::EmailAddress;

use crate::error::AppError;

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 14;
pub const USERNAME_MAX_LEN: usize = 50;
pub const NAME_MAX_LEN: usize = 50;
pub const PHONE_MAX_LEN: usize = 20;

pub fn email(value: &str) -> Result<(), AppError> {
    if EmailAddress::is_valid(value.trim()) {
        Ok(())
    } else {
        Err(AppError::bad_request("Invalid email address"))
    }
}

pub fn password(value: &str) -> Result<(), AppError> {
    let len = value.chars().count();
    if (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!(
            "Password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )))
    }
}

pub fn text(field: &str, value: &str, max_len: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(AppError::bad_request(format!("{field} must not be empty")));
    }
    if len > max_len {
        return Err(AppError::bad_request(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(())
}

pub fn username(value: &str) -> Result<(), AppError> {
    text("username", value, USERNAME_MAX_LEN)
}

#[cfg(test)]
mod tests {
    use super::{email, password, username};

    #[test]
    fn password_length_is_bounded() {
        assert!(password("12345").is_err());
        assert!(password("secret1").is_ok());
        assert!(password("12345678901234").is_ok());
        assert!(password("123456789012345").is_err());
    }

    #[test]
    fn rejects_malformed_email_and_blank_username() {
        assert!(email("a@x.com").is_ok());
        assert!(email("not-an-email").is_err());
        assert!(username("alice").is_ok());
        assert!(username("   ").is_err());
        assert!(username(&"x".repeat(51)).is_err());
    }
}
