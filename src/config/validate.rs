use anyhow::{Result, bail};

use super::{AppConfig, MailTransport, defaults};

const ADMIN_PASSWORD_MIN_LEN: usize = 8;

pub fn validate(cfg: &AppConfig) -> Result<()> {
    validate_for(cfg, !cfg!(debug_assertions))
}

/// Release builds additionally refuse the development JWT secret.
fn validate_for(cfg: &AppConfig, release: bool) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if cfg.general.host.trim().is_empty() {
        errors.push("general.host must not be empty".to_string());
    }

    if !cfg.general.public_url.starts_with("http://")
        && !cfg.general.public_url.starts_with("https://")
    {
        errors.push("general.public_url must be an http(s) URL".to_string());
    }

    if cfg.database.url.trim().is_empty() {
        errors.push("database.url must not be empty".to_string());
    }

    if cfg.database.min_idle > cfg.database.max_connections {
        errors.push(format!(
            "database.min_idle ({}) must be <= database.max_connections ({})",
            cfg.database.min_idle, cfg.database.max_connections
        ));
    }

    let auth = &cfg.auth;
    if auth.jwt_secret.trim().is_empty() {
        errors.push("auth.jwt_secret must not be empty".to_string());
    } else if release && auth.jwt_secret == defaults::DEFAULT_JWT_SECRET {
        errors.push("auth.jwt_secret must be set in release builds".to_string());
    }

    for (name, ttl) in [
        ("auth.access_token_ttl_secs", auth.access_token_ttl_secs),
        ("auth.refresh_token_ttl_secs", auth.refresh_token_ttl_secs),
        ("auth.email_token_ttl_secs", auth.email_token_ttl_secs),
        ("auth.reset_token_ttl_secs", auth.reset_token_ttl_secs),
    ] {
        if ttl == 0 {
            errors.push(format!("{name} must be > 0"));
        }
    }

    if auth.refresh_token_ttl_secs <= auth.access_token_ttl_secs {
        errors.push(
            "auth.refresh_token_ttl_secs must be greater than auth.access_token_ttl_secs"
                .to_string(),
        );
    }

    match (&auth.admin_email, &auth.admin_password) {
        (Some(email), Some(password)) => {
            if !email_address::EmailAddress::is_valid(email.trim()) {
                errors.push("auth.admin_email must be a valid email address".to_string());
            }
            if password.chars().count() < ADMIN_PASSWORD_MIN_LEN {
                errors.push(format!(
                    "auth.admin_password must be at least {ADMIN_PASSWORD_MIN_LEN} characters"
                ));
            }
        }
        (None, None) => {}
        _ => errors.push(
            "auth.admin_email and auth.admin_password must be set together".to_string(),
        ),
    }

    if cfg.mail.transport == MailTransport::Http && cfg.mail.api_url.is_none() {
        errors.push("mail.api_url is required when mail.transport = http".to_string());
    }

    if cfg.mail.queue_capacity == 0 {
        errors.push("mail.queue_capacity must be > 0".to_string());
    }

    if cfg.mail.max_attempts == 0 {
        errors.push("mail.max_attempts must be > 0".to_string());
    }

    if cfg.avatar.dir.trim().is_empty() {
        errors.push("avatar.dir must not be empty".to_string());
    }

    if cfg.avatar.max_bytes == 0 {
        errors.push("avatar.max_bytes must be > 0".to_string());
    }

    if errors.is_empty() {
        return Ok(());
    }

    bail!("invalid app config:\n- {}", errors.join("\n- "))
}

#[cfg(test)]
mod tests {
    use super::{validate, validate_for};
    use crate::config::{AppConfig, MailTransport};

    #[test]
    fn defaults_are_valid_in_debug_builds() {
        validate_for(&AppConfig::default(), false).expect("default config should validate");
    }

    #[test]
    fn release_builds_reject_the_development_secret() {
        let message = validate_for(&AppConfig::default(), true)
            .expect_err("config should fail")
            .to_string();
        assert!(message.contains("auth.jwt_secret"));
    }

    #[test]
    fn defaults_carry_no_admin_credentials() {
        let mut cfg = AppConfig::default();
        cfg.auth.jwt_secret = "a-real-production-secret".to_string();

        assert_eq!(cfg.admin_seed(), None);
        validate_for(&cfg, true).expect("secret-only release config should validate");
    }

    #[test]
    fn admin_credentials_must_come_in_pairs() {
        let mut cfg = AppConfig::default();
        cfg.auth.admin_email = Some("root@example.com".to_string());

        let message = validate_for(&cfg, false).expect_err("config should fail").to_string();
        assert!(message.contains("must be set together"));

        cfg.auth.admin_password = Some("short".to_string());
        let message = validate_for(&cfg, false).expect_err("config should fail").to_string();
        assert!(message.contains("auth.admin_password"));

        cfg.auth.admin_password = Some("long-enough-pass".to_string());
        validate_for(&cfg, false).expect("paired credentials should validate");
        assert_eq!(
            cfg.admin_seed(),
            Some(("root@example.com", "long-enough-pass"))
        );
    }

    #[test]
    fn collects_every_problem() {
        let mut cfg = AppConfig::default();
        cfg.general.host = " ".to_string();
        cfg.auth.jwt_secret = String::new();
        cfg.mail.transport = MailTransport::Http;
        cfg.database.min_idle = 50;

        let message = validate(&cfg).expect_err("config should fail").to_string();

        assert!(message.contains("general.host"));
        assert!(message.contains("auth.jwt_secret"));
        assert!(message.contains("mail.api_url"));
        assert!(message.contains("database.min_idle"));
    }

    #[test]
    fn rejects_refresh_ttl_not_longer_than_access_ttl() {
        let mut cfg = AppConfig::default();
        cfg.auth.refresh_token_ttl_secs = cfg.auth.access_token_ttl_secs;

        let message = validate(&cfg).expect_err("config should fail").to_string();
        assert!(message.contains("auth.refresh_token_ttl_secs"));
    }
}
