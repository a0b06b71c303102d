use std::fmt;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;

/// Purpose a token was issued for, carried in the `scope` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
    #[serde(rename = "email_token")]
    EmailConfirmation,
    #[serde(rename = "reset_password")]
    PasswordReset,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
            TokenKind::EmailConfirmation => "email_token",
            TokenKind::PasswordReset => "reset_password",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the user the token was issued to.
    pub sub: String,
    pub scope: TokenKind,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("expected a {expected} but got a {found}")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("token is invalid: {0}")]
    Invalid(String),

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

#[derive(Clone)]
pub struct JwtKeys {
    pub enc: EncodingKey,
    pub dec: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret),
            dec: DecodingKey::from_secret(secret),
        }
    }
}

pub fn now_unix() -> usize {
    chrono::Utc::now().timestamp().max(0) as usize
}

/// Issues and verifies every token kind with one HS256 secret.
#[derive(Clone)]
pub struct TokenService {
    keys: JwtKeys,
    access_ttl_secs: usize,
    refresh_ttl_secs: usize,
    email_ttl_secs: usize,
    reset_ttl_secs: usize,
}

impl TokenService {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self {
            keys: JwtKeys::from_secret(cfg.jwt_secret.as_bytes()),
            access_ttl_secs: cfg.access_token_ttl_secs as usize,
            refresh_ttl_secs: cfg.refresh_token_ttl_secs as usize,
            email_ttl_secs: cfg.email_token_ttl_secs as usize,
            reset_ttl_secs: cfg.reset_token_ttl_secs as usize,
        }
    }

    pub fn access_ttl_secs(&self) -> usize {
        self.access_ttl_secs
    }

    fn ttl_for(&self, kind: TokenKind) -> usize {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
            TokenKind::EmailConfirmation => self.email_ttl_secs,
            TokenKind::PasswordReset => self.reset_ttl_secs,
        }
    }

    pub fn issue(&self, subject: &str, kind: TokenKind) -> Result<String, TokenError> {
        self.issue_at(subject, kind, now_unix())
    }

    pub fn issue_at(&self, subject: &str, kind: TokenKind, now: usize) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            scope: kind,
            iat: now,
            exp: now + self.ttl_for(kind),
            jti: Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".into());

        encode(&header, &claims, &self.keys.enc).map_err(|err| TokenError::Encoding(err.to_string()))
    }

    /// Verifies signature and expiry, then checks the token was issued for `expected`.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.keys.dec, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(err.to_string()),
            }
        })?;

        if data.claims.scope != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: data.claims.scope,
            });
        }

        Ok(data.claims)
    }

    pub fn create_access_token(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, TokenKind::Access)
    }

    pub fn create_refresh_token(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, TokenKind::Refresh)
    }

    pub fn create_email_token(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, TokenKind::EmailConfirmation)
    }

    pub fn create_reset_password_token(&self, email: &str) -> Result<String, TokenError> {
        self.issue(email, TokenKind::PasswordReset)
    }

    pub fn decode_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode(token, TokenKind::Access)
    }

    pub fn decode_refresh_token(&self, token: &str) -> Result<String, TokenError> {
        self.decode(token, TokenKind::Refresh).map(|claims| claims.sub)
    }

    pub fn get_email_from_token(&self, token: &str) -> Result<String, TokenError> {
        self.decode(token, TokenKind::EmailConfirmation)
            .map(|claims| claims.sub)
    }

    pub fn verify_reset_password_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode(token, TokenKind::PasswordReset)
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenError, TokenKind, TokenService, now_unix};
    use crate::config::AuthConfig;

    fn service() -> TokenService {
        TokenService::new(&AuthConfig {
            jwt_secret: "unit-test-secret".to_string(),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn decoded_token_keeps_subject_and_kind() {
        let tokens = service();
        for kind in [
            TokenKind::Access,
            TokenKind::Refresh,
            TokenKind::EmailConfirmation,
            TokenKind::PasswordReset,
        ] {
            let token = tokens.issue("a@x.com", kind).expect("token should encode");
            let claims = tokens.decode(&token, kind).expect("token should decode");

            assert_eq!(claims.sub, "a@x.com");
            assert_eq!(claims.scope, kind);
            assert!(claims.exp > claims.iat);
        }
    }

    #[test]
    fn access_token_lives_fifteen_minutes_by_default() {
        let tokens = service();
        let token = tokens.create_access_token("a@x.com").expect("token should encode");
        let claims = tokens.decode_access_token(&token).expect("token should decode");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn tokens_issued_in_the_same_second_differ() {
        let tokens = service();
        let now = now_unix();
        let first = tokens
            .issue_at("a@x.com", TokenKind::Refresh, now)
            .expect("token should encode");
        let second = tokens
            .issue_at("a@x.com", TokenKind::Refresh, now)
            .expect("token should encode");
        assert_ne!(first, second);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service();
        let issued = now_unix() - 2 * 60 * 60;
        let token = tokens
            .issue_at("a@x.com", TokenKind::Access, issued)
            .expect("token should encode");

        assert_eq!(tokens.decode_access_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let tokens = service();
        let token = tokens.create_refresh_token("a@x.com").expect("token should encode");

        assert_eq!(
            tokens.decode_access_token(&token),
            Err(TokenError::WrongKind {
                expected: TokenKind::Access,
                found: TokenKind::Refresh,
            })
        );
        assert_eq!(
            tokens.decode_refresh_token(&token).expect("refresh should decode"),
            "a@x.com"
        );
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let other = TokenService::new(&AuthConfig {
            jwt_secret: "another-secret".to_string(),
            ..AuthConfig::default()
        });
        let token = other.create_email_token("a@x.com").expect("token should encode");

        assert!(matches!(
            service().get_email_from_token(&token),
            Err(TokenError::Invalid(_))
        ));
        assert!(matches!(
            service().get_email_from_token("not-a-token"),
            Err(TokenError::Invalid(_))
        ));
    }
}
