use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{defaults, validate};

const ENV_PREFIX: &str = "APP";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub avatar: AvatarConfig,
}

impl AppConfig {
    /// Reads `.env` (crate dir first, then the working dir) and `APP_`-prefixed
    /// variables, e.g. `APP_AUTH__JWT_SECRET` fills `auth.jwt_secret`.
    pub fn from_env() -> Result<Self> {
        let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_filename(manifest_env).or_else(|_| dotenvy::dotenv());

        let cfg: Self = ::config::Config::builder()
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .context("failed to read environment variables for config")?
            .try_deserialize()
            .context("failed to deserialize environment into config")?;

        validate::validate(&cfg)?;
        Ok(cfg)
    }

    /// Admin account to create at startup, when both credentials are configured.
    pub fn admin_seed(&self) -> Option<(&str, &str)> {
        match (&self.auth.admin_email, &self.auth.admin_password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub host: String,
    pub port: u16,
    /// Base URL placed in links sent by email.
    pub public_url: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: defaults::DEFAULT_HOST.to_string(),
            port: defaults::DEFAULT_PORT,
            public_url: defaults::DEFAULT_PUBLIC_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub rust_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log: defaults::DEFAULT_RUST_LOG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `postgres://…`, `sqlite:…`, or `memory:` for the in-process store.
    pub url: String,
    pub max_connections: u32,
    pub min_idle: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DEFAULT_DATABASE_URL.to_string(),
            max_connections: defaults::DEFAULT_DB_MAX_CONNECTIONS,
            min_idle: defaults::DEFAULT_DB_MIN_IDLE,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub email_token_ttl_secs: u64,
    pub reset_token_ttl_secs: u64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: defaults::DEFAULT_JWT_SECRET.to_string(),
            access_token_ttl_secs: defaults::DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: defaults::DEFAULT_REFRESH_TOKEN_TTL_SECS,
            email_token_ttl_secs: defaults::DEFAULT_EMAIL_TOKEN_TTL_SECS,
            reset_token_ttl_secs: defaults::DEFAULT_RESET_TOKEN_TTL_SECS,
            admin_email: None,
            admin_password: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Write outgoing mail to the log instead of delivering it.
    #[default]
    Log,
    /// POST outgoing mail as JSON to `mail.api_url`.
    Http,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub from: String,
    pub from_name: String,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::default(),
            from: defaults::DEFAULT_MAIL_FROM.to_string(),
            from_name: defaults::DEFAULT_MAIL_FROM_NAME.to_string(),
            api_url: None,
            api_key: None,
            queue_capacity: defaults::DEFAULT_MAIL_QUEUE_CAPACITY,
            max_attempts: defaults::DEFAULT_MAIL_MAX_ATTEMPTS,
            retry_backoff_ms: defaults::DEFAULT_MAIL_RETRY_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvatarConfig {
    pub dir: String,
    pub public_path: String,
    pub max_bytes: usize,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            dir: defaults::DEFAULT_AVATAR_DIR.to_string(),
            public_path: defaults::DEFAULT_AVATAR_PUBLIC_PATH.to_string(),
            max_bytes: defaults::DEFAULT_AVATAR_MAX_BYTES,
        }
    }
}
