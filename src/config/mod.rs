pub mod configs;
pub mod defaults;
pub mod validate;

pub use configs::{
    AppConfig, AuthConfig, AvatarConfig, DatabaseConfig, GeneralConfig, LoggingConfig,
    MailConfig, MailTransport,
};
