use crate::{
    auth::{jwt::TokenError, password::PasswordError},
    db::dao::DaoLayerError,
};

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    InvalidToken(String),
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::InvalidToken(message)
            | Self::Internal(message) => message.as_str(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl From<DaoLayerError> for AppError {
    fn from(err: DaoLayerError) -> Self {
        match err {
            DaoLayerError::NotFound { .. } => AppError::not_found(err.to_string()),
            DaoLayerError::InvalidPagination { .. } => AppError::bad_request(err.to_string()),
            DaoLayerError::Conflict { .. } => AppError::conflict(err.to_string()),
            DaoLayerError::Db(_) => {
                tracing::error!(error = %err, "store operation failed");
                AppError::internal("Storage error")
            }
        }
    }
}

// A stored digest that does not parse is a data problem, not a client one.
impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "credential hasher failed");
        AppError::internal("Credential processing failed")
    }
}

// Callers that need 401 instead map the error themselves.
impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(_) => {
                tracing::error!(error = %err, "token encoding failed");
                AppError::internal("Token encoding failed")
            }
            _ => AppError::invalid_token("Invalid token"),
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::DbErr;
    use uuid::Uuid;

    use super::AppError;
    use crate::{auth::jwt::TokenError, db::dao::DaoLayerError};

    #[test]
    fn store_failures_become_internal_errors() {
        let err = AppError::from(DaoLayerError::Db(DbErr::Custom("boom".to_string())));
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(err.message(), "Storage error");
    }

    #[test]
    fn missing_rows_become_not_found() {
        let err = AppError::from(DaoLayerError::NotFound {
            entity: "contact",
            id: Uuid::nil(),
        });
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn token_failures_become_invalid_token() {
        assert!(matches!(
            AppError::from(TokenError::Expired),
            AppError::InvalidToken(_)
        ));
        assert!(matches!(
            AppError::from(TokenError::Encoding("key".to_string())),
            AppError::Internal(_)
        ));
    }
}
