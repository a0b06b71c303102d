use sea_orm::{DbErr, SqlErr};
use std::fmt;
use uuid::Uuid;

#[derive(Debug)]
pub enum DaoLayerError {
    Db(DbErr),
    NotFound { entity: &'static str, id: Uuid },
    Conflict { entity: &'static str },
    InvalidPagination { page: u64, page_size: u64 },
}

pub type DaoResult<T> = Result<T, DaoLayerError>;

impl DaoLayerError {
    /// Maps a unique-constraint violation raised by an insert or update to `Conflict`.
    pub fn on_write(entity: &'static str, err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => DaoLayerError::Conflict { entity },
            _ => DaoLayerError::Db(err),
        }
    }
}

impl fmt::Display for DaoLayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoLayerError::Db(err) => write!(f, "Database error: {err}"),
            DaoLayerError::NotFound { entity, .. } => write!(f, "{entity} not found"),
            DaoLayerError::Conflict { entity } => write!(f, "{entity} already exists"),
            DaoLayerError::InvalidPagination { page, page_size } => write!(
                f,
                "Invalid pagination: page={page} page_size={page_size}"
            ),
        }
    }
}

impl std::error::Error for DaoLayerError {}

impl From<DbErr> for DaoLayerError {
    fn from(err: DbErr) -> Self {
        DaoLayerError::Db(err)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::DbErr;

    use super::DaoLayerError;

    #[test]
    fn non_constraint_write_errors_stay_db_errors() {
        let err = DaoLayerError::on_write("user", DbErr::Custom("connection reset".to_string()));
        assert!(matches!(err, DaoLayerError::Db(_)));
    }

    #[test]
    fn conflict_names_the_entity() {
        let err = DaoLayerError::Conflict { entity: "contact" };
        assert_eq!(err.to_string(), "contact already exists");
    }
}
