use sea_orm::DatabaseConnection;

use super::{ContactDao, UserDao};

#[derive(Clone)]
pub struct DaoContext {
    db: DatabaseConnection,
}

impl DaoContext {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    pub fn user(&self) -> UserDao {
        UserDao::new(&self.db)
    }

    pub fn contact(&self) -> ContactDao {
        ContactDao::new(&self.db)
    }
}
