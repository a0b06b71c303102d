use std::{sync::Arc, time::Duration};

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use tracing::info;

use super::{dao::DaoContext, memory::MemoryStore, store::Stores};
use crate::config::DatabaseConfig;

pub const MEMORY_URL: &str = "memory:";

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Stores> {
    if cfg.url.trim() == MEMORY_URL {
        info!("using in-memory store");
        return Ok(MemoryStore::new().stores());
    }

    let db = open(cfg).await?;
    let daos = DaoContext::new(&db);
    Ok(Stores {
        users: Arc::new(daos.user()),
        contacts: Arc::new(daos.contact()),
    })
}

pub async fn open(cfg: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(cfg.url.clone());
    options
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_idle)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    if cfg.url.starts_with("sqlite:") {
        db.execute_unprepared("PRAGMA foreign_keys = ON").await?;
        db.execute_unprepared("PRAGMA busy_timeout = 5000").await?;
    }

    info!("syncing database schema from entities");
    db.get_schema_registry("contacts_api::db::entities::*")
        .sync(&db)
        .await?;
    Ok(db)
}
