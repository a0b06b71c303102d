pub mod contact_dao;
mod context;
pub mod error;
pub mod pagination;
pub mod user_dao;

pub use contact_dao::ContactDao;
pub use context::DaoContext;
pub use error::{DaoLayerError, DaoResult};
pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest, PaginatedResponse};
pub use user_dao::UserDao;
