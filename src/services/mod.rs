pub mod auth_service;
pub mod avatar;
pub mod contact_service;
pub mod context;
pub mod mail;
pub mod user_service;

pub use context::ServiceContext;
