pub mod connection;
pub mod dao;
pub mod entities;
pub mod memory;
pub mod store;

pub use store::{ContactStore, Stores, UserStore};
