#[allow(unused_imports)]
pub mod prelude {
    pub use super::contact::Entity as Contact;
    pub use super::user::Entity as User;
}

pub mod contact;
pub mod user;
