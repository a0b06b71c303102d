pub mod identity;
pub mod jwt;
pub mod password;
pub mod roles;

use serde::Serialize;

pub use identity::{BearerToken, CurrentUser, require_identity};
pub use jwt::{Claims, TokenError, TokenKind, TokenService};
pub use roles::{Role, RoleAccess, RoleAccessLayer};

#[derive(Debug, Clone, Serialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: usize,
}
