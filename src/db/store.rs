use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::{
    dao::{DaoResult, PageRequest, PaginatedResponse},
    entities::{contact, user},
};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub username: String,
    pub avatar: Option<String>,
    pub role: String,
    pub confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: NaiveDate,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
}

/// Criteria are OR-ed; each is a case-insensitive substring match.
#[derive(Debug, Clone, Default)]
pub struct ContactSearch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ContactSearch {
    pub fn is_empty(&self) -> bool {
        [&self.first_name, &self.last_name, &self.email]
            .iter()
            .all(|value| value.as_deref().is_none_or(|v| v.trim().is_empty()))
    }

    pub fn matches(&self, contact: &contact::Model) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle
                .as_deref()
                .map(str::trim)
                .filter(|needle| !needle.is_empty())
                .is_some_and(|needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
        };

        contains(&contact.first_name, &self.first_name)
            || contains(&contact.last_name, &self.last_name)
            || contains(&contact.email, &self.email)
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>>;
    async fn find_by_id(&self, id: Uuid) -> DaoResult<Option<user::Model>>;
    async fn find_by_refresh_token(&self, token: &str) -> DaoResult<Option<user::Model>>;
    async fn create(&self, new_user: NewUser) -> DaoResult<user::Model>;
    async fn set_refresh_token(&self, id: Uuid, token: Option<String>) -> DaoResult<()>;
    async fn confirm_email(&self, email: &str) -> DaoResult<()>;
    /// Replaces the digest and drops the stored refresh token.
    async fn update_password(&self, id: Uuid, password_hash: String) -> DaoResult<()>;
    async fn update_avatar(&self, id: Uuid, url: String) -> DaoResult<user::Model>;
    async fn update_role(&self, id: Uuid, role: &str) -> DaoResult<user::Model>;
}

/// Every operation except `list_all` is scoped to one owner.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn create(&self, new_contact: NewContact) -> DaoResult<contact::Model>;
    async fn find_for_owner(&self, owner: Uuid, id: Uuid) -> DaoResult<Option<contact::Model>>;
    async fn find_by_email_for_owner(
        &self,
        owner: Uuid,
        email: &str,
    ) -> DaoResult<Option<contact::Model>>;
    async fn list_for_owner(
        &self,
        owner: Uuid,
        page: PageRequest,
    ) -> DaoResult<PaginatedResponse<contact::Model>>;
    async fn list_all(&self, page: PageRequest) -> DaoResult<PaginatedResponse<contact::Model>>;
    async fn all_for_owner(&self, owner: Uuid) -> DaoResult<Vec<contact::Model>>;
    async fn update_for_owner(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> DaoResult<contact::Model>;
    async fn delete_for_owner(&self, owner: Uuid, id: Uuid) -> DaoResult<contact::Model>;
    async fn search_for_owner(
        &self,
        owner: Uuid,
        query: &ContactSearch,
    ) -> DaoResult<Vec<contact::Model>>;
}

#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub contacts: Arc<dyn ContactStore>,
}
