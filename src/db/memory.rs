//! In-process store used by tests and by `database.url = "memory:"`.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    dao::{DaoLayerError, DaoResult, PageRequest, PaginatedResponse},
    entities::{contact, user},
    store::{ContactPatch, ContactSearch, ContactStore, NewContact, NewUser, Stores, UserStore},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, user::Model>,
    contacts: Vec<contact::Model>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stores(&self) -> Stores {
        Stores {
            users: Arc::new(self.clone()),
            contacts: Arc::new(self.clone()),
        }
    }

    async fn update_user(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut user::Model) + Send,
    ) -> DaoResult<user::Model> {
        let mut tables = self.tables.write().await;
        let found = tables
            .users
            .get_mut(&id)
            .ok_or(DaoLayerError::NotFound { entity: "user", id })?;
        apply(found);
        found.updated_at = Utc::now().fixed_offset();
        Ok(found.clone())
    }
}

fn page_of(
    mut rows: Vec<contact::Model>,
    page: PageRequest,
) -> DaoResult<PaginatedResponse<contact::Model>> {
    page.validate()?;
    rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let data = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.fetch_size() as usize)
        .collect();
    Ok(page.into_response(data))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> DaoResult<Option<user::Model>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_refresh_token(&self, token: &str) -> DaoResult<Option<user::Model>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.refresh_token.as_deref() == Some(token))
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> DaoResult<user::Model> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new_user.email) {
            return Err(DaoLayerError::Conflict { entity: "user" });
        }

        let now = Utc::now().fixed_offset();
        let model = user::Model {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            username: new_user.username,
            avatar: new_user.avatar,
            role: new_user.role,
            confirmed: new_user.confirmed,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(model.id, model.clone());
        Ok(model)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<String>) -> DaoResult<()> {
        self.update_user(id, move |u| u.refresh_token = token)
            .await
            .map(|_| ())
    }

    async fn confirm_email(&self, email: &str) -> DaoResult<()> {
        let Some(found) = UserStore::find_by_email(self, email).await? else {
            return Err(DaoLayerError::NotFound {
                entity: "user",
                id: Uuid::nil(),
            });
        };
        self.update_user(found.id, |u| u.confirmed = true)
            .await
            .map(|_| ())
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> DaoResult<()> {
        self.update_user(id, move |u| {
            u.password_hash = password_hash;
            u.refresh_token = None;
        })
        .await
        .map(|_| ())
    }

    async fn update_avatar(&self, id: Uuid, url: String) -> DaoResult<user::Model> {
        self.update_user(id, move |u| u.avatar = Some(url)).await
    }

    async fn update_role(&self, id: Uuid, role: &str) -> DaoResult<user::Model> {
        let role = role.to_string();
        self.update_user(id, move |u| u.role = role).await
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn create(&self, new_contact: NewContact) -> DaoResult<contact::Model> {
        let mut tables = self.tables.write().await;
        if tables
            .contacts
            .iter()
            .any(|c| c.user_id == new_contact.user_id && c.email == new_contact.email)
        {
            return Err(DaoLayerError::Conflict { entity: "contact" });
        }

        let now = Utc::now().fixed_offset();
        let model = contact::Model {
            id: Uuid::new_v4(),
            user_id: new_contact.user_id,
            first_name: new_contact.first_name,
            last_name: new_contact.last_name,
            email: new_contact.email,
            phone: new_contact.phone,
            birthday: new_contact.birthday,
            created_at: now,
            updated_at: now,
        };
        tables.contacts.push(model.clone());
        Ok(model)
    }

    async fn find_for_owner(&self, owner: Uuid, id: Uuid) -> DaoResult<Option<contact::Model>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contacts
            .iter()
            .find(|c| c.user_id == owner && c.id == id)
            .cloned())
    }

    async fn find_by_email_for_owner(
        &self,
        owner: Uuid,
        email: &str,
    ) -> DaoResult<Option<contact::Model>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contacts
            .iter()
            .find(|c| c.user_id == owner && c.email == email)
            .cloned())
    }

    async fn list_for_owner(
        &self,
        owner: Uuid,
        page: PageRequest,
    ) -> DaoResult<PaginatedResponse<contact::Model>> {
        let rows = self.all_for_owner(owner).await?;
        page_of(rows, page)
    }

    async fn list_all(&self, page: PageRequest) -> DaoResult<PaginatedResponse<contact::Model>> {
        let rows = self.tables.read().await.contacts.clone();
        page_of(rows, page)
    }

    async fn all_for_owner(&self, owner: Uuid) -> DaoResult<Vec<contact::Model>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contacts
            .iter()
            .filter(|c| c.user_id == owner)
            .cloned()
            .collect())
    }

    async fn update_for_owner(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> DaoResult<contact::Model> {
        let mut tables = self.tables.write().await;
        if let Some(email) = patch.email.as_deref() {
            let taken = tables
                .contacts
                .iter()
                .any(|c| c.user_id == owner && c.id != id && c.email == email);
            if taken {
                return Err(DaoLayerError::Conflict { entity: "contact" });
            }
        }
        let found = tables
            .contacts
            .iter_mut()
            .find(|c| c.user_id == owner && c.id == id)
            .ok_or(DaoLayerError::NotFound {
                entity: "contact",
                id,
            })?;

        if let Some(first_name) = patch.first_name {
            found.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            found.last_name = last_name;
        }
        if let Some(email) = patch.email {
            found.email = email;
        }
        if let Some(phone) = patch.phone {
            found.phone = phone;
        }
        if let Some(birthday) = patch.birthday {
            found.birthday = birthday;
        }
        found.updated_at = Utc::now().fixed_offset();
        Ok(found.clone())
    }

    async fn delete_for_owner(&self, owner: Uuid, id: Uuid) -> DaoResult<contact::Model> {
        let mut tables = self.tables.write().await;
        let index = tables
            .contacts
            .iter()
            .position(|c| c.user_id == owner && c.id == id)
            .ok_or(DaoLayerError::NotFound {
                entity: "contact",
                id,
            })?;
        Ok(tables.contacts.remove(index))
    }

    async fn search_for_owner(
        &self,
        owner: Uuid,
        query: &ContactSearch,
    ) -> DaoResult<Vec<contact::Model>> {
        let mut found: Vec<contact::Model> = self
            .all_for_owner(owner)
            .await?
            .into_iter()
            .filter(|c| query.matches(c))
            .collect();
        found.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(found)
    }
}
