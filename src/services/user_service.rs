use uuid::Uuid;

use crate::{
    auth::Role,
    db::{dao::DaoLayerError, entities::user, store::UserStore},
    error::AppError,
};

#[derive(Clone, Copy)]
pub struct UserService<'a> {
    users: &'a dyn UserStore,
}

impl<'a> UserService<'a> {
    pub fn new(users: &'a dyn UserStore) -> Self {
        Self { users }
    }

    pub async fn update_role(&self, id: Uuid, role: Role) -> Result<user::Model, AppError> {
        match self.users.update_role(id, role.as_str()).await {
            Ok(updated) => {
                tracing::info!(user_id = %id, role = %role, "role changed");
                Ok(updated)
            }
            Err(DaoLayerError::NotFound { .. }) => Err(AppError::not_found("User not found")),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::UserService;
    use crate::{
        auth::Role,
        db::{
            memory::MemoryStore,
            store::{NewUser, UserStore},
        },
        error::AppError,
    };

    #[tokio::test]
    async fn update_role_changes_stored_role() {
        let store = MemoryStore::new();
        let user = store
            .create(NewUser {
                email: "m@x.com".to_string(),
                password_hash: "hash".to_string(),
                username: "mod".to_string(),
                avatar: None,
                role: Role::User.as_str().to_string(),
                confirmed: true,
            })
            .await
            .expect("user should be created");

        let updated = UserService::new(&store)
            .update_role(user.id, Role::Moderator)
            .await
            .expect("role should update");
        assert_eq!(updated.role, "moderator");
    }

    #[tokio::test]
    async fn update_role_for_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        let err = UserService::new(&store)
            .update_role(Uuid::new_v4(), Role::Admin)
            .await
            .expect_err("missing user should fail");
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
