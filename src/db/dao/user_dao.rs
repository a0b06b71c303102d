use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use uuid::Uuid;

use super::{DaoLayerError, DaoResult};
use crate::db::{
    entities::{prelude::User, user},
    store::{NewUser, UserStore},
};

#[derive(Clone)]
pub struct UserDao {
    db: DatabaseConnection,
}

impl UserDao {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    async fn fetch(&self, id: Uuid) -> DaoResult<user::Model> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DaoLayerError::NotFound { entity: "user", id })
    }

    async fn update_with(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut user::ActiveModel) + Send,
    ) -> DaoResult<user::Model> {
        let mut active = self.fetch(id).await?.into_active_model();
        apply(&mut active);
        active.updated_at = Set(Utc::now().fixed_offset());
        Ok(active.update(&self.db).await?)
    }
}

#[async_trait]
impl UserStore for UserDao {
    async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        Ok(User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    async fn find_by_id(&self, id: Uuid) -> DaoResult<Option<user::Model>> {
        Ok(User::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_refresh_token(&self, token: &str) -> DaoResult<Option<user::Model>> {
        Ok(User::find()
            .filter(user::Column::RefreshToken.eq(token))
            .one(&self.db)
            .await?)
    }

    async fn create(&self, new_user: NewUser) -> DaoResult<user::Model> {
        let now = Utc::now().fixed_offset();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            username: Set(new_user.username),
            avatar: Set(new_user.avatar),
            role: Set(new_user.role),
            confirmed: Set(new_user.confirmed),
            refresh_token: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        model
            .insert(&self.db)
            .await
            .map_err(|err| DaoLayerError::on_write("user", err))
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<String>) -> DaoResult<()> {
        self.update_with(id, move |active| active.refresh_token = Set(token))
            .await
            .map(|_| ())
    }

    async fn confirm_email(&self, email: &str) -> DaoResult<()> {
        let Some(found) = self.find_by_email(email).await? else {
            return Err(DaoLayerError::NotFound {
                entity: "user",
                id: Uuid::nil(),
            });
        };
        self.update_with(found.id, |active| active.confirmed = Set(true))
            .await
            .map(|_| ())
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> DaoResult<()> {
        self.update_with(id, move |active| {
            active.password_hash = Set(password_hash);
            active.refresh_token = Set(None);
        })
        .await
        .map(|_| ())
    }

    async fn update_avatar(&self, id: Uuid, url: String) -> DaoResult<user::Model> {
        self.update_with(id, move |active| active.avatar = Set(Some(url)))
            .await
    }

    async fn update_role(&self, id: Uuid, role: &str) -> DaoResult<user::Model> {
        let role = role.to_string();
        self.update_with(id, move |active| active.role = Set(role)).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use uuid::Uuid;

    use super::UserDao;
    use crate::db::{
        dao::DaoLayerError,
        entities::user,
        store::{NewUser, UserStore},
    };

    fn ts() -> chrono::DateTime<chrono::FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("offset should be valid")
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid")
    }

    fn user_model(id: Uuid, email: &str) -> user::Model {
        let now = ts();
        user::Model {
            id,
            email: email.to_string(),
            password_hash: "hash".to_string(),
            username: "alice".to_string(),
            avatar: None,
            role: "user".to_string(),
            confirmed: false,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn find_by_email_returns_first_match() {
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_model(id, "alice@example.com")]])
            .into_connection();
        let dao = UserDao::new(&db);

        let result = dao
            .find_by_email("alice@example.com")
            .await
            .expect("query should succeed");
        assert_eq!(result.map(|u| u.id), Some(id));
    }

    #[tokio::test]
    async fn find_by_email_returns_none_when_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let dao = UserDao::new(&db);

        let result = dao
            .find_by_email("missing@example.com")
            .await
            .expect("query should succeed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn create_returns_inserted_row() {
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_model(id, "alice@example.com")]])
            .into_connection();
        let dao = UserDao::new(&db);

        let created = dao
            .create(NewUser {
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
                username: "alice".to_string(),
                avatar: None,
                role: "user".to_string(),
                confirmed: false,
            })
            .await
            .expect("insert should succeed");
        assert_eq!(created.email, "alice@example.com");
    }

    #[tokio::test]
    async fn set_refresh_token_propagates_not_found() {
        let missing_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let dao = UserDao::new(&db);

        let err = dao
            .set_refresh_token(missing_id, Some("token".to_string()))
            .await
            .expect_err("update should fail");
        assert!(matches!(
            err,
            DaoLayerError::NotFound { id, .. } if id == missing_id
        ));
    }
}
