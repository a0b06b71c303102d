use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    ModelTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    sea_query::{Expr, ExprTrait, Func, LikeExpr},
};
use uuid::Uuid;

use super::{DaoLayerError, DaoResult, PageRequest, PaginatedResponse};
use crate::db::{
    entities::{contact, prelude::Contact},
    store::{ContactPatch, ContactSearch, ContactStore, NewContact},
};

const LIKE_ESCAPE: char = '\\';

#[derive(Clone)]
pub struct ContactDao {
    db: DatabaseConnection,
}

impl ContactDao {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn owned_by(owner: Uuid) -> Select<Contact> {
        Contact::find().filter(contact::Column::UserId.eq(owner))
    }

    async fn fetch_for_owner(&self, owner: Uuid, id: Uuid) -> DaoResult<contact::Model> {
        self.find_for_owner(owner, id)
            .await?
            .ok_or(DaoLayerError::NotFound {
                entity: "contact",
                id,
            })
    }

    async fn fetch_page(
        &self,
        select: Select<Contact>,
        page: PageRequest,
    ) -> DaoResult<PaginatedResponse<contact::Model>> {
        page.validate()?;

        let data = select
            .order_by_asc(contact::Column::CreatedAt)
            .order_by_asc(contact::Column::Id)
            .limit(page.fetch_size())
            .offset(page.offset())
            .all(&self.db)
            .await?;

        Ok(page.into_response(data))
    }
}

fn contains_ci(column: contact::Column, needle: &str) -> Expr {
    let escaped = needle
        .to_lowercase()
        .replace(LIKE_ESCAPE, "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Expr::expr(Func::lower(Expr::col(column)))
        .like(LikeExpr::new(format!("%{escaped}%")).escape(LIKE_ESCAPE))
}

fn search_condition(query: &ContactSearch) -> Condition {
    [
        (contact::Column::FirstName, &query.first_name),
        (contact::Column::LastName, &query.last_name),
        (contact::Column::Email, &query.email),
    ]
    .into_iter()
    .filter_map(|(column, value)| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(|needle| contains_ci(column, needle))
    })
    .fold(Condition::any(), |condition, expr| condition.add(expr))
}

#[async_trait]
impl ContactStore for ContactDao {
    async fn create(&self, new_contact: NewContact) -> DaoResult<contact::Model> {
        let now = Utc::now().fixed_offset();
        let model = contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new_contact.user_id),
            first_name: Set(new_contact.first_name),
            last_name: Set(new_contact.last_name),
            email: Set(new_contact.email),
            phone: Set(new_contact.phone),
            birthday: Set(new_contact.birthday),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        model
            .insert(&self.db)
            .await
            .map_err(|err| DaoLayerError::on_write("contact", err))
    }

    async fn find_for_owner(&self, owner: Uuid, id: Uuid) -> DaoResult<Option<contact::Model>> {
        Ok(Self::owned_by(owner)
            .filter(contact::Column::Id.eq(id))
            .one(&self.db)
            .await?)
    }

    async fn find_by_email_for_owner(
        &self,
        owner: Uuid,
        email: &str,
    ) -> DaoResult<Option<contact::Model>> {
        Ok(Self::owned_by(owner)
            .filter(contact::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    async fn list_for_owner(
        &self,
        owner: Uuid,
        page: PageRequest,
    ) -> DaoResult<PaginatedResponse<contact::Model>> {
        self.fetch_page(Self::owned_by(owner), page).await
    }

    async fn list_all(&self, page: PageRequest) -> DaoResult<PaginatedResponse<contact::Model>> {
        self.fetch_page(Contact::find(), page).await
    }

    async fn all_for_owner(&self, owner: Uuid) -> DaoResult<Vec<contact::Model>> {
        Ok(Self::owned_by(owner)
            .order_by_asc(contact::Column::Birthday)
            .all(&self.db)
            .await?)
    }

    async fn update_for_owner(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> DaoResult<contact::Model> {
        let mut active = self.fetch_for_owner(owner, id).await?.into_active_model();
        if let Some(first_name) = patch.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = patch.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(email) = patch.email {
            active.email = Set(email);
        }
        if let Some(phone) = patch.phone {
            active.phone = Set(phone);
        }
        if let Some(birthday) = patch.birthday {
            active.birthday = Set(birthday);
        }
        active.updated_at = Set(Utc::now().fixed_offset());
        active
            .update(&self.db)
            .await
            .map_err(|err| DaoLayerError::on_write("contact", err))
    }

    async fn delete_for_owner(&self, owner: Uuid, id: Uuid) -> DaoResult<contact::Model> {
        let model = self.fetch_for_owner(owner, id).await?;
        model.clone().delete(&self.db).await?;
        Ok(model)
    }

    async fn search_for_owner(
        &self,
        owner: Uuid,
        query: &ContactSearch,
    ) -> DaoResult<Vec<contact::Model>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        Ok(Self::owned_by(owner)
            .filter(search_condition(query))
            .order_by_asc(contact::Column::LastName)
            .order_by_asc(contact::Column::FirstName)
            .all(&self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use uuid::Uuid;

    use super::ContactDao;
    use crate::db::{
        dao::{DaoLayerError, PageRequest},
        entities::contact,
        store::{ContactSearch, ContactStore},
    };

    fn contact_model(owner: Uuid, first_name: &str) -> contact::Model {
        let now = FixedOffset::east_opt(0)
            .expect("offset should be valid")
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid");
        contact::Model {
            id: Uuid::new_v4(),
            user_id: owner,
            first_name: first_name.to_string(),
            last_name: "Smith".to_string(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            phone: "555-0100".to_string(),
            birthday: NaiveDate::from_ymd_opt(1990, 5, 17).expect("date should be valid"),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn list_for_owner_reports_next_page() {
        let owner = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                contact_model(owner, "Ann"),
                contact_model(owner, "Bob"),
                contact_model(owner, "Cid"),
            ]])
            .into_connection();
        let dao = ContactDao::new(&db);

        let page = dao
            .list_for_owner(owner, PageRequest::new(1, 2).expect("valid page"))
            .await
            .expect("query should succeed");
        assert_eq!(page.data.len(), 2);
        assert!(page.has_next);
    }

    #[tokio::test]
    async fn list_all_rejects_bad_page_before_querying() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let dao = ContactDao::new(&db);

        let err = dao
            .list_all(PageRequest {
                page: 0,
                page_size: 10,
            })
            .await
            .expect_err("page 0 should fail");
        assert!(matches!(err, DaoLayerError::InvalidPagination { .. }));
    }

    #[tokio::test]
    async fn delete_for_owner_returns_not_found_for_foreign_contact() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<contact::Model>::new()])
            .into_connection();
        let dao = ContactDao::new(&db);
        let id = Uuid::new_v4();

        let err = dao
            .delete_for_owner(Uuid::new_v4(), id)
            .await
            .expect_err("delete should fail");
        assert!(matches!(err, DaoLayerError::NotFound { id: missing, .. } if missing == id));
    }

    #[tokio::test]
    async fn delete_for_owner_returns_removed_row() {
        let owner = Uuid::new_v4();
        let existing = contact_model(owner, "Ann");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[existing.clone()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let dao = ContactDao::new(&db);

        let removed = dao
            .delete_for_owner(owner, existing.id)
            .await
            .expect("delete should succeed");
        assert_eq!(removed.id, existing.id);
    }

    #[tokio::test]
    async fn empty_search_skips_the_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let dao = ContactDao::new(&db);

        let found = dao
            .search_for_owner(Uuid::new_v4(), &ContactSearch::default())
            .await
            .expect("empty search should succeed");
        assert!(found.is_empty());
    }
}
