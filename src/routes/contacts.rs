use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::get,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::validate::{self, NAME_MAX_LEN, PHONE_MAX_LEN};
use crate::{
    auth::{CurrentUser, Role, RoleAccessLayer, require_identity},
    db::{
        dao::{PageRequest, PaginatedResponse},
        entities::contact,
        store::{ContactPatch, ContactSearch, NewContact},
    },
    error::AppError,
    response::{ApiResult, JsonApiResponse},
    services::{
        ServiceContext, auth_service::normalize_email,
        contact_service::DEFAULT_BIRTHDAY_WINDOW_DAYS,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BirthdayQuery {
    pub days: Option<i64>,
}

impl ContactRequest {
    fn validate(&self) -> Result<(), AppError> {
        validate::text("first_name", &self.first_name, NAME_MAX_LEN)?;
        validate::text("last_name", &self.last_name, NAME_MAX_LEN)?;
        validate::email(&self.email)?;
        validate::text("phone", &self.phone, PHONE_MAX_LEN)
    }

    fn into_new_contact(self, owner: Uuid) -> NewContact {
        NewContact {
            user_id: owner,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: normalize_email(&self.email),
            phone: self.phone.trim().to_string(),
            birthday: self.birthday,
        }
    }
}

impl ContactUpdateRequest {
    fn into_patch(self) -> Result<ContactPatch, AppError> {
        if let Some(first_name) = &self.first_name {
            validate::text("first_name", first_name, NAME_MAX_LEN)?;
        }
        if let Some(last_name) = &self.last_name {
            validate::text("last_name", last_name, NAME_MAX_LEN)?;
        }
        if let Some(email) = &self.email {
            validate::email(email)?;
        }
        if let Some(phone) = &self.phone {
            validate::text("phone", phone, PHONE_MAX_LEN)?;
        }

        let trimmed = |value: Option<String>| value.map(|v| v.trim().to_string());
        Ok(ContactPatch {
            first_name: trimmed(self.first_name),
            last_name: trimmed(self.last_name),
            email: self.email.as_deref().map(normalize_email),
            phone: trimmed(self.phone),
            birthday: self.birthday,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let privileged = Router::new()
        .route("/all", get(list_all))
        .route_layer(RoleAccessLayer::new(&[Role::Admin, Role::Moderator]));

    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search))
        .route("/upcoming_birthdays", get(upcoming_birthdays))
        .route("/{id}", get(read).put(update).delete(remove))
        .merge(privileged)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ))
        .with_state(state)
}

async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ContactRequest>,
) -> ApiResult<contact::Model> {
    body.validate()?;
    let created = ServiceContext::from_state(&state)
        .contacts()
        .create(body.into_new_contact(user.id))
        .await?;
    JsonApiResponse::created("Contact created", created)
}

async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageRequest>,
) -> ApiResult<PaginatedResponse<contact::Model>> {
    let contacts = ServiceContext::from_state(&state)
        .contacts()
        .list(user.id, page)
        .await?;
    JsonApiResponse::ok(contacts)
}

async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageRequest>,
) -> ApiResult<PaginatedResponse<contact::Model>> {
    let contacts = ServiceContext::from_state(&state)
        .contacts()
        .list_all(page)
        .await?;
    JsonApiResponse::ok(contacts)
}

async fn read(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<contact::Model> {
    let contact = ServiceContext::from_state(&state)
        .contacts()
        .get(user.id, id)
        .await?;
    JsonApiResponse::ok(contact)
}

async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ContactUpdateRequest>,
) -> ApiResult<contact::Model> {
    let updated = ServiceContext::from_state(&state)
        .contacts()
        .update(user.id, id, body.into_patch()?)
        .await?;
    JsonApiResponse::with_status(StatusCode::OK, "Contact updated", updated)
}

async fn remove(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<contact::Model> {
    let removed = ServiceContext::from_state(&state)
        .contacts()
        .delete(user.id, id)
        .await?;
    JsonApiResponse::with_status(StatusCode::OK, "Contact deleted", removed)
}

async fn search(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<contact::Model>> {
    let criteria = ContactSearch {
        first_name: query.first_name,
        last_name: query.last_name,
        email: query.email,
    };
    let found = ServiceContext::from_state(&state)
        .contacts()
        .search(user.id, &criteria)
        .await?;
    JsonApiResponse::ok(found)
}

async fn upcoming_birthdays(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<BirthdayQuery>,
) -> ApiResult<Vec<contact::Model>> {
    let days = query.days.unwrap_or(DEFAULT_BIRTHDAY_WINDOW_DAYS);
    let today = chrono::Utc::now().date_naive();
    let upcoming = ServiceContext::from_state(&state)
        .contacts()
        .upcoming_birthdays(user.id, days, today)
        .await?;

    let message = if upcoming.is_empty() {
        format!("No birthdays in the next {days} days")
    } else {
        "ok".to_string()
    };
    JsonApiResponse::with_status(StatusCode::OK, message, upcoming)
}
