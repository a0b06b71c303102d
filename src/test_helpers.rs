//! Shared fixtures for unit and integration tests.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{self, Body},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::Value;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
    auth::{TokenBundle, password::hash_password},
    config::AppConfig,
    db::{
        connection::MEMORY_URL, entities::user, memory::MemoryStore, store::NewUser,
        store::UserStore,
    },
    routes::app,
    services::{
        ServiceContext,
        avatar::LocalAvatarStorage,
        mail::{Email, MailError, MailQueue, Mailer},
    },
    state::AppState,
};

const MAIL_WAIT: Duration = Duration::from_secs(2);

/// Captures delivered mail so tests can read tokens out of it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    delivered: Notify,
}

impl RecordingMailer {
    fn lock(&self) -> MutexGuard<'_, Vec<Email>> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn sent(&self) -> Vec<Email> {
        self.lock().clone()
    }

    /// Waits until at least `count` messages arrived, or gives up after a short timeout.
    pub async fn wait_for(&self, count: usize) -> Vec<Email> {
        let _ = tokio::time::timeout(MAIL_WAIT, async {
            while self.lock().len() < count {
                self.delivered.notified().await;
            }
        })
        .await;
        self.sent()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.lock().push(email.clone());
        self.delivered.notify_one();
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.database.url = MEMORY_URL.to_string();
    cfg.auth.jwt_secret = "test-secret".to_string();
    cfg.mail.retry_backoff_ms = 1;
    cfg.avatar.dir = std::env::temp_dir()
        .join(format!("contacts-api-avatars-{}", Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    cfg
}

/// Application state over the in-memory store with a recording mailer.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub mailer: Arc<RecordingMailer>,
    pub store: MemoryStore,
}

impl TestApp {
    /// Must be called from inside a tokio runtime; the mail worker is spawned here.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(cfg: AppConfig) -> Self {
        let store = MemoryStore::new();
        let mailer = Arc::new(RecordingMailer::default());
        let mail = MailQueue::spawn(mailer.clone(), &cfg.mail);
        let avatars = Arc::new(LocalAvatarStorage::new(&cfg.avatar));
        let state = AppState::new(cfg, store.stores(), mail, avatars);
        Self {
            state,
            mailer,
            store,
        }
    }

    pub fn router(&self) -> Router {
        app(self.state.clone())
    }

    pub async fn confirmed_user(&self, email: &str, password: &str, role: &str) -> user::Model {
        let username = email.split('@').next().unwrap_or(email).to_string();
        UserStore::create(
            &self.store,
            NewUser {
                email: email.to_string(),
                password_hash: hash_password(password).expect("hash password"),
                username,
                avatar: None,
                role: role.to_string(),
                confirmed: true,
            },
        )
        .await
        .expect("create user")
    }

    pub async fn login(&self, email: &str, password: &str) -> TokenBundle {
        ServiceContext::from_state(&self.state)
            .auth()
            .login(email, password)
            .await
            .expect("login")
    }

    /// Creates a confirmed user and returns its access token.
    pub async fn access_token_for(&self, email: &str, role: &str) -> String {
        self.confirmed_user(email, "secret1", role).await;
        self.login(email, "secret1").await.access_token
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

fn token_after(html: &str, marker: &str) -> Option<String> {
    let start = html.find(marker)? + marker.len();
    let token: String = html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    (!token.is_empty()).then_some(token)
}

pub fn extract_confirmation_token(email: &Email) -> Option<String> {
    token_after(&email.html, "/api/auth/confirmed_email/")
}

pub fn extract_reset_token(email: &Email) -> Option<String> {
    token_after(&email.html, "<code id=\"reset-token\">")
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("build request")
}

pub async fn read_json(res: Response) -> (StatusCode, Value) {
    let status = res.status();
    let bytes = body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
