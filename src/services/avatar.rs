use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{config::AvatarConfig, error::AppError};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file is empty")]
    Empty,

    #[error("file exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("unsupported content type {0}")]
    UnsupportedType(String),

    #[error("failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(_) => {
                tracing::error!(error = %err, "avatar storage failed");
                AppError::internal("Avatar storage failed")
            }
            _ => AppError::bad_request(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAvatar {
    pub url: String,
    pub version: i64,
}

#[async_trait]
pub trait AvatarStorage: Send + Sync {
    /// Stores `bytes` under `identifier`, replacing any previous upload.
    async fn upload(
        &self,
        bytes: &[u8],
        identifier: &str,
        content_type: &str,
    ) -> Result<StoredAvatar, UploadError>;
}

const EXTENSIONS: [&str; 4] = ["png", "jpg", "gif", "webp"];

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Default avatar for a new account, keyed by the normalized email.
pub fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?d=identicon",
        hex::encode(digest)
    )
}

/// Writes avatars to a directory served under `public_path`.
pub struct LocalAvatarStorage {
    dir: PathBuf,
    public_path: String,
    max_bytes: usize,
}

impl LocalAvatarStorage {
    pub fn new(cfg: &AvatarConfig) -> Self {
        Self {
            dir: PathBuf::from(&cfg.dir),
            public_path: cfg.public_path.trim_end_matches('/').to_string(),
            max_bytes: cfg.max_bytes,
        }
    }
}

#[async_trait]
impl AvatarStorage for LocalAvatarStorage {
    async fn upload(
        &self,
        bytes: &[u8],
        identifier: &str,
        content_type: &str,
    ) -> Result<StoredAvatar, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let extension = extension_for(content_type)
            .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        for stale in EXTENSIONS.iter().filter(|ext| **ext != extension) {
            match tokio::fs::remove_file(self.dir.join(format!("{identifier}.{stale}"))).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        let file_name = format!("{identifier}.{extension}");
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;

        let version = chrono::Utc::now().timestamp();
        Ok(StoredAvatar {
            url: format!("{}/{file_name}?v={version}", self.public_path),
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AvatarStorage, LocalAvatarStorage, UploadError, gravatar_url};
    use crate::config::AvatarConfig;

    fn storage(dir: &std::path::Path) -> LocalAvatarStorage {
        LocalAvatarStorage::new(&AvatarConfig {
            dir: dir.to_string_lossy().into_owned(),
            public_path: "/static/avatars/".to_string(),
            max_bytes: 8,
        })
    }

    #[tokio::test]
    async fn stores_file_and_returns_versioned_url() {
        let dir = std::env::temp_dir().join(format!("avatars-{}", uuid::Uuid::new_v4()));
        let stored = storage(&dir)
            .upload(b"\x89PNG", "user-1", "image/png")
            .await
            .expect("upload should succeed");

        assert!(stored.url.starts_with("/static/avatars/user-1.png?v="));
        let written = tokio::fs::read(dir.join("user-1.png"))
            .await
            .expect("file should exist");
        assert_eq!(written, b"\x89PNG");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn rejects_bad_uploads() {
        let dir = std::env::temp_dir().join(format!("avatars-{}", uuid::Uuid::new_v4()));
        let storage = storage(&dir);

        assert!(matches!(
            storage.upload(b"", "u", "image/png").await,
            Err(UploadError::Empty)
        ));
        assert!(matches!(
            storage.upload(b"123456789", "u", "image/png").await,
            Err(UploadError::TooLarge { limit: 8 })
        ));
        assert!(matches!(
            storage.upload(b"1", "u", "text/plain").await,
            Err(UploadError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn reupload_with_new_type_replaces_previous_file() {
        let dir = std::env::temp_dir().join(format!("avatars-{}", uuid::Uuid::new_v4()));
        let storage = storage(&dir);

        storage
            .upload(b"\x89PNG", "user-1", "image/png")
            .await
            .expect("png upload should succeed");
        let stored = storage
            .upload(b"\xff\xd8\xff", "user-1", "image/jpeg")
            .await
            .expect("jpeg upload should succeed");

        assert!(stored.url.starts_with("/static/avatars/user-1.jpg?v="));
        assert!(!dir.join("user-1.png").exists());
        assert!(dir.join("user-1.jpg").exists());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn gravatar_hash_ignores_case_and_whitespace() {
        let url = gravatar_url(" Alice@Example.com ");
        assert_eq!(url, gravatar_url("alice@example.com"));
        assert!(url.starts_with("https://www.gravatar.com/avatar/"));
        assert!(url.ends_with("?d=identicon"));
        // 32-byte digest, hex encoded.
        let hash = &url["https://www.gravatar.com/avatar/".len()..url.len() - "?d=identicon".len()];
        assert_eq!(hash.len(), 64);
    }
}
