// session-client/src/storage.rs
use async_trait::async_trait;
use common::models::PersistedSession;
use common::AuthError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Where session material survives restarts
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn load(&self) -> Result<Option<PersistedSession>, AuthError>;
    async fn save(&self, session: &PersistedSession) -> Result<(), AuthError>;
    async fn clear(&self) -> Result<(), AuthError>;
}

fn storage_error(err: impl std::fmt::Display) -> AuthError {
    AuthError::Internal(format!("session storage: {}", err))
}

/// JSON file holding `{accessToken, refreshToken, userData}`
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn load(&self) -> Result<Option<PersistedSession>, AuthError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        };

        match serde_json::from_slice(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("Discarding unreadable session file {}: {}", self.path.display(), e);
                self.clear().await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
        }
        let raw = serde_json::to_vec_pretty(session).map_err(storage_error)?;

        // Atomic replace via rename
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw).await.map_err(storage_error)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(storage_error)
    }

    async fn clear(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    session: Mutex<Option<PersistedSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load(&self) -> Result<Option<PersistedSession>, AuthError> {
        Ok(self.session.lock().await.clone())
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), AuthError> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        self.session.lock().await.take();
        Ok(())
    }
}
