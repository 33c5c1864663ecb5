//! JSON-file session store.

use super::store::{SessionStore, SessionTable};
use super::{Session, SessionKey};
use crate::core::Event;
use crate::errors::SessionError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Persists every session to a single JSON file.
///
/// The whole table is rewritten after each mutation, through a temporary
/// file renamed over the target. A mutation becomes visible only once its
/// write has succeeded. Reopening the file resumes its sessions.
#[derive(Debug)]
pub struct JsonFileSessionStore {
    path: PathBuf,
    table: Mutex<SessionTable>,
}

impl JsonFileSessionStore {
    /// Opens the store at `path`, loading it if the file exists.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Persistence` if the file cannot be read or
    /// does not hold a session table.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        let table = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SessionError::Persistence(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionTable::default(),
            Err(e) => return Err(SessionError::Persistence(format!("{}: {e}", path.display()))),
        };
        debug!(path = %path.display(), "Session store opened");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, table: &SessionTable) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec_pretty(table)
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| SessionError::Persistence(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SessionError::Persistence(format!("{}: {e}", self.path.display())))
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn create(&self, key: &SessionKey, state: Map<String, Value>) -> Result<Session, SessionError> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        let session = next.create(key, state)?;
        self.save(&next).await?;
        *table = next;
        Ok(session)
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        Ok(self.table.lock().await.get(key))
    }

    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<(), SessionError> {
        self.append_events(key, vec![event]).await
    }

    async fn append_events(&self, key: &SessionKey, events: Vec<Event>) -> Result<(), SessionError> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        next.append_events(key, events)?;
        self.save(&next).await?;
        *table = next;
        Ok(())
    }

    async fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<Session>, SessionError> {
        Ok(self.table.lock().await.list(app_name, user_id))
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        if next.delete(key) {
            self.save(&next).await?;
            *table = next;
        }
        Ok(())
    }
}
