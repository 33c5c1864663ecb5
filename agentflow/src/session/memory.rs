//! In-memory session store.

use super::store::{SessionStore, SessionTable};
use super::{Session, SessionKey};
use crate::core::Event;
use crate::errors::SessionError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

/// Keeps sessions in process memory. Everything is lost on drop.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    table: RwLock<SessionTable>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, key: &SessionKey, state: Map<String, Value>) -> Result<Session, SessionError> {
        self.table.write().create(key, state)
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        Ok(self.table.read().get(key))
    }

    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<(), SessionError> {
        self.table.write().append_event(key, event)
    }

    async fn append_events(&self, key: &SessionKey, events: Vec<Event>) -> Result<(), SessionError> {
        self.table.write().append_events(key, events)
    }

    async fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<Session>, SessionError> {
        Ok(self.table.read().list(app_name, user_id))
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError> {
        self.table.write().delete(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_create_append_get() {
        let store = InMemorySessionStore::new();
        let key = SessionKey::new("app", "user", "s1");
        store.create(&key, Map::new()).await.unwrap();

        store
            .append_event(&key, Event::user_message(Uuid::new_v4(), "hello").with_state("k", json!(1)))
            .await
            .unwrap();

        let session = store.get(&key).await.unwrap().unwrap();
        assert_eq!(session.events.len(), 1);
        assert_eq!(session.get("k"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = InMemorySessionStore::new();
        let key = SessionKey::generate("app", "user");

        let first = store.get_or_create(&key).await.unwrap();
        let second = store.get_or_create(&key).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.list("app", "user").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let store = InMemorySessionStore::new();
        let key = SessionKey::new("app", "user", "missing");

        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.delete(&key).await.is_ok());
    }

    #[tokio::test]
    async fn test_append_events_commits_batch() {
        let store = InMemorySessionStore::new();
        let key = SessionKey::new("app", "user", "s1");
        store.create(&key, Map::new()).await.unwrap();
        let inv = Uuid::new_v4();

        store
            .append_events(
                &key,
                vec![
                    Event::user_message(inv, "hello"),
                    Event::new(inv, "agent").with_text("hi").with_state("k", json!(2)),
                ],
            )
            .await
            .unwrap();

        let session = store.get(&key).await.unwrap().unwrap();
        assert_eq!(session.events.len(), 2);
        assert_eq!(session.get("k"), Some(&json!(2)));
    }
}
