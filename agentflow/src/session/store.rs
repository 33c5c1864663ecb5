//! The session store trait and the state table shared by its implementations.

use super::{Session, SessionKey};
use crate::context::ContextScope;
use crate::core::Event;
use crate::errors::SessionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Persists sessions and their event logs.
///
/// Appending an event applies its state delta: `temp:` keys are dropped,
/// `app:` and `user:` keys are stored once per app and per user and merged
/// into every session of that scope on read, other keys stay with the
/// session.
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Creates a session seeded with `state`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyExists` if the key is taken.
    async fn create(&self, key: &SessionKey, state: Map<String, Value>) -> Result<Session, SessionError>;

    /// Loads a session, or `None` if it does not exist.
    async fn get(&self, key: &SessionKey) -> Result<Option<Session>, SessionError>;

    /// Appends an event to a session's log and applies its state delta.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the session does not exist.
    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<(), SessionError>;

    /// Appends several events as one commit: either all of them are
    /// recorded, or none are.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the session does not exist.
    async fn append_events(&self, key: &SessionKey, events: Vec<Event>) -> Result<(), SessionError>;

    /// Lists a user's sessions, without their events.
    async fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<Session>, SessionError>;

    /// Deletes a session. Deleting a missing session is not an error.
    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError>;

    /// Loads a session, creating it empty if it does not exist.
    async fn get_or_create(&self, key: &SessionKey) -> Result<Session, SessionError> {
        match self.get(key).await? {
            Some(session) => Ok(session),
            None => self.create(key, Map::new()).await,
        }
    }
}

/// Sessions plus app- and user-level state, in a serializable form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct SessionTable {
    #[serde(default)]
    sessions: BTreeMap<String, BTreeMap<String, BTreeMap<String, Session>>>,
    #[serde(default)]
    app_state: BTreeMap<String, Map<String, Value>>,
    #[serde(default)]
    user_state: BTreeMap<String, BTreeMap<String, Map<String, Value>>>,
}

impl SessionTable {
    pub(crate) fn create(
        &mut self,
        key: &SessionKey,
        state: Map<String, Value>,
    ) -> Result<Session, SessionError> {
        if self.stored(key).is_some() {
            return Err(SessionError::AlreadyExists {
                app_name: key.app_name.clone(),
                user_id: key.user_id.clone(),
                session_id: key.session_id.clone(),
            });
        }

        self.sessions
            .entry(key.app_name.clone())
            .or_default()
            .entry(key.user_id.clone())
            .or_default()
            .insert(key.session_id.clone(), Session::new(key));
        self.apply_delta(key, &state);

        self.get(key).ok_or_else(|| not_found(key))
    }

    pub(crate) fn get(&self, key: &SessionKey) -> Option<Session> {
        let mut session = self.stored(key)?.clone();
        self.merge_scoped_state(&mut session);
        Some(session)
    }

    pub(crate) fn append_event(&mut self, key: &SessionKey, mut event: Event) -> Result<(), SessionError> {
        event
            .state_delta
            .retain(|k, _| ContextScope::of(k) != ContextScope::Temp);
        let delta = event.state_delta.clone();

        let session = self.stored_mut(key).ok_or_else(|| not_found(key))?;
        session.updated_at = event.timestamp;
        session.events.push(event);

        self.apply_delta(key, &delta);
        Ok(())
    }

    pub(crate) fn append_events(&mut self, key: &SessionKey, events: Vec<Event>) -> Result<(), SessionError> {
        if self.stored(key).is_none() {
            return Err(not_found(key));
        }
        for event in events {
            self.append_event(key, event)?;
        }
        Ok(())
    }

    pub(crate) fn list(&self, app_name: &str, user_id: &str) -> Vec<Session> {
        let Some(sessions) = self.sessions.get(app_name).and_then(|u| u.get(user_id)) else {
            return Vec::new();
        };
        sessions
            .values()
            .map(|stored| {
                let mut session = stored.clone();
                session.events.clear();
                self.merge_scoped_state(&mut session);
                session
            })
            .collect()
    }

    pub(crate) fn delete(&mut self, key: &SessionKey) -> bool {
        self.sessions
            .get_mut(&key.app_name)
            .and_then(|users| users.get_mut(&key.user_id))
            .and_then(|sessions| sessions.remove(&key.session_id))
            .is_some()
    }

    fn stored(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions
            .get(&key.app_name)?
            .get(&key.user_id)?
            .get(&key.session_id)
    }

    fn stored_mut(&mut self, key: &SessionKey) -> Option<&mut Session> {
        self.sessions
            .get_mut(&key.app_name)?
            .get_mut(&key.user_id)?
            .get_mut(&key.session_id)
    }

    fn apply_delta(&mut self, key: &SessionKey, delta: &Map<String, Value>) {
        for (k, v) in delta {
            match ContextScope::of(k) {
                ContextScope::Temp => {}
                ContextScope::App => {
                    self.app_state
                        .entry(key.app_name.clone())
                        .or_default()
                        .insert(k.clone(), v.clone());
                }
                ContextScope::User => {
                    self.user_state
                        .entry(key.app_name.clone())
                        .or_default()
                        .entry(key.user_id.clone())
                        .or_default()
                        .insert(k.clone(), v.clone());
                }
                ContextScope::Session => {
                    if let Some(session) = self.stored_mut(key) {
                        session.state.insert(k.clone(), v.clone());
                    }
                }
            }
        }
    }

    fn merge_scoped_state(&self, session: &mut Session) {
        if let Some(app) = self.app_state.get(&session.app_name) {
            for (k, v) in app {
                session.state.insert(k.clone(), v.clone());
            }
        }
        if let Some(user) = self
            .user_state
            .get(&session.app_name)
            .and_then(|users| users.get(&session.user_id))
        {
            for (k, v) in user {
                session.state.insert(k.clone(), v.clone());
            }
        }
    }
}

pub(crate) fn not_found(key: &SessionKey) -> SessionError {
    SessionError::NotFound {
        app_name: key.app_name.clone(),
        user_id: key.user_id.clone(),
        session_id: key.session_id.clone(),
    }
}
