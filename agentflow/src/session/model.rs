//! Session records.

use crate::core::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Addresses one session of one user of one app.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// The app name.
    pub app_name: String,
    /// The user id.
    pub user_id: String,
    /// The session id.
    pub session_id: String,
}

impl SessionKey {
    /// Creates a key.
    #[must_use]
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Creates a key with a fresh session id.
    #[must_use]
    pub fn generate(app_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(app_name, user_id, Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// A conversation: its context and its append-only event log.
///
/// `state` as returned by a store already contains the app- and user-level
/// keys of the session's scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The session id.
    pub id: String,
    /// The app name.
    pub app_name: String,
    /// The user id.
    pub user_id: String,
    /// Persistent context.
    #[serde(default)]
    pub state: Map<String, Value>,
    /// The event log.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Time of the last append.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new(key: &SessionKey) -> Self {
        Self {
            id: key.session_id.clone(),
            app_name: key.app_name.clone(),
            user_id: key.user_id.clone(),
            state: Map::new(),
            events: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Returns the session's key.
    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.app_name, &self.user_id, &self.id)
    }

    /// Returns a context value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Returns the invocation ids in order of first appearance, ignoring
    /// compaction events.
    #[must_use]
    pub fn invocation_ids(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.events
            .iter()
            .filter(|e| !e.is_compaction())
            .filter(|e| seen.insert(e.invocation_id))
            .map(|e| e.invocation_id)
            .collect()
    }

    /// Returns the most recent compaction event.
    #[must_use]
    pub fn last_compaction(&self) -> Option<&Event> {
        self.events.iter().rev().find(|e| e.is_compaction())
    }

    /// Returns the log as a decider should see it: events covered by a
    /// compaction are replaced by the summary, placed where the covered
    /// window ended.
    #[must_use]
    pub fn effective_history(&self) -> Vec<Event> {
        let covered: HashSet<Uuid> = self
            .events
            .iter()
            .filter_map(|e| e.compaction.as_ref())
            .flat_map(|c| c.invocation_ids.iter().copied())
            .collect();

        self.events
            .iter()
            .filter(|e| e.is_compaction() || !covered.contains(&e.invocation_id))
            .map(|e| match &e.compaction {
                Some(c) => e.clone().with_text(c.summary.clone()),
                None => e.clone(),
            })
            .collect()
    }
}
