//! Run identity for correlating a run with its session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default app name used by ad-hoc runs.
pub const DEFAULT_APP_NAME: &str = "default";
/// Default user id used by ad-hoc runs.
pub const DEFAULT_USER_ID: &str = "default_user";

/// Identifies one run and the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Unique id of this run; also the invocation id on its events.
    pub run_id: Uuid,
    /// The app the session belongs to.
    pub app_name: String,
    /// The user the session belongs to.
    pub user_id: String,
    /// The session id.
    pub session_id: String,
}

impl RunIdentity {
    /// Creates a new identity with a fresh run id.
    #[must_use]
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Creates an identity for a run without a stored session.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::new(DEFAULT_APP_NAME, DEFAULT_USER_ID, Uuid::new_v4().to_string())
    }

    /// Converts to a JSON object for event enrichment.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id.to_string(),
            "app_name": self.app_name,
            "user_id": self.user_id,
            "session_id": self.session_id,
        })
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::ephemeral()
    }
}
