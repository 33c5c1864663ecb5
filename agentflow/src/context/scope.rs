//! Scoped context keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix for keys shared by every user of an app.
pub const APP_PREFIX: &str = "app:";
/// Prefix for keys persisted across a user's sessions.
pub const USER_PREFIX: &str = "user:";
/// Prefix for keys that live only for one run.
pub const TEMP_PREFIX: &str = "temp:";

/// The persistence scope of a context key, derived from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    /// `app:` keys.
    App,
    /// `user:` keys.
    User,
    /// `temp:` keys, never persisted.
    Temp,
    /// Unprefixed keys, persisted with the session.
    Session,
}

impl ContextScope {
    /// Classifies a key.
    #[must_use]
    pub fn of(key: &str) -> Self {
        if key.starts_with(APP_PREFIX) {
            Self::App
        } else if key.starts_with(USER_PREFIX) {
            Self::User
        } else if key.starts_with(TEMP_PREFIX) {
            Self::Temp
        } else {
            Self::Session
        }
    }

    /// Returns true if keys of this scope outlive the run.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Temp)
    }

    /// Returns the key prefix, empty for session scope.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::App => APP_PREFIX,
            Self::User => USER_PREFIX,
            Self::Temp => TEMP_PREFIX,
            Self::Session => "",
        }
    }
}

impl fmt::Display for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App => write!(f, "app"),
            Self::User => write!(f, "user"),
            Self::Temp => write!(f, "temp"),
            Self::Session => write!(f, "session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_of() {
        assert_eq!(ContextScope::of("user:name"), ContextScope::User);
        assert_eq!(ContextScope::of("app:theme"), ContextScope::App);
        assert_eq!(ContextScope::of("temp:scratch"), ContextScope::Temp);
        assert_eq!(ContextScope::of("current_story"), ContextScope::Session);
        assert_eq!(ContextScope::of("username"), ContextScope::Session);
    }

    #[test]
    fn test_persistence() {
        assert!(ContextScope::User.is_persistent());
        assert!(ContextScope::Session.is_persistent());
        assert!(!ContextScope::Temp.is_persistent());
        assert_eq!(ContextScope::Temp.prefix(), "temp:");
    }
}
