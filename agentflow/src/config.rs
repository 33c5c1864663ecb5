//! Engine configuration.

use crate::decision::RetryOptions;
use crate::errors::{AgentflowError, ConfigurationError};
use crate::session::EventsCompactionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_max_iterations() -> u32 {
    10
}

fn default_max_delegation_steps() -> usize {
    16
}

/// Settings shared by every worker of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry options passed through to decision calls.
    #[serde(default)]
    pub retry: RetryOptions,

    /// Iteration cap used by loop composers built without an explicit cap.
    #[serde(default = "default_max_iterations")]
    pub default_max_iterations: u32,

    /// Bound on decision rounds of a delegating worker.
    #[serde(default = "default_max_delegation_steps")]
    pub max_delegation_steps: usize,

    /// Session event compaction; disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compaction: Option<EventsCompactionConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            default_max_iterations: default_max_iterations(),
            max_delegation_steps: default_max_delegation_steps(),
            compaction: None,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry options.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the default loop cap.
    #[must_use]
    pub fn with_default_max_iterations(mut self, cap: u32) -> Self {
        self.default_max_iterations = cap;
        self
    }

    /// Sets the delegation step bound.
    #[must_use]
    pub fn with_max_delegation_steps(mut self, steps: usize) -> Self {
        self.max_delegation_steps = steps;
        self
    }

    /// Enables event compaction.
    #[must_use]
    pub fn with_compaction(mut self, compaction: EventsCompactionConfig) -> Self {
        self.compaction = Some(compaction);
        self
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, AgentflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AgentflowError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks that every bound is usable.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.retry.attempts == 0 {
            return Err(ConfigurationError::invalid_config(
                "retry.attempts must be at least 1",
            ));
        }
        if self.default_max_iterations == 0 {
            return Err(ConfigurationError::invalid_config(
                "default_max_iterations must be at least 1",
            ));
        }
        if self.max_delegation_steps == 0 {
            return Err(ConfigurationError::invalid_config(
                "max_delegation_steps must be at least 1",
            ));
        }
        if let Some(compaction) = &self.compaction {
            compaction.validate()?;
        }
        Ok(())
    }
}
