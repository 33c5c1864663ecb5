//! Sliding-window event compaction.
//!
//! Once `compaction_interval` invocations have accumulated since the last
//! summary, the events of those invocations plus the `overlap_size`
//! invocations before them are summarized into one event authored by
//! `system`. The summarized events stay in the log; readers that want the
//! compacted view use [`Session::effective_history`].

use super::Session;
use crate::context::ContextSnapshot;
use crate::core::{Event, EventCompaction};
use crate::decision::{with_retry, Decider, DecisionRequest, RetryOptions};
use crate::errors::{AgentflowError, ConfigurationError, DecisionFailure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Write};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// When and how much to compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsCompactionConfig {
    /// New invocations that trigger a compaction.
    pub compaction_interval: usize,
    /// Earlier invocations repeated in each summary window.
    #[serde(default)]
    pub overlap_size: usize,
}

impl EventsCompactionConfig {
    /// Creates a compaction config.
    #[must_use]
    pub fn new(compaction_interval: usize, overlap_size: usize) -> Self {
        Self {
            compaction_interval,
            overlap_size,
        }
    }

    /// Checks that the interval is positive.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `compaction_interval` is zero.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.compaction_interval == 0 {
            return Err(ConfigurationError::invalid_config(
                "compaction.compaction_interval must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Turns a window of events into a summary.
#[async_trait]
pub trait Summarizer: Send + Sync + Debug {
    /// Summarizes `events`, oldest first.
    async fn summarize(&self, events: &[Event]) -> Result<String, AgentflowError>;
}

const SUMMARY_INSTRUCTION: &str =
    "Summarize the conversation below. Keep names, decisions and open questions.";

/// A summarizer backed by a [`Decider`]. The transcript is sent as the
/// request and the reply text is the summary.
#[derive(Debug)]
pub struct DecisionSummarizer {
    decider: Arc<dyn Decider>,
    retry: RetryOptions,
}

impl DecisionSummarizer {
    /// Creates a summarizer with default retry options.
    #[must_use]
    pub fn new(decider: Arc<dyn Decider>) -> Self {
        Self {
            decider,
            retry: RetryOptions::default(),
        }
    }

    /// Sets the retry options for the decision call.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

fn transcript(events: &[Event]) -> String {
    let mut out = String::new();
    for event in events {
        if let Some(text) = &event.text {
            let _ = writeln!(out, "{}: {text}", event.author);
        }
    }
    out
}

#[async_trait]
impl Summarizer for DecisionSummarizer {
    async fn summarize(&self, events: &[Event]) -> Result<String, AgentflowError> {
        let request = DecisionRequest {
            worker: "summarizer".to_string(),
            instruction: SUMMARY_INSTRUCTION.to_string(),
            request: transcript(events),
            context: ContextSnapshot::new(),
            available: Vec::new(),
            steps: Vec::new(),
            history: Vec::new(),
        };
        let decision = with_retry(
            &self.retry,
            "summarizer",
            |failure: &DecisionFailure| failure.is_retryable(&self.retry.http_status_codes),
            || self.decider.decide(&request),
        )
        .await?;

        decision
            .text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AgentflowError::worker("summarizer", "decider returned no summary"))
    }
}

/// Returns the invocations the next compaction would cover, or `None` if
/// fewer than `compaction_interval` invocations are new.
#[must_use]
pub fn compaction_window(config: &EventsCompactionConfig, session: &Session) -> Option<Vec<Uuid>> {
    let invocations = session.invocation_ids();
    let first_new = session
        .last_compaction()
        .and_then(|e| e.compaction.as_ref())
        .and_then(|c| c.invocation_ids.last())
        .and_then(|last| invocations.iter().position(|id| id == last))
        .map_or(0, |pos| pos + 1);

    if invocations.len() - first_new < config.compaction_interval.max(1) {
        return None;
    }
    let start = first_new.saturating_sub(config.overlap_size);
    Some(invocations[start..].to_vec())
}

/// Summarizes the session's latest window if it is due, returning the
/// compaction event for the caller to append.
///
/// # Errors
///
/// Propagates the summarizer's failure.
pub async fn maybe_compact(
    config: &EventsCompactionConfig,
    summarizer: &dyn Summarizer,
    session: &Session,
) -> Result<Option<Event>, AgentflowError> {
    let Some(window) = compaction_window(config, session) else {
        return Ok(None);
    };
    let events: Vec<Event> = session
        .events
        .iter()
        .filter(|e| !e.is_compaction() && window.contains(&e.invocation_id))
        .cloned()
        .collect();
    let (Some(first), Some(last), Some(latest)) = (events.first(), events.last(), window.last()) else {
        return Ok(None);
    };

    let summary = summarizer.summarize(&events).await?;
    debug!(
        session_id = %session.id,
        invocations = window.len(),
        events = events.len(),
        "Session compacted"
    );

    Ok(Some(Event::compaction(
        *latest,
        EventCompaction {
            start_timestamp: first.timestamp,
            end_timestamp: last.timestamp,
            invocation_ids: window.clone(),
            summary,
        },
    )))
}
