//! Deciders that stand in for a model.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::decision::{Decider, Decision, DecisionRequest};
use crate::errors::DecisionFailure;

/// A decider that plays back a script and records every request.
///
/// When the script runs out it repeats its fallback decision, if one was
/// given, and otherwise fails.
#[derive(Debug, Default)]
pub struct ScriptedDecider {
    script: Mutex<VecDeque<Result<Decision, DecisionFailure>>>,
    fallback: Option<Decision>,
    requests: Mutex<Vec<DecisionRequest>>,
}

impl ScriptedDecider {
    /// Plays back `decisions` in order.
    #[must_use]
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self::from_results(decisions.into_iter().map(Ok).collect())
    }

    /// Plays back decisions and failures in order.
    #[must_use]
    pub fn from_results(results: Vec<Result<Decision, DecisionFailure>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    /// Returns the same decision forever.
    #[must_use]
    pub fn repeating(decision: Decision) -> Self {
        Self {
            fallback: Some(decision),
            ..Self::default()
        }
    }

    /// Returns every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of unplayed script entries.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl Decider for ScriptedDecider {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, DecisionFailure> {
        self.requests.lock().push(request.clone());
        let next = self.script.lock().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| DecisionFailure::new(&request.worker, "script exhausted")),
        }
    }
}

/// A decider that always fails the same way.
#[derive(Debug)]
pub struct FailingDecider {
    failure: DecisionFailure,
    calls: AtomicUsize,
}

impl FailingDecider {
    /// Creates a failing decider.
    #[must_use]
    pub fn new(failure: DecisionFailure) -> Self {
        Self {
            failure,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decider for FailingDecider {
    async fn decide(&self, _request: &DecisionRequest) -> Result<Decision, DecisionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.failure.clone())
    }
}
