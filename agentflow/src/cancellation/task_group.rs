//! Structured task group for sibling workers.

use super::CancellationToken;
use crate::errors::AgentflowError;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

type TaskHandle<T> = (String, JoinHandle<Result<T, AgentflowError>>);

/// A group of related tasks with structured cancellation.
///
/// Tasks share a token derived from the parent's token. The first task to
/// fail cancels the group; every task is still awaited before `join`
/// returns. Dropping the group before `join` completes cancels its token
/// and aborts every task, so no task outlives the group.
pub struct StructuredTaskGroup<T> {
    /// The cancellation token for this group.
    cancel_token: Arc<CancellationToken>,
    /// Handles to spawned tasks, in spawn order.
    handles: RwLock<Vec<TaskHandle<T>>>,
    /// Abort handles for every spawned task, kept until drop.
    aborts: RwLock<Vec<AbortHandle>>,
    /// Set once `join` has awaited every task.
    joined: AtomicBool,
}

impl<T: Send + 'static> StructuredTaskGroup<T> {
    /// Creates a group whose token follows `parent`.
    #[must_use]
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            cancel_token: parent.child_token(),
            handles: RwLock::new(Vec::new()),
            aborts: RwLock::new(Vec::new()),
            joined: AtomicBool::new(false),
        }
    }

    /// Returns the group's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel_token
    }

    /// Spawns a named task in the group.
    pub fn spawn<F, Fut>(&self, name: &str, task: F)
    where
        F: FnOnce(Arc<CancellationToken>) -> Fut,
        Fut: Future<Output = Result<T, AgentflowError>> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.cancel_token.clone()));
        self.aborts.write().push(handle.abort_handle());
        self.handles.write().push((name.to_string(), handle));
    }

    /// Cancels all tasks in the group.
    pub fn cancel_all(&self, reason: &str) {
        self.cancel_token.cancel(reason);
    }

    /// Waits for every task and returns their results in spawn order.
    ///
    /// The first failure (in completion order) cancels the remaining tasks
    /// and is returned once they have all finished.
    pub async fn join(&self) -> Result<Vec<(String, T)>, AgentflowError> {
        let handles: Vec<_> = std::mem::take(&mut *self.handles.write());
        let mut results: Vec<Option<(String, T)>> = handles.iter().map(|_| None).collect();
        let mut first_error: Option<AgentflowError> = None;

        let mut pending: FuturesUnordered<_> = handles
            .into_iter()
            .enumerate()
            .map(|(index, (name, handle))| async move { (index, name, handle.await) })
            .collect();

        while let Some((index, name, joined)) = pending.next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(join_error) => Err(AgentflowError::worker(
                    &name,
                    format!("task join error: {join_error}"),
                )),
            };

            match outcome {
                Ok(value) => results[index] = Some((name, value)),
                Err(e) => {
                    if first_error.is_none() {
                        debug!(task = %name, error = %e, "Task failed, cancelling siblings");
                        self.cancel_token.cancel(format!("sibling '{name}' failed"));
                        first_error = Some(e);
                    }
                }
            }
        }

        self.joined.store(true, Ordering::SeqCst);
        match first_error {
            Some(e) => Err(e),
            None => Ok(results.into_iter().flatten().collect()),
        }
    }

    /// Returns the number of pending tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.read().len()
    }
}

impl<T> Drop for StructuredTaskGroup<T> {
    fn drop(&mut self) {
        let aborts = std::mem::take(&mut *self.aborts.write());
        if aborts.is_empty() || self.joined.load(Ordering::SeqCst) {
            return;
        }
        debug!(tasks = aborts.len(), "Task group dropped before join, aborting tasks");
        self.cancel_token.cancel("task group dropped");
        for handle in aborts {
            handle.abort();
        }
    }
}

impl<T> std::fmt::Debug for StructuredTaskGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredTaskGroup")
            .field("task_count", &self.handles.read().len())
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}
