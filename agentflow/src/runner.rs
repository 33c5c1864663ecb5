//! Runs a root worker against a stored session.

use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::context::{ContextBag, RunContext, RunIdentity, WorkerContext, DEFAULT_USER_ID};
use crate::core::{Event, RunStatus};
use crate::errors::{AgentflowError, ConfigurationError, SessionError};
use crate::events::{EventSink, LifecycleEvent, NoOpEventSink};
use crate::session::{maybe_compact, SessionKey, SessionStore, Summarizer};
use crate::workers::{invoke, WorkerRef};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Session id used by [`Runner::run_debug`].
pub const DEBUG_SESSION_ID: &str = "debug_session";

/// The result of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The run's id; also the invocation id of its events.
    pub run_id: Uuid,
    /// Whether the run completed or was cancelled.
    pub status: RunStatus,
    /// The root worker's reply. Always `None` for a cancelled run.
    pub text: Option<String>,
    /// The context after the run, including `temp:` keys. For a cancelled
    /// run, the session's context as it was before the run.
    pub state: Map<String, Value>,
    /// Events committed to the session by this run.
    pub events: Vec<Event>,
    /// Wall time in milliseconds.
    pub duration_ms: f64,
}

impl RunOutcome {
    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Returns a context value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }
}

/// Drives a root worker for one app.
///
/// Each run loads the session, executes the root worker against the
/// session's context and, only if the run completes, appends the user
/// message and the run's events to the session. A cancelled or failed run
/// commits nothing.
pub struct Runner {
    app_name: String,
    root: WorkerRef,
    store: Arc<dyn SessionStore>,
    config: Arc<EngineConfig>,
    sink: Arc<dyn EventSink>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl Runner {
    /// Creates a runner with default config and no event sink.
    #[must_use]
    pub fn new(app_name: impl Into<String>, root: WorkerRef, store: Arc<dyn SessionStore>) -> Self {
        Self {
            app_name: app_name.into(),
            root,
            store,
            config: Arc::new(EngineConfig::default()),
            sink: Arc::new(NoOpEventSink),
            summarizer: None,
        }
    }

    /// Sets the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the config fails
    /// [`EngineConfig::validate`].
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        self.config = Arc::new(config);
        Ok(self)
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the summarizer used when compaction is configured.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Returns the app name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Returns the session store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Returns the key of a session of this app.
    #[must_use]
    pub fn session_key(&self, user_id: &str, session_id: &str) -> SessionKey {
        SessionKey::new(&self.app_name, user_id, session_id)
    }

    /// Runs `message` in an existing session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the session does not exist, and
    /// the root worker's error if the run fails. Cancellation is not an
    /// error; it is reported through [`RunOutcome::status`].
    pub async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
    ) -> Result<RunOutcome, AgentflowError> {
        self.run_with_cancel(user_id, session_id, message, Arc::new(CancellationToken::new()))
            .await
    }

    /// Runs `message` under an external cancellation token.
    ///
    /// # Errors
    ///
    /// See [`Runner::run`].
    pub async fn run_with_cancel(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
        cancel: Arc<CancellationToken>,
    ) -> Result<RunOutcome, AgentflowError> {
        let start = Instant::now();
        let key = self.session_key(user_id, session_id);
        let session = self.store.get(&key).await?.ok_or_else(|| SessionError::NotFound {
            app_name: key.app_name.clone(),
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
        })?;

        let identity = RunIdentity::new(&self.app_name, user_id, session_id);
        let run_id = identity.run_id;
        let run = Arc::new(
            RunContext::new(identity, self.config.clone(), self.sink.clone())
                .with_history(session.effective_history()),
        );
        let state = Arc::new(ContextBag::from_map(session.state.clone()));
        let ctx = WorkerContext::new(run.clone(), state.clone(), message, cancel);

        let output = match invoke(self.root.as_ref(), &ctx).await {
            Ok(output) => output,
            Err(e) if e.is_cancelled() => {
                let reason = ctx.cancel_token().reason().unwrap_or_default();
                warn!(%run_id, session_id, reason = %reason, "Run cancelled");
                run.emit(LifecycleEvent::run_cancelled(session_id, &reason));
                return Ok(RunOutcome {
                    run_id,
                    status: RunStatus::Cancelled,
                    text: None,
                    state: session.state,
                    events: Vec::new(),
                    duration_ms: start.elapsed().as_secs_f64() * 1000.0,
                });
            }
            Err(e) => return Err(e),
        };

        let mut events = vec![Event::user_message(run_id, message)];
        events.extend(run.take_events());
        self.store.append_events(&key, events.clone()).await?;
        if let Err(e) = self.compact(&key).await {
            warn!(%run_id, session_id, error = %e, "Compaction failed");
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(%run_id, session_id, events = events.len(), elapsed_ms = duration_ms, "Run completed");
        run.emit(LifecycleEvent::run_completed(session_id, events.len()));

        Ok(RunOutcome {
            run_id,
            status: RunStatus::Completed,
            text: output.text,
            state: state.to_map(),
            events,
            duration_ms,
        })
    }

    /// Runs `message` in the default user's debug session, creating it on
    /// first use.
    ///
    /// # Errors
    ///
    /// See [`Runner::run`].
    pub async fn run_debug(&self, message: &str) -> Result<RunOutcome, AgentflowError> {
        self.store
            .get_or_create(&self.session_key(DEFAULT_USER_ID, DEBUG_SESSION_ID))
            .await?;
        self.run(DEFAULT_USER_ID, DEBUG_SESSION_ID, message).await
    }

    async fn compact(&self, key: &SessionKey) -> Result<(), AgentflowError> {
        let (Some(config), Some(summarizer)) = (&self.config.compaction, &self.summarizer) else {
            return Ok(());
        };
        let Some(session) = self.store.get(key).await? else {
            return Ok(());
        };
        if let Some(event) = maybe_compact(config, summarizer.as_ref(), &session).await? {
            let invocations = event
                .compaction
                .as_ref()
                .map_or(0, |c| c.invocation_ids.len());
            self.store.append_event(key, event).await?;
            self.sink
                .try_emit(LifecycleEvent::session_compacted(&key.session_id, invocations));
        }
        Ok(())
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("app_name", &self.app_name)
            .field("root", &self.root.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SequentialComposer;
    use crate::core::WorkerOutput;
    use crate::decision::Decision;
    use crate::events::CollectingEventSink;
    use crate::session::{
        DecisionSummarizer, EventsCompactionConfig, InMemorySessionStore, JsonFileSessionStore,
    };
    use crate::testing::{FailingWorker, FnWorker, RecordingWorker, ScriptedDecider, SlowWorker};
    use crate::workers::{FunctionWorker, ToolResult};
    use serde_json::json;
    use std::time::Duration;

    fn store() -> Arc<InMemorySessionStore> {
        Arc::new(InMemorySessionStore::new())
    }

    #[tokio::test]
    async fn test_run_commits_user_and_worker_events() {
        let store = store();
        let root = Arc::new(RecordingWorker::new("greeter", "Hello Sam").with_output_key("greeting"));
        let runner = Runner::new("agents", root, store.clone());
        let key = runner.session_key("sam", "s1");
        store.create(&key, Map::new()).await.unwrap();

        let outcome = runner.run("sam", "s1", "Hi, I am Sam!").await.unwrap();

        assert!(outcome.is_completed());
        assert_eq!(outcome.text.as_deref(), Some("Hello Sam"));
        assert_eq!(outcome.get("greeting"), Some(&json!("Hello Sam")));

        let session = store.get(&key).await.unwrap().unwrap();
        assert_eq!(session.events.len(), 2);
        assert_eq!(session.events[0].text.as_deref(), Some("Hi, I am Sam!"));
        assert_eq!(session.events[1].author, "greeter");
        assert!(session.events.iter().all(|e| e.invocation_id == outcome.run_id));
        assert_eq!(session.get("greeting"), Some(&json!("Hello Sam")));
    }

    #[tokio::test]
    async fn test_missing_session_is_error() {
        let runner = Runner::new("agents", Arc::new(RecordingWorker::new("w", "x")), store());

        let err = runner.run("sam", "nope", "hi").await.unwrap_err();
        assert!(matches!(err, AgentflowError::Session(SessionError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_user_state_visible_in_new_session() {
        let store = store();
        let save = Arc::new(
            FunctionWorker::new("save_userinfo", |tool_ctx, _| {
                tool_ctx.set_state("user:name", json!("Sam"));
                tool_ctx.set_state("temp:raw", json!("scratch"));
                Ok(ToolResult::success())
            }),
        );
        let runner = Runner::new("agents", save, store.clone());
        store.create(&runner.session_key("sam", "s1"), Map::new()).await.unwrap();
        store.create(&runner.session_key("sam", "s2"), Map::new()).await.unwrap();

        let outcome = runner.run("sam", "s1", "I am Sam").await.unwrap();
        assert_eq!(outcome.get("temp:raw"), Some(&json!("scratch")));

        let other = store.get(&runner.session_key("sam", "s2")).await.unwrap().unwrap();
        assert_eq!(other.get("user:name"), Some(&json!("Sam")));
        assert!(other.get("temp:raw").is_none());
    }

    #[tokio::test]
    async fn test_cancelled_run_commits_nothing() {
        let store = store();
        let sink = Arc::new(CollectingEventSink::new());
        let first = Arc::new(RecordingWorker::new("first", "done").with_output_key("first_out"));
        let slow = Arc::new(SlowWorker::new("slow", Duration::from_secs(10)));
        let root = Arc::new(SequentialComposer::new("pipeline", vec![first, slow]).unwrap());
        let runner = Runner::new("agents", root, store.clone()).with_event_sink(sink.clone());
        let key = runner.session_key("sam", "s1");
        store.create(&key, Map::new()).await.unwrap();

        let token = Arc::new(CancellationToken::new());
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel("user abort");
        });

        let outcome = runner.run_with_cancel("sam", "s1", "go", token).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert!(outcome.text.is_none());
        assert!(outcome.events.is_empty());
        assert!(outcome.get("first_out").is_none());
        let session = store.get(&key).await.unwrap().unwrap();
        assert!(session.events.is_empty());
        assert!(session.get("first_out").is_none());
        assert_eq!(sink.events_of_type("run.cancelled").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_commits_nothing() {
        let store = store();
        let runner = Runner::new("agents", Arc::new(FailingWorker::new("bad", "boom")), store.clone());
        let key = runner.session_key("sam", "s1");
        store.create(&key, Map::new()).await.unwrap();

        assert!(runner.run("sam", "s1", "go").await.is_err());
        assert!(store.get(&key).await.unwrap().unwrap().events.is_empty());
    }

    #[tokio::test]
    async fn test_run_debug_reuses_session() {
        let store = store();
        let runner = Runner::new("agents", Arc::new(RecordingWorker::new("w", "ok")), store.clone());

        runner.run_debug("one").await.unwrap();
        runner.run_debug("two").await.unwrap();

        let session = store
            .get(&runner.session_key(DEFAULT_USER_ID, DEBUG_SESSION_ID))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.events.len(), 4);
    }

    #[tokio::test]
    async fn test_compaction_after_interval() {
        let store = store();
        let sink = Arc::new(CollectingEventSink::new());
        let summarizer = Arc::new(DecisionSummarizer::new(Arc::new(ScriptedDecider::repeating(
            Decision::reply("Sam asked about AI"),
        ))));
        let root = Arc::new(FnWorker::new("chat", |ctx| {
            Ok(WorkerOutput::text(format!("re: {}", ctx.request())))
        }));
        let runner = Runner::new("agents", root, store.clone())
            .with_config(EngineConfig::default().with_compaction(EventsCompactionConfig::new(3, 1)))
            .unwrap()
            .with_summarizer(summarizer)
            .with_event_sink(sink.clone());
        let key = runner.session_key("sam", "compaction_demo");
        store.create(&key, Map::new()).await.unwrap();

        for message in ["What is AI?", "Any examples?", "And in healthcare?", "Thanks"] {
            runner.run("sam", "compaction_demo", message).await.unwrap();
        }

        let session = store.get(&key).await.unwrap().unwrap();
        let compactions: Vec<&Event> = session.events.iter().filter(|e| e.is_compaction()).collect();
        assert_eq!(compactions.len(), 1);
        assert_eq!(compactions[0].compaction.as_ref().unwrap().invocation_ids.len(), 3);
        assert_eq!(sink.events_of_type("session.compacted").len(), 1);

        let history = session.effective_history();
        assert_eq!(history[0].text.as_deref(), Some("Sam asked about AI"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let runner = Runner::new("agents", Arc::new(RecordingWorker::new("w", "x")), store());

        let err = runner
            .with_config(EngineConfig::default().with_max_delegation_steps(0))
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::ConfigurationErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn test_failed_commit_records_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("sessions");
        std::fs::create_dir(&nested).unwrap();
        let store = Arc::new(JsonFileSessionStore::open(nested.join("s.json")).await.unwrap());
        let root = Arc::new(RecordingWorker::new("greeter", "Hello").with_output_key("greeting"));
        let runner = Runner::new("agents", root, store.clone());
        let key = runner.session_key("sam", "s1");
        store.create(&key, Map::new()).await.unwrap();

        std::fs::remove_dir_all(&nested).unwrap();
        let err = runner.run("sam", "s1", "hi").await.unwrap_err();

        assert!(matches!(err, AgentflowError::Session(SessionError::Persistence(_))));
        let session = store.get(&key).await.unwrap().unwrap();
        assert!(session.events.is_empty());
        assert!(session.get("greeting").is_none());
    }
}
