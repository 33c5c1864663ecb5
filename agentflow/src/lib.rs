//! # Agentflow
//!
//! Composable worker pipelines over a shared, scoped run context.
//!
//! Agentflow builds multi-step agents out of small workers:
//!
//! - **Composers**: sequential, parallel (isolated contexts merged at a join)
//!   and loop (exit signal or iteration cap)
//! - **Delegating workers**: a [`decision::Decider`] picks which sub-workers
//!   to call and when to reply
//! - **Function tools**: typed parameters, structured results whose error
//!   status is data rather than a failure
//! - **Sessions**: an append-only event log with scoped state and
//!   sliding-window compaction
//! - **Cancellation**: one token per run, observed by every worker
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentflow::prelude::*;
//!
//! let pipeline = SequentialComposer::new(
//!     "BlogPipeline",
//!     vec![outline_agent, writer_agent, editor_agent],
//! )?;
//!
//! let runner = Runner::new("agents", Arc::new(pipeline), Arc::new(InMemorySessionStore::new()));
//! let outcome = runner.run_debug("Write a post about Rust").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod compose;
pub mod config;
pub mod context;
pub mod core;
pub mod decision;
pub mod errors;
pub mod events;
pub mod observability;
pub mod runner;
pub mod session;
pub mod testing;
pub mod workers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, StructuredTaskGroup};
    pub use crate::compose::{LoopComposer, LoopState, ParallelComposer, SequentialComposer};
    pub use crate::config::EngineConfig;
    pub use crate::context::{
        ContextBag, ContextScope, ContextSnapshot, RunContext, RunIdentity, WorkerContext,
    };
    pub use crate::core::{Event, LoopStatus, RunStatus, WorkerKind, WorkerOutput};
    pub use crate::decision::{
        Decider, Decision, DecisionRequest, RetryOptions, StepRecord, ToolCall, WorkerSpec,
    };
    pub use crate::errors::{
        AgentflowError, ConfigurationError, ConfigurationErrorKind, DecisionFailure,
        SessionError, ToolInvocationError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::runner::{RunOutcome, Runner};
    pub use crate::session::{
        DecisionSummarizer, EventsCompactionConfig, InMemorySessionStore, JsonFileSessionStore,
        Session, SessionKey, SessionStore, Summarizer,
    };
    pub use crate::workers::{
        invoke, DelegatingWorker, FunctionWorker, ParameterSpec, ParameterType, ToolContext,
        ToolResult, ToolStatus, Worker, WorkerRef,
    };
}
