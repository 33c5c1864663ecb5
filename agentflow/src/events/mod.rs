//! Lifecycle events for observability.
//!
//! Workers, composers and the runner report what they do as
//! [`LifecycleEvent`]s delivered to an [`EventSink`]. Sinks never affect
//! control flow: a sink that fails only logs.

mod lifecycle;
mod sink;

pub use lifecycle::LifecycleEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
