//! Sessions: persistent context and the append-only event log.

mod compaction;
mod file;
mod memory;
mod model;
mod store;

pub use compaction::{
    compaction_window, maybe_compact, DecisionSummarizer, EventsCompactionConfig, Summarizer,
};
pub use file::JsonFileSessionStore;
pub use memory::InMemorySessionStore;
pub use model::{Session, SessionKey};
pub use store::SessionStore;
