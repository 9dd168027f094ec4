//! Journal Query
//!
//! Replay-then-live queries over an append-only, per-entity event journal.
//! A query first streams what the journal already holds, then continues
//! with events appended after it started, without gaps, duplicates or
//! reordering within an entity.
//!
//! # Features
//!
//! - **Finite and live queries**: per entity, across all entities, and
//!   distinct entity ids
//! - **Gap-free hand-off**: live events that race ahead of history are held
//!   and released in sequence order
//! - **Bounded live buffers**: a slow consumer sheds its oldest live events
//!   and the merge engine re-reads the gap from history
//! - **Pull-based**: nothing is read until the consumer polls, and dropping
//!   a stream releases its cursor and live registration
//!
//! # Modules
//!
//! - `types`: Event model, envelopes, offsets and errors
//! - `journal`: Collaborator traits plus in-memory and file journals
//! - `source`: Historical pager and live feed adapters
//! - `stages`: Scope filter, truncation, duplicate suppression, envelopes
//! - `merge`: Replay-to-live merge engine
//! - `query`: Query façade and configuration
//! - `utils`: Timestamp helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use journal_query::{JournalQuery, MemoryJournal};
//!
//! # async fn run() -> journal_query::QueryResult<()> {
//! let journal = Arc::new(MemoryJournal::new());
//! journal.append("acct-1", serde_json::json!({"deposit": 10}));
//!
//! let query = JournalQuery::from_journal(journal.clone());
//! let mut events = query.events_for_entity("acct-1", 0, u64::MAX)?;
//! while let Some(envelope) = events.next().await {
//!     let envelope = envelope?;
//!     println!("{} #{}", envelope.persistence_id, envelope.sequence_nr);
//! }
//! # Ok(())
//! # }
//! ```

pub mod journal;
pub mod merge;
pub mod query;
pub mod source;
pub mod stages;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use journal::{
    Broadcaster, FileJournal, FileJournalConfig, JournalStore, LiveNotifier, LiveSignal,
    MemoryJournal, Page, Scope, SubscriptionId,
};
pub use query::{JournalQuery, QueryConfig};
pub use types::{
    EnvelopeStream, Event, EventEnvelope, EventStream, JournalError, JournalResult, Offset,
    PersistenceIdStream, QueryError, QueryResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
