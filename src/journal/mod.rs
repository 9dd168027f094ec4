//! Journal collaborators
//!
//! The query pipelines consume two collaborators:
//! - `JournalStore`: pull-based, paginated access to persisted events
//! - `LiveNotifier`: push-based notification of newly appended events
//!
//! Reference implementations live next to the traits:
//! - `Broadcaster`: in-process handler registry implementing `LiveNotifier`
//! - `MemoryJournal`: in-memory store + notifier
//! - `FileJournal`: JSON-lines file store + notifier
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌─────────┐    ┌──────────────┐    ┌──────────────────────┐
//! │ append  │───►│ persist event│───►│ Broadcaster::publish │───► live handlers
//! └─────────┘    └──────────────┘    └──────────────────────┘
//!
//! Read Path (per query):
//! ┌──────────────────────────┐    ┌────────────────────────────┐
//! │ resolve_initial_cursor() │───►│ fetch_page(cursor, at_most)│───► ... until next == None
//! └──────────────────────────┘    └────────────────────────────┘
//! ```

mod broadcaster;
mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{Event, JournalResult};

pub use broadcaster::Broadcaster;
pub use file::{FileCursor, FileJournal, FileJournalConfig};
pub use memory::{MemoryCursor, MemoryJournal};

/// What a historical scan covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// One entity, inclusive sequence number bounds
    Entity {
        persistence_id: String,
        from_sequence_nr: u64,
        to_sequence_nr: u64,
    },
    /// Every entity, events written at or after `from_offset`
    All { from_offset: i64 },
}

impl Scope {
    /// Scope covering one entity between two inclusive bounds
    pub fn entity(persistence_id: impl Into<String>, from_sequence_nr: u64, to_sequence_nr: u64) -> Self {
        Scope::Entity {
            persistence_id: persistence_id.into(),
            from_sequence_nr,
            to_sequence_nr,
        }
    }

    /// Scope covering the whole journal from a write-time offset
    pub fn all(from_offset: i64) -> Self {
        Scope::All { from_offset }
    }

    /// The entity this scope is restricted to, if any
    pub fn persistence_id(&self) -> Option<&str> {
        match self {
            Scope::Entity { persistence_id, .. } => Some(persistence_id),
            Scope::All { .. } => None,
        }
    }

    /// Whether an event falls inside this scope
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Scope::Entity {
                persistence_id,
                from_sequence_nr,
                to_sequence_nr,
            } => {
                event.persistence_id == *persistence_id
                    && event.sequence_nr >= *from_sequence_nr
                    && event.sequence_nr <= *to_sequence_nr
            }
            Scope::All { from_offset } => event.timestamp >= *from_offset,
        }
    }
}

/// One batch of a historical scan
#[derive(Debug)]
pub struct Page<C> {
    /// Events in ascending sequence (entity scope) or write order (all scope)
    pub events: Vec<Event>,
    /// Where to continue, `None` once the scan is exhausted
    pub next: Option<C>,
}

impl<C> Page<C> {
    /// The final page of a scan
    pub fn last(events: Vec<Event>) -> Self {
        Self { events, next: None }
    }
}

/// Pull-based access to persisted events
///
/// Cursors are opaque to callers. A cursor is consumed by `fetch_page`;
/// dropping it releases whatever the store holds for the scan.
#[async_trait]
pub trait JournalStore: Send + Sync + 'static {
    type Cursor: Send + 'static;

    /// Establish the starting position of a scan
    async fn resolve_initial_cursor(&self, scope: &Scope) -> JournalResult<Self::Cursor>;

    /// Read at most `at_most` events from `cursor`
    async fn fetch_page(&self, cursor: Self::Cursor, at_most: usize) -> JournalResult<Page<Self::Cursor>>;
}

/// What a live notifier hands to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum LiveSignal {
    /// An event was appended to the journal
    Appended(Event),
    /// The notification channel broke; no more signals follow
    Failed(String),
}

/// Callback registered with a `LiveNotifier`
///
/// Runs on the notifier's own delivery context, so it must not block.
pub type LiveHandler = Arc<dyn Fn(LiveSignal) + Send + Sync>;

/// Handle identifying one live registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Push-based notification of appended events
///
/// Per entity, events are delivered in non-decreasing sequence order.
/// No ordering is promised across entities.
pub trait LiveNotifier: Send + Sync + 'static {
    fn subscribe(&self, handler: LiveHandler) -> SubscriptionId;

    /// Remove a registration; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}
