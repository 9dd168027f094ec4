//! In-memory journal
//!
//! Holds every event in write order and publishes each append to its
//! `Broadcaster`. Mostly useful for tests and embedding.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Broadcaster, JournalStore, LiveHandler, LiveNotifier, Page, Scope, SubscriptionId};
use crate::types::{Event, JournalResult};
use crate::utils::next_monotonic_timestamp;

/// Scan position inside a `MemoryJournal`
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    scope: Scope,
    position: usize,
}

#[derive(Default)]
struct JournalState {
    /// Events in write order
    events: Vec<Event>,
    /// Highest sequence number written per entity
    highest: HashMap<String, u64>,
    last_timestamp: i64,
    /// Set once a caller-supplied event is older than the one before it
    out_of_order: bool,
}

impl JournalState {
    fn record(&mut self, event: Event) {
        let highest = self.highest.entry(event.persistence_id.clone()).or_insert(0);
        *highest = (*highest).max(event.sequence_nr);
        if !self.events.is_empty() && event.timestamp < self.last_timestamp {
            self.out_of_order = true;
        }
        self.last_timestamp = self.last_timestamp.max(event.timestamp);
        self.events.push(event);
    }

    /// First position an unscoped scan from `from_offset` has to look at
    fn scan_start(&self, from_offset: i64) -> usize {
        if self.out_of_order {
            // Pages filter on timestamp, so a scan from the front is exact
            return 0;
        }
        self.events.partition_point(|e| e.timestamp < from_offset)
    }
}

/// The in-memory journal
pub struct MemoryJournal {
    state: RwLock<JournalState>,
    broadcaster: Broadcaster,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(JournalState::default()),
            broadcaster: Broadcaster::new(),
        }
    }

    /// Append a payload for an entity, assigning the next sequence number
    pub fn append(&self, persistence_id: &str, payload: serde_json::Value) -> Event {
        let mut state = self.state.write();
        let sequence_nr = state.highest.get(persistence_id).copied().unwrap_or(0) + 1;
        let timestamp = next_monotonic_timestamp(state.last_timestamp);
        let event = Event::with_timestamp(persistence_id, sequence_nr, timestamp, payload);
        state.record(event.clone());
        // Publish under the lock so per-entity delivery order matches write order
        self.broadcaster.publish(&event);
        event
    }

    /// Append a fully formed event and publish it
    pub fn append_event(&self, event: Event) {
        let mut state = self.state.write();
        state.record(event.clone());
        self.broadcaster.publish(&event);
    }

    /// Store an event without notifying live subscribers
    ///
    /// Models events that reach storage through another path (imports,
    /// replication) or whose notification was lost.
    pub fn backfill(&self, event: Event) {
        self.state.write().record(event);
    }

    /// The live notifier attached to this journal
    pub fn notifier(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Highest sequence number written for an entity, 0 if none
    pub fn highest_sequence_nr(&self, persistence_id: &str) -> u64 {
        self.state.read().highest.get(persistence_id).copied().unwrap_or(0)
    }

    /// Total number of stored events
    pub fn len(&self) -> usize {
        self.state.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JournalStore for MemoryJournal {
    type Cursor = MemoryCursor;

    async fn resolve_initial_cursor(&self, scope: &Scope) -> JournalResult<MemoryCursor> {
        let position = match scope {
            Scope::Entity { .. } => 0,
            Scope::All { from_offset } => self.state.read().scan_start(*from_offset),
        };
        Ok(MemoryCursor {
            scope: scope.clone(),
            position,
        })
    }

    async fn fetch_page(&self, cursor: MemoryCursor, at_most: usize) -> JournalResult<Page<MemoryCursor>> {
        let state = self.state.read();
        let mut events = Vec::new();
        let mut position = cursor.position;

        while position < state.events.len() && events.len() < at_most {
            let event = &state.events[position];
            if cursor.scope.matches(event) {
                events.push(event.clone());
            }
            position += 1;
        }

        let next = (position < state.events.len()).then(|| MemoryCursor {
            scope: cursor.scope,
            position,
        });
        Ok(Page { events, next })
    }
}

impl LiveNotifier for MemoryJournal {
    fn subscribe(&self, handler: LiveHandler) -> SubscriptionId {
        self.broadcaster.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.broadcaster.unsubscribe(id)
    }
}
