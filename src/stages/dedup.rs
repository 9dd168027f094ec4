//! Duplicate suppression
//!
//! A suppressor decides, element by element, whether to forward or drop.
//! State only grows for the lifetime of the stage; there is no eviction
//! because a stage lives exactly as long as its query.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use futures::{future, Stream, TryStreamExt};

use crate::types::{Event, QueryResult};

/// Decides whether an element has been seen before
pub trait Suppressor<T> {
    /// `true` to forward the element, `false` to drop it
    fn admit(&mut self, item: &T) -> bool;
}

/// Per-entity "last sequence number forwarded" suppression
///
/// Forwards an event only if its sequence number is strictly greater than
/// the last one forwarded for the same entity, so both exact repeats and
/// regressions are dropped.
#[derive(Debug, Default)]
pub struct LastSequenceFilter {
    last_forwarded: HashMap<String, u64>,
}

impl LastSequenceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last sequence number forwarded for an entity
    pub fn last_forwarded(&self, persistence_id: &str) -> Option<u64> {
        self.last_forwarded.get(persistence_id).copied()
    }
}

impl Suppressor<Event> for LastSequenceFilter {
    fn admit(&mut self, event: &Event) -> bool {
        match self.last_forwarded.get_mut(&event.persistence_id) {
            Some(last) if event.sequence_nr <= *last => false,
            Some(last) => {
                *last = event.sequence_nr;
                true
            }
            None => {
                self.last_forwarded
                    .insert(event.persistence_id.clone(), event.sequence_nr);
                true
            }
        }
    }
}

/// Identity suppression: each distinct element once, in first-seen order
#[derive(Debug)]
pub struct Distinct<K> {
    seen: HashSet<K>,
}

impl<K: Eq + Hash + Clone> Distinct<K> {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Number of distinct elements forwarded so far
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for Distinct<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> Suppressor<K> for Distinct<K> {
    fn admit(&mut self, item: &K) -> bool {
        if self.seen.contains(item) {
            return false;
        }
        self.seen.insert(item.clone());
        true
    }
}

/// Apply a suppressor to a stream; errors pass through untouched
pub fn suppress_duplicates<S, T, D>(input: S, mut suppressor: D) -> impl Stream<Item = QueryResult<T>>
where
    S: Stream<Item = QueryResult<T>>,
    D: Suppressor<T>,
{
    input.try_filter(move |item| future::ready(suppressor.admit(item)))
}
