//! The query façade
//!
//! Each method builds an independent pipeline with its own cursor, live
//! registration, merge state and suppressor state, so queries can run
//! concurrently and be started any number of times.

use std::sync::Arc;

use futures::{Stream, StreamExt};

use super::QueryConfig;
use crate::journal::{JournalStore, LiveNotifier, Scope};
use crate::merge::merge_replay_with_live;
use crate::source::historical_events;
use crate::stages::EventStreamExt;
use crate::types::{EnvelopeStream, Event, PersistenceIdStream, QueryError, QueryResult};

/// Read side of the journal
///
/// Collaborators are injected by the caller, who also owns their lifecycle.
pub struct JournalQuery<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    config: QueryConfig,
}

impl<J> JournalQuery<J, J>
where
    J: JournalStore + LiveNotifier,
{
    /// Query a journal that is both the store and the live notifier
    pub fn from_journal(journal: Arc<J>) -> Self {
        Self::new(journal.clone(), journal)
    }
}

impl<S, N> JournalQuery<S, N>
where
    S: JournalStore,
    N: LiveNotifier,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self::with_config(store, notifier, QueryConfig::default())
    }

    pub fn with_config(store: Arc<S>, notifier: Arc<N>, config: QueryConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Events of one entity already in the journal, `from..=to`
    ///
    /// Completes once history is exhausted.
    pub fn current_events_for_entity(
        &self,
        persistence_id: &str,
        from_sequence_nr: u64,
        to_sequence_nr: u64,
    ) -> QueryResult<EnvelopeStream> {
        let scope = entity_scope(persistence_id, from_sequence_nr, to_sequence_nr)?;
        if from_sequence_nr > to_sequence_nr {
            return Ok(futures::stream::empty().boxed());
        }
        tracing::debug!(
            query = "current_events_for_entity",
            persistence_id,
            from = from_sequence_nr,
            to = to_sequence_nr,
            "starting query"
        );

        Ok(historical_events(self.store.clone(), scope.clone(), self.config.page_size)
            .retain_scope(scope)
            .into_envelopes())
    }

    /// Every event already in the journal written at or after `from_offset`
    pub fn current_all_events(&self, from_offset: i64) -> EnvelopeStream {
        tracing::debug!(query = "current_all_events", from_offset, "starting query");

        historical_events(self.store.clone(), Scope::all(from_offset), self.config.page_size)
            .into_envelopes()
    }

    /// Events of one entity, `from..=to`, continuing with live appends
    ///
    /// Completes after delivering `to_sequence_nr`; otherwise runs until the
    /// stream is dropped, fails, or the idle timeout elapses.
    pub fn events_for_entity(
        &self,
        persistence_id: &str,
        from_sequence_nr: u64,
        to_sequence_nr: u64,
    ) -> QueryResult<EnvelopeStream> {
        let scope = entity_scope(persistence_id, from_sequence_nr, to_sequence_nr)?;
        if from_sequence_nr > to_sequence_nr {
            return Ok(futures::stream::empty().boxed());
        }
        tracing::debug!(
            query = "events_for_entity",
            persistence_id,
            from = from_sequence_nr,
            to = to_sequence_nr,
            "starting query"
        );

        Ok(self
            .merged(scope.clone())
            .take_through_sequence(to_sequence_nr)
            .retain_scope(scope)
            .dedup_by_sequence()
            .into_envelopes())
    }

    /// Every event written at or after `from_offset`, continuing live
    pub fn all_events(&self, from_offset: i64) -> EnvelopeStream {
        tracing::debug!(query = "all_events", from_offset, "starting query");

        self.merged(Scope::all(from_offset))
            .dedup_by_sequence()
            .into_envelopes()
    }

    /// Each persistence id already in the journal, once
    pub fn current_distinct_entity_ids(&self) -> PersistenceIdStream {
        tracing::debug!(query = "current_distinct_entity_ids", "starting query");

        historical_events(self.store.clone(), Scope::all(i64::MIN), self.config.page_size)
            .distinct_persistence_ids()
    }

    /// Each persistence id in the journal, once, including ids of entities
    /// that are written to after the query starts
    pub fn all_distinct_entity_ids(&self) -> PersistenceIdStream {
        tracing::debug!(query = "all_distinct_entity_ids", "starting query");

        self.merged(Scope::all(i64::MIN)).distinct_persistence_ids()
    }

    fn merged(&self, scope: Scope) -> impl Stream<Item = QueryResult<Event>> + Send + 'static {
        merge_replay_with_live(self.store.clone(), self.notifier.clone(), scope, &self.config)
    }
}

/// Validate an entity query before any I/O happens
fn entity_scope(persistence_id: &str, from_sequence_nr: u64, to_sequence_nr: u64) -> QueryResult<Scope> {
    if persistence_id.trim().is_empty() {
        return Err(QueryError::InvalidPersistenceId);
    }
    Ok(Scope::entity(persistence_id, from_sequence_nr, to_sequence_nr))
}
