//! Generic pipeline stages
//!
//! Stages are plain stream adapters. Errors always pass through unchanged,
//! so a failure upstream reaches the consumer as an `Err` item.
//!
//! ```text
//! source ──► retain_scope ──► take_through_sequence ──► dedup_by_sequence ──► into_envelopes
//! ```

mod dedup;
mod envelope;
mod truncate;

use futures::{future, Stream, StreamExt, TryStreamExt};

use crate::journal::Scope;
use crate::types::{BoxedStream, EnvelopeStream, Event, EventStream, QueryResult};

pub use dedup::{suppress_duplicates, Distinct, LastSequenceFilter, Suppressor};
pub use envelope::{into_envelopes, EnvelopeConstructor};
pub use truncate::{take_through_sequence, SequenceTruncator, Truncation};

/// Drop events outside a scope
pub fn retain_scope<S>(input: S, scope: Scope) -> impl Stream<Item = QueryResult<Event>>
where
    S: Stream<Item = QueryResult<Event>>,
{
    input.try_filter(move |event| future::ready(scope.matches(event)))
}

/// Chainable stage combinators for event streams
pub trait EventStreamExt: Stream<Item = QueryResult<Event>> + Sized + Send + 'static {
    fn retain_scope(self, scope: Scope) -> EventStream {
        retain_scope(self, scope).boxed()
    }

    fn take_through_sequence(self, to: u64) -> EventStream {
        take_through_sequence(self, to).boxed()
    }

    fn dedup_by_sequence(self) -> EventStream {
        suppress_duplicates(self, LastSequenceFilter::new()).boxed()
    }

    fn distinct_persistence_ids(self) -> BoxedStream<String> {
        let ids = self.map_ok(|event| event.persistence_id);
        suppress_duplicates(ids, Distinct::new()).boxed()
    }

    fn into_envelopes(self) -> EnvelopeStream {
        into_envelopes(self).boxed()
    }
}

impl<S> EventStreamExt for S where S: Stream<Item = QueryResult<Event>> + Sized + Send + 'static {}
