//! Data types for journal queries
//!
//! This module contains the event model and the error types used throughout
//! the crate.

mod error;
mod event;

pub use error::{JournalError, JournalResult, QueryError, QueryResult};
pub use event::{Event, EventEnvelope, Offset};

/// A boxed, lazily realized stream of query results
pub type BoxedStream<T> = futures::stream::BoxStream<'static, QueryResult<T>>;

/// Stream of raw events flowing between pipeline stages
pub type EventStream = BoxedStream<Event>;

/// Stream of envelopes handed to query consumers
pub type EnvelopeStream = BoxedStream<EventEnvelope>;

/// Stream of distinct persistence ids
pub type PersistenceIdStream = BoxedStream<String>;
