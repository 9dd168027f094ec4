//! Event types for the journal
//!
//! `Event` is the immutable record written by the journal's writer. Queries
//! operate on `Event` internally and only wrap them into `EventEnvelope`
//! at the very end of a pipeline.

use serde::{Deserialize, Serialize};

/// An immutable event in the journal
///
/// For a fixed `persistence_id`, sequence numbers are unique and gap-free as
/// written. Any single consumer observes them in non-decreasing order with no
/// repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Entity key this event belongs to
    #[serde(rename = "persistenceId")]
    pub persistence_id: String,

    /// Per-entity position, assigned at append time
    #[serde(rename = "sequenceNr")]
    pub sequence_nr: u64,

    /// Write time in milliseconds, used as a global ordering hint
    #[serde(rename = "ts")]
    pub timestamp: i64,

    /// Caller-owned payload
    pub payload: serde_json::Value,
}

impl Event {
    /// Create a new event stamped with the current time
    pub fn new(
        persistence_id: impl Into<String>,
        sequence_nr: u64,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_timestamp(
            persistence_id,
            sequence_nr,
            crate::utils::current_timestamp_millis(),
            payload,
        )
    }

    /// Create a new event with a specific timestamp
    pub fn with_timestamp(
        persistence_id: impl Into<String>,
        sequence_nr: u64,
        timestamp: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            persistence_id: persistence_id.into(),
            sequence_nr,
            timestamp,
            payload,
        }
    }

    /// Parse from a single JSON line
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Serialize to a single JSON line (without the trailing newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Delivery position of an envelope within one query
///
/// Offsets are assigned when an envelope leaves the pipeline. They are not
/// durable commit points and are not stable across restarts of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Offset {
    /// No position has been assigned
    NoOffset,
    /// 1-based delivery counter
    Sequence(u64),
}

impl Offset {
    /// The numeric value, 0 for `NoOffset`
    pub fn value(&self) -> u64 {
        match self {
            Offset::NoOffset => 0,
            Offset::Sequence(n) => *n,
        }
    }
}

impl Default for Offset {
    fn default() -> Self {
        Offset::NoOffset
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Offset::NoOffset => write!(f, "no-offset"),
            Offset::Sequence(n) => write!(f, "{}", n),
        }
    }
}

/// The externally visible wrapper delivered to query consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "persistenceId")]
    pub persistence_id: String,

    #[serde(rename = "sequenceNr")]
    pub sequence_nr: u64,

    pub offset: Offset,

    #[serde(rename = "ts")]
    pub timestamp: i64,

    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wrap an event, assigning it the given offset
    pub fn new(event: Event, offset: Offset) -> Self {
        Self {
            persistence_id: event.persistence_id,
            sequence_nr: event.sequence_nr,
            offset,
            timestamp: event.timestamp,
            payload: event.payload,
        }
    }
}
