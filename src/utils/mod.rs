//! Utility functions and helpers

pub mod time;

pub use time::{current_timestamp_millis, next_monotonic_timestamp};
