//! Query configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::source::DEFAULT_LIVE_BUFFER_CAPACITY;

/// Tuning knobs shared by every query a `JournalQuery` starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryConfig {
    /// Maximum events requested per historical page
    pub page_size: usize,
    /// Live events buffered per subscriber before the oldest is dropped
    pub live_buffer_capacity: usize,
    /// Early live arrivals the merge engine holds while replaying history
    pub max_pending: usize,
    /// End a live query when nothing arrives for this long
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_ms: Option<u64>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            live_buffer_capacity: DEFAULT_LIVE_BUFFER_CAPACITY,
            max_pending: 1000,
            idle_timeout_ms: None,
        }
    }
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_live_buffer_capacity(mut self, capacity: usize) -> Self {
        self.live_buffer_capacity = capacity.max(1);
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.live_buffer_capacity, 100);
        assert_eq!(config.max_pending, 1000);
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = QueryConfig::from_json_str(r#"{"pageSize": 25, "idleTimeoutMs": 1500}"#).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.live_buffer_capacity, 100);
        assert_eq!(config.idle_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_builders_clamp_to_one() {
        let config = QueryConfig::new()
            .with_page_size(0)
            .with_live_buffer_capacity(0)
            .with_max_pending(0)
            .with_idle_timeout(Duration::from_secs(2));
        assert_eq!(config.page_size, 1);
        assert_eq!(config.live_buffer_capacity, 1);
        assert_eq!(config.max_pending, 1);
        assert_eq!(config.idle_timeout_ms, Some(2000));
    }
}
