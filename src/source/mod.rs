//! Source adapters
//!
//! - `historical_events`: finite, paginated replay from a `JournalStore`
//! - `LiveFeed`: endless relay from a `LiveNotifier` with a drop-oldest buffer

mod historical;
mod live;

pub use historical::historical_events;
pub use live::{LiveBuffer, LiveFeed, DEFAULT_LIVE_BUFFER_CAPACITY};
