//! Replay-to-live merge engine
//!
//! Presents one ordered, contiguous stream per entity that is sourced first
//! from history and then from the live feed, with no gap or duplicate at the
//! handoff:
//! - `MergeEngine`: the state machine (`ReplayingPast` / `Live` / `Terminated`)
//! - `merge_replay_with_live`: the loop driving it from both sources

mod state;
mod stream;

pub use state::{GapFill, MergeEngine, MergeState, Progress};
pub use stream::merge_replay_with_live;
