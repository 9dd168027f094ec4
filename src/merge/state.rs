//! Replay-to-live merge state machine
//!
//! Pure bookkeeping, no I/O: the driving loop in `stream.rs` feeds it
//! replayed and live events and drains whatever became deliverable.
//!
//! ```text
//!                  replay_finished()
//!   ReplayingPast ──────────────────► Live
//!        ▲                             │
//!        └──── begin_gap_fill() ───────┘
//!
//!   any state ── terminate() ──► Terminated
//! ```
//!
//! While replaying, history is authoritative and delivered as it arrives
//! (permissive). Live arrivals are only held. Once live, an event is
//! delivered only when it is exactly the next expected sequence number for
//! its entity (strict-contiguous); anything ahead of that waits in the
//! pending buffer until the gap closes.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::journal::Scope;
use crate::types::Event;

/// Entity-scoped replay needed to close a gap seen on the live feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapFill {
    pub persistence_id: String,
    pub from_sequence_nr: u64,
}

/// Positions and buffers carried across state transitions
#[derive(Debug)]
pub struct Progress {
    scope: Scope,
    /// Next sequence number to deliver, per entity. Absent means unknown.
    next_expected: HashMap<String, u64>,
    /// Live arrivals not yet deliverable, per entity, ordered by sequence
    pending: HashMap<String, BTreeMap<u64, Event>>,
    pending_len: usize,
    /// Deliverable events, in delivery order
    ready: VecDeque<Event>,
}

impl Progress {
    fn new(scope: Scope) -> Self {
        let mut next_expected = HashMap::new();
        if let Scope::Entity {
            persistence_id,
            from_sequence_nr,
            ..
        } = &scope
        {
            next_expected.insert(persistence_id.clone(), *from_sequence_nr);
        }
        Self {
            scope,
            next_expected,
            pending: HashMap::new(),
            pending_len: 0,
            ready: VecDeque::new(),
        }
    }

    /// Next sequence number to deliver for an entity
    ///
    /// An entity the query has not delivered yet starts at 1 in unscoped
    /// mode, so a first live event past 1 opens a gap to fill from history.
    fn expected(&self, persistence_id: &str) -> Option<u64> {
        match self.next_expected.get(persistence_id) {
            Some(&next) => Some(next),
            None => matches!(self.scope, Scope::All { .. }).then_some(1),
        }
    }

    fn is_stale(&self, event: &Event) -> bool {
        matches!(self.next_expected.get(&event.persistence_id), Some(&next) if event.sequence_nr < next)
    }

    fn deliver(&mut self, event: Event) {
        self.next_expected
            .insert(event.persistence_id.clone(), event.sequence_nr.saturating_add(1));
        self.ready.push_back(event);
    }

    /// Permissive: history is gap-free, so whatever is not stale goes out
    fn accept_replayed(&mut self, event: Event) {
        if !self.scope.matches(&event) || self.is_stale(&event) {
            return;
        }
        let persistence_id = event.persistence_id.clone();
        let sequence_nr = event.sequence_nr;
        self.deliver(event);
        self.discard_pending_through(&persistence_id, sequence_nr);
    }

    fn hold(&mut self, event: Event) {
        if !self.scope.matches(&event) || self.is_stale(&event) {
            return;
        }
        let held = self.pending.entry(event.persistence_id.clone()).or_default();
        if held.insert(event.sequence_nr, event).is_none() {
            self.pending_len += 1;
        }
    }

    /// Strict-contiguous delivery of one live event
    fn accept_live(&mut self, event: Event) {
        if !self.scope.matches(&event) {
            return;
        }
        let persistence_id = event.persistence_id.clone();
        match self.expected(&persistence_id) {
            Some(next) if event.sequence_nr < next => return,
            Some(next) if event.sequence_nr > next => {
                self.hold(event);
                return;
            }
            _ => self.deliver(event),
        }
        self.release_contiguous(&persistence_id);
    }

    fn discard_pending_through(&mut self, persistence_id: &str, sequence_nr: u64) {
        if let Some(held) = self.pending.get_mut(persistence_id) {
            let keep = held.split_off(&sequence_nr.saturating_add(1));
            self.pending_len -= held.len();
            *held = keep;
            if held.is_empty() {
                self.pending.remove(persistence_id);
            }
        }
    }

    /// Move held events for one entity to `ready` while they are contiguous
    fn release_contiguous(&mut self, persistence_id: &str) {
        loop {
            let first = self
                .pending
                .get(persistence_id)
                .and_then(|held| held.keys().next().copied());
            let Some(first) = first else {
                self.pending.remove(persistence_id);
                return;
            };
            let next = self.expected(persistence_id);
            if matches!(next, Some(next) if first > next) {
                return;
            }

            let Some(event) = self
                .pending
                .get_mut(persistence_id)
                .and_then(|held| held.remove(&first))
            else {
                return;
            };
            self.pending_len -= 1;
            if !matches!(next, Some(next) if first < next) {
                self.deliver(event);
            }
        }
    }

    fn release_all(&mut self) {
        let ids: Vec<String> = self.pending.keys().cloned().collect();
        for persistence_id in ids {
            self.release_contiguous(&persistence_id);
        }
    }

    /// Give up on a gap history could not fill and resume after it
    fn skip_gap(&mut self, persistence_id: &str) {
        let first_held = self
            .pending
            .get(persistence_id)
            .and_then(|held| held.keys().next().copied());
        if let Some(first) = first_held {
            let next = self.expected(persistence_id).unwrap_or(first);
            if first > next {
                tracing::warn!(
                    persistence_id,
                    missing_from = next,
                    missing_to = first - 1,
                    "sequence gap not found in history, skipping"
                );
                self.next_expected.insert(persistence_id.to_string(), first);
            }
        }
        self.release_contiguous(persistence_id);
    }

    fn first_gap(&self) -> Option<GapFill> {
        self.pending.iter().find_map(|(persistence_id, held)| {
            let first = *held.keys().next()?;
            let next = self.expected(persistence_id)?;
            (first > next).then(|| GapFill {
                persistence_id: persistence_id.clone(),
                from_sequence_nr: next,
            })
        })
    }
}

/// The merge state of one query
#[derive(Debug)]
pub enum MergeState {
    /// Draining history; `gap_fill` names the entity when this replay was
    /// started to close a live gap rather than as the initial replay
    ReplayingPast {
        progress: Progress,
        gap_fill: Option<String>,
    },
    Live(Progress),
    Terminated,
}

/// Owner of one query's merge state
#[derive(Debug)]
pub struct MergeEngine {
    state: MergeState,
}

impl MergeEngine {
    /// Start in `ReplayingPast` for the given scope
    pub fn new(scope: Scope) -> Self {
        Self {
            state: MergeState::ReplayingPast {
                progress: Progress::new(scope),
                gap_fill: None,
            },
        }
    }

    pub fn state(&self) -> &MergeState {
        &self.state
    }

    pub fn is_replaying(&self) -> bool {
        matches!(self.state, MergeState::ReplayingPast { .. })
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, MergeState::Live(_))
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, MergeState::Terminated)
    }

    fn progress_mut(&mut self) -> Option<&mut Progress> {
        match &mut self.state {
            MergeState::ReplayingPast { progress, .. } | MergeState::Live(progress) => Some(progress),
            MergeState::Terminated => None,
        }
    }

    fn progress(&self) -> Option<&Progress> {
        match &self.state {
            MergeState::ReplayingPast { progress, .. } | MergeState::Live(progress) => Some(progress),
            MergeState::Terminated => None,
        }
    }

    /// An event read from history
    pub fn on_replayed(&mut self, event: Event) {
        if let MergeState::ReplayingPast { progress, .. } = &mut self.state {
            progress.accept_replayed(event);
        }
    }

    /// An event read from the live feed
    pub fn on_live(&mut self, event: Event) {
        match &mut self.state {
            MergeState::ReplayingPast { progress, .. } => progress.hold(event),
            MergeState::Live(progress) => progress.accept_live(event),
            MergeState::Terminated => {}
        }
    }

    /// History completed: hand off to live delivery
    pub fn replay_finished(&mut self) {
        let state = std::mem::replace(&mut self.state, MergeState::Terminated);
        self.state = match state {
            MergeState::ReplayingPast {
                mut progress,
                gap_fill,
            } => {
                if let Some(persistence_id) = gap_fill {
                    progress.skip_gap(&persistence_id);
                }
                progress.release_all();
                tracing::debug!(
                    scope = ?progress.scope,
                    pending = progress.pending_len,
                    "replay finished, switching to live"
                );
                MergeState::Live(progress)
            }
            other => other,
        };
    }

    /// If live delivery is stuck on a gap, switch back to replaying and
    /// return the history scope that should fill it
    pub fn begin_gap_fill(&mut self) -> Option<Scope> {
        let gap = match &self.state {
            MergeState::Live(progress) => progress.first_gap()?,
            _ => return None,
        };
        let MergeState::Live(progress) = std::mem::replace(&mut self.state, MergeState::Terminated) else {
            return None;
        };

        let to_sequence_nr = match &progress.scope {
            Scope::Entity { to_sequence_nr, .. } => *to_sequence_nr,
            Scope::All { .. } => u64::MAX,
        };
        tracing::debug!(
            persistence_id = %gap.persistence_id,
            from = gap.from_sequence_nr,
            "live gap detected, replaying from history"
        );
        let scope = Scope::entity(gap.persistence_id.clone(), gap.from_sequence_nr, to_sequence_nr);
        self.state = MergeState::ReplayingPast {
            progress,
            gap_fill: Some(gap.persistence_id),
        };
        Some(scope)
    }

    /// Next event ready for the consumer
    pub fn pop_ready(&mut self) -> Option<Event> {
        self.progress_mut()?.ready.pop_front()
    }

    /// Live events held back, waiting for history or a gap to close
    pub fn pending_len(&self) -> usize {
        self.progress().map_or(0, |p| p.pending_len)
    }

    /// Next sequence number expected for an entity
    pub fn next_expected(&self, persistence_id: &str) -> Option<u64> {
        self.progress()?.next_expected.get(persistence_id).copied()
    }

    /// Drop all buffers; further input is ignored
    pub fn terminate(&mut self) {
        self.state = MergeState::Terminated;
    }
}
