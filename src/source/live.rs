//! Live feed adapter
//!
//! Registers with a `LiveNotifier` and relays appended events through a
//! bounded mailbox. The notifier's callback never blocks: when the consumer
//! falls behind, the oldest undelivered event is dropped to make room.
//! History is the source of truth for anything lost this way.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::AtomicWaker;
use futures::Stream;
use parking_lot::Mutex;

use crate::journal::{LiveHandler, LiveNotifier, LiveSignal, SubscriptionId};
use crate::types::{Event, QueryError, QueryResult};

/// Default number of live events held per subscriber
pub const DEFAULT_LIVE_BUFFER_CAPACITY: usize = 100;

#[derive(Default)]
struct Mailbox {
    events: VecDeque<Event>,
    failure: Option<String>,
}

/// Bounded, drop-oldest mailbox between a notifier and one subscriber
pub struct LiveBuffer {
    mailbox: Mutex<Mailbox>,
    capacity: usize,
    dropped: AtomicU64,
    waker: AtomicWaker,
}

impl LiveBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            mailbox: Mutex::new(Mailbox::default()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
            waker: AtomicWaker::new(),
        }
    }

    /// Accept a signal from the notifier's delivery context
    pub fn offer(&self, signal: LiveSignal) {
        {
            let mut mailbox = self.mailbox.lock();
            match signal {
                LiveSignal::Appended(event) => {
                    if mailbox.events.len() >= self.capacity {
                        mailbox.events.pop_front();
                        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::warn!(
                            dropped,
                            capacity = self.capacity,
                            "live buffer full, dropping oldest event"
                        );
                    }
                    mailbox.events.push_back(event);
                }
                LiveSignal::Failed(reason) => {
                    mailbox.failure.get_or_insert(reason);
                }
            }
        }
        self.waker.wake();
    }

    /// Buffered events, then the failure if one was signalled
    fn try_take(&self) -> Option<Result<Event, String>> {
        let mut mailbox = self.mailbox.lock();
        if let Some(event) = mailbox.events.pop_front() {
            return Some(Ok(event));
        }
        mailbox.failure.take().map(Err)
    }

    fn poll_take(&self, cx: &mut Context<'_>) -> Poll<Result<Event, String>> {
        if let Some(item) = self.try_take() {
            return Poll::Ready(item);
        }
        self.waker.register(cx.waker());
        // Re-check after registering so a concurrent offer is not missed
        match self.try_take() {
            Some(item) => Poll::Ready(item),
            None => Poll::Pending,
        }
    }

    /// Number of events dropped on overflow so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of events waiting for the consumer
    pub fn len(&self) -> usize {
        self.mailbox.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unsubscribes when dropped, on every exit path
struct Registration {
    notifier: Arc<dyn LiveNotifier>,
    id: SubscriptionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.notifier.unsubscribe(self.id);
        tracing::debug!(subscription = self.id.0, "live feed unsubscribed");
    }
}

/// Endless stream of live events for one subscriber
///
/// The registration happens in `subscribe`, not on first poll, so events
/// appended between construction and the first poll are kept.
pub struct LiveFeed {
    buffer: Arc<LiveBuffer>,
    _registration: Registration,
    failed: bool,
}

impl LiveFeed {
    /// Register with `notifier`, buffering up to `capacity` events
    pub fn subscribe<N>(notifier: Arc<N>, capacity: usize) -> Self
    where
        N: LiveNotifier,
    {
        let buffer = Arc::new(LiveBuffer::new(capacity));
        let sink = buffer.clone();
        let handler: LiveHandler = Arc::new(move |signal| sink.offer(signal));
        let id = notifier.subscribe(handler);
        tracing::debug!(subscription = id.0, capacity, "live feed subscribed");

        Self {
            buffer,
            _registration: Registration { notifier, id },
            failed: false,
        }
    }

    /// Number of events dropped on overflow so far
    pub fn dropped(&self) -> u64 {
        self.buffer.dropped()
    }
}

impl Stream for LiveFeed {
    type Item = QueryResult<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }
        match this.buffer.poll_take(cx) {
            Poll::Ready(Ok(event)) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Err(reason)) => {
                this.failed = true;
                Poll::Ready(Some(Err(QueryError::LiveFeed(reason))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{Broadcaster, MemoryJournal};
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_relays_appended_events() {
        let journal = Arc::new(MemoryJournal::new());
        let mut feed = LiveFeed::subscribe(journal.clone(), 10);

        journal.append("a", json!(1));
        journal.append("b", json!(1));

        let first = feed.next().await.unwrap().unwrap();
        let second = feed.next().await.unwrap().unwrap();
        assert_eq!((first.persistence_id.as_str(), first.sequence_nr), ("a", 1));
        assert_eq!((second.persistence_id.as_str(), second.sequence_nr), ("b", 1));
    }

    #[tokio::test]
    async fn test_overflow_keeps_most_recent_events() {
        let journal = Arc::new(MemoryJournal::new());
        let mut feed = LiveFeed::subscribe(journal.clone(), 3);

        for i in 0..5 {
            journal.append("a", json!(i));
        }
        assert_eq!(feed.dropped(), 2);

        let mut seqs = Vec::new();
        for _ in 0..3 {
            seqs.push(feed.next().await.unwrap().unwrap().sequence_nr);
        }
        assert_eq!(seqs, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_wakes_pending_consumer() {
        let journal = Arc::new(MemoryJournal::new());
        let mut feed = LiveFeed::subscribe(journal.clone(), 10);

        let writer = journal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            writer.append("late", json!(null));
        });

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), feed.next())
            .await
            .expect("live event should arrive")
            .unwrap()
            .unwrap();
        assert_eq!(event.persistence_id, "late");
    }

    #[tokio::test]
    async fn test_failure_ends_feed() {
        let broadcaster = Arc::new(Broadcaster::new());
        let mut feed = LiveFeed::subscribe(broadcaster.clone(), 10);

        broadcaster.publish(&Event::with_timestamp("a", 1, 1, json!(null)));
        broadcaster.fail("notifier shut down");

        assert!(feed.next().await.unwrap().is_ok());
        assert!(matches!(feed.next().await, Some(Err(QueryError::LiveFeed(_)))));
        assert!(feed.next().await.is_none());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let broadcaster = Arc::new(Broadcaster::new());
        let feed = LiveFeed::subscribe(broadcaster.clone(), 10);
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(feed);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
