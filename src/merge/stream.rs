//! The replay-then-live merge loop
//!
//! One generator owns the `MergeEngine` and multiplexes the two sources into
//! it. Downstream demand is the poll itself: the generator hands out one
//! ready event per poll and only reads more input once `ready` is empty.

use std::sync::Arc;

use futures::{Stream, StreamExt};

use super::MergeEngine;
use crate::journal::{JournalStore, LiveNotifier, Scope};
use crate::query::QueryConfig;
use crate::source::{historical_events, LiveFeed};
use crate::types::{Event, EventStream, QueryResult};

enum Input {
    Replayed(Option<QueryResult<Event>>),
    Live(Option<QueryResult<Event>>),
}

/// Stream `scope` from history, then continue with live events
///
/// The live registration is made here, before the first historical read,
/// so an event appended while history is being read is either replayed or
/// held from the live feed. Dropping the stream releases the cursor and
/// unsubscribes.
pub fn merge_replay_with_live<S, N>(
    store: Arc<S>,
    notifier: Arc<N>,
    scope: Scope,
    config: &QueryConfig,
) -> impl Stream<Item = QueryResult<Event>> + Send
where
    S: JournalStore,
    N: LiveNotifier,
{
    let mut live = LiveFeed::subscribe(notifier, config.live_buffer_capacity);
    let page_size = config.page_size;
    let max_pending = config.max_pending;
    let idle_timeout = config.idle_timeout();
    let initial: EventStream = historical_events(store.clone(), scope.clone(), page_size).boxed();

    async_stream::try_stream! {
        let mut engine = MergeEngine::new(scope);
        let mut history = Some(initial);
        let mut live_open = true;

        loop {
            while let Some(event) = engine.pop_ready() {
                yield event;
            }

            if let Some(replay) = history.as_mut() {
                let input = tokio::select! {
                    biased;
                    item = replay.next() => Input::Replayed(item),
                    item = live.next(), if live_open && engine.pending_len() < max_pending => Input::Live(item),
                };
                match input {
                    Input::Replayed(Some(item)) => engine.on_replayed(item?),
                    Input::Replayed(None) => {
                        history = None;
                        engine.replay_finished();
                    }
                    Input::Live(Some(item)) => engine.on_live(item?),
                    Input::Live(None) => live_open = false,
                }
                continue;
            }

            if let Some(gap_scope) = engine.begin_gap_fill() {
                history = Some(historical_events(store.clone(), gap_scope, page_size).boxed());
                continue;
            }

            if !live_open {
                engine.terminate();
                break;
            }

            let item = match idle_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, live.next()).await {
                    Ok(item) => item,
                    Err(_) => {
                        tracing::debug!(?timeout, "live query idle, completing");
                        engine.terminate();
                        break;
                    }
                },
                None => live.next().await,
            };
            match item {
                Some(item) => engine.on_live(item?),
                None => {
                    engine.terminate();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;
    use crate::types::QueryError;
    use serde_json::json;
    use std::time::Duration;

    async fn next_seq<St: Stream<Item = QueryResult<Event>> + Unpin>(stream: &mut St) -> u64 {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("event should arrive")
            .unwrap()
            .unwrap()
            .sequence_nr
    }

    #[tokio::test]
    async fn test_replay_then_live() {
        let journal = Arc::new(MemoryJournal::new());
        for i in 0..3 {
            journal.append("a", json!(i));
        }

        let config = QueryConfig::default().with_page_size(2);
        let mut stream = Box::pin(merge_replay_with_live(
            journal.clone(),
            journal.clone(),
            Scope::entity("a", 0, u64::MAX),
            &config,
        ));

        for expected in 1..=3 {
            assert_eq!(next_seq(&mut stream).await, expected);
        }

        journal.append("b", json!(0));
        journal.append("a", json!(3));
        assert_eq!(next_seq(&mut stream).await, 4);
    }

    #[tokio::test]
    async fn test_gap_from_dropped_live_events_is_filled() {
        let journal = Arc::new(MemoryJournal::new());
        journal.append("a", json!(0));

        let config = QueryConfig::default().with_live_buffer_capacity(2);
        let mut stream = Box::pin(merge_replay_with_live(
            journal.clone(),
            journal.clone(),
            Scope::entity("a", 1, u64::MAX),
            &config,
        ));
        assert_eq!(next_seq(&mut stream).await, 1);

        // Five appends into a buffer of two: 2, 3 and 4 are shed
        for i in 1..=5 {
            journal.append("a", json!(i));
        }
        let seqs = vec![
            next_seq(&mut stream).await,
            next_seq(&mut stream).await,
            next_seq(&mut stream).await,
            next_seq(&mut stream).await,
            next_seq(&mut stream).await,
        ];
        assert_eq!(seqs, vec![2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_live_failure_fails_stream() {
        let journal = Arc::new(MemoryJournal::new());
        let mut stream = Box::pin(merge_replay_with_live(
            journal.clone(),
            journal.clone(),
            Scope::all(0),
            &QueryConfig::default(),
        ));

        journal.notifier().fail("connection lost");
        let item = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert!(matches!(item, Some(Err(QueryError::LiveFeed(_)))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_idle_timeout_completes_normally() {
        let journal = Arc::new(MemoryJournal::new());
        journal.append("a", json!(0));

        let config = QueryConfig::default().with_idle_timeout(Duration::from_millis(20));
        let out: Vec<_> = merge_replay_with_live(journal.clone(), journal.clone(), Scope::all(0), &config)
            .collect()
            .await;

        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
        assert_eq!(journal.notifier().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let journal = Arc::new(MemoryJournal::new());
        let stream = merge_replay_with_live(
            journal.clone(),
            journal.clone(),
            Scope::all(0),
            &QueryConfig::default(),
        );
        assert_eq!(journal.notifier().subscriber_count(), 1);

        drop(stream);
        assert_eq!(journal.notifier().subscriber_count(), 0);
    }
}
