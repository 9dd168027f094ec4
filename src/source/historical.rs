//! Historical source adapter
//!
//! Turns the paginated `JournalStore` API into a finite stream. Pages are
//! fetched only when the consumer pulls past the previous one, so a slow
//! consumer slows the scan down instead of piling pages up in memory.

use std::sync::Arc;

use futures::Stream;

use crate::journal::{JournalStore, Scope};
use crate::types::{Event, QueryResult};

/// Stream every event in `scope`, `page_size` events per fetch
///
/// Fails immediately if the initial cursor cannot be resolved. The cursor is
/// dropped as soon as the scan is exhausted, fails, or the stream is dropped.
pub fn historical_events<S>(
    store: Arc<S>,
    scope: Scope,
    page_size: usize,
) -> impl Stream<Item = QueryResult<Event>> + Send
where
    S: JournalStore,
{
    let page_size = page_size.max(1);
    async_stream::try_stream! {
        let mut cursor = Some(store.resolve_initial_cursor(&scope).await?);
        let mut fetched = 0usize;

        while let Some(current) = cursor.take() {
            let page = store.fetch_page(current, page_size).await?;
            fetched += page.events.len();
            tracing::trace!(?scope, batch = page.events.len(), "fetched historical page");
            cursor = page.next;
            for event in page.events {
                yield event;
            }
        }

        tracing::debug!(?scope, fetched, "historical scan exhausted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{MemoryJournal, Page};
    use crate::types::{JournalError, JournalResult, QueryError};
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts fetches so tests can observe laziness
    struct CountingStore {
        inner: MemoryJournal,
        fetches: AtomicUsize,
        fail_cursor: bool,
    }

    #[async_trait]
    impl JournalStore for CountingStore {
        type Cursor = <MemoryJournal as JournalStore>::Cursor;

        async fn resolve_initial_cursor(&self, scope: &Scope) -> JournalResult<Self::Cursor> {
            if self.fail_cursor {
                return Err(JournalError::CursorUnavailable("no primary".to_string()));
            }
            self.inner.resolve_initial_cursor(scope).await
        }

        async fn fetch_page(&self, cursor: Self::Cursor, at_most: usize) -> JournalResult<Page<Self::Cursor>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_page(cursor, at_most).await
        }
    }

    fn store_with(events: usize, fail_cursor: bool) -> Arc<CountingStore> {
        let inner = MemoryJournal::new();
        for i in 0..events {
            inner.append("acct-1", json!(i));
        }
        Arc::new(CountingStore {
            inner,
            fetches: AtomicUsize::new(0),
            fail_cursor,
        })
    }

    #[tokio::test]
    async fn test_streams_all_pages_in_order() {
        let store = store_with(7, false);
        let seqs: Vec<u64> = historical_events(store.clone(), Scope::entity("acct-1", 1, u64::MAX), 3)
            .map(|r| r.unwrap().sequence_nr)
            .collect()
            .await;

        assert_eq!(seqs, (1..=7).collect::<Vec<_>>());
        assert_eq!(store.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pages_are_fetched_on_demand() {
        let store = store_with(10, false);
        let stream = historical_events(store.clone(), Scope::entity("acct-1", 1, u64::MAX), 2);
        futures::pin_mut!(stream);

        stream.next().await.unwrap().unwrap();
        stream.next().await.unwrap().unwrap();
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

        stream.next().await.unwrap().unwrap();
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cursor_failure_fails_stream() {
        let store = store_with(3, true);
        let out: Vec<_> = historical_events(store.clone(), Scope::all(0), 10).collect().await;

        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0],
            Err(QueryError::Journal(JournalError::CursorUnavailable(_)))
        ));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }
}
