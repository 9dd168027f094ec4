//! Truncation at a target sequence number

use futures::{Stream, StreamExt};

use crate::types::{Event, QueryResult};

/// What to do with an event relative to the target sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    Forward,
    /// Forward this event, then complete
    ForwardAndComplete,
    /// Complete without forwarding this event
    Complete,
}

/// Completes a stream once the target sequence number has been delivered
#[derive(Debug, Clone, Copy)]
pub struct SequenceTruncator {
    to: u64,
}

impl SequenceTruncator {
    pub fn new(to: u64) -> Self {
        Self { to }
    }

    pub fn decide(&self, event: &Event) -> Truncation {
        match event.sequence_nr {
            sn if sn < self.to => Truncation::Forward,
            sn if sn == self.to => Truncation::ForwardAndComplete,
            _ => Truncation::Complete,
        }
    }
}

/// Forward events up to and including sequence number `to`
///
/// After the target has been forwarded the stream ends without pulling from
/// upstream again. If `to` never shows up, completion is left to upstream.
pub fn take_through_sequence<S>(input: S, to: u64) -> impl Stream<Item = QueryResult<Event>>
where
    S: Stream<Item = QueryResult<Event>>,
{
    let truncator = SequenceTruncator::new(to);
    async_stream::try_stream! {
        futures::pin_mut!(input);
        while let Some(event) = input.next().await {
            let event = event?;
            match truncator.decide(&event) {
                Truncation::Forward => {
                    yield event;
                }
                Truncation::ForwardAndComplete => {
                    yield event;
                    break;
                }
                Truncation::Complete => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ev(sn: u64) -> QueryResult<Event> {
        Ok(Event::with_timestamp("a", sn, 0, json!(null)))
    }

    async fn sequence_numbers<S: Stream<Item = QueryResult<Event>>>(s: S) -> Vec<u64> {
        s.map(|r| r.unwrap().sequence_nr).collect().await
    }

    #[tokio::test]
    async fn test_stops_after_target() {
        let input = futures::stream::iter(vec![ev(1), ev(2), ev(3), ev(4)]);
        assert_eq!(sequence_numbers(take_through_sequence(input, 2)).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_overshoot_is_not_forwarded() {
        let input = futures::stream::iter(vec![ev(1), ev(3), ev(4)]);
        assert_eq!(sequence_numbers(take_through_sequence(input, 2)).await, vec![1]);
    }

    #[tokio::test]
    async fn test_unreached_target_completes_with_upstream() {
        let input = futures::stream::iter(vec![ev(1), ev(2)]);
        assert_eq!(sequence_numbers(take_through_sequence(input, 10)).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_completes_without_polling_pending_upstream() {
        // Upstream never ends after the target: truncation must still complete
        let input = futures::stream::iter(vec![ev(1), ev(2)]).chain(futures::stream::pending());
        let out = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            sequence_numbers(take_through_sequence(input, 2)),
        )
        .await
        .expect("truncated stream should complete");
        assert_eq!(out, vec![1, 2]);
    }
}
