//! Envelope construction at the exit of a query pipeline

use futures::{Stream, TryStreamExt};

use crate::types::{Event, EventEnvelope, Offset, QueryResult};

/// Wraps events into envelopes, numbering deliveries from 1
#[derive(Debug, Default)]
pub struct EnvelopeConstructor {
    delivered: u64,
}

impl EnvelopeConstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap(&mut self, event: Event) -> EventEnvelope {
        self.delivered += 1;
        EventEnvelope::new(event, Offset::Sequence(self.delivered))
    }
}

/// Map a stream of events to envelopes carrying their delivery offset
pub fn into_envelopes<S>(input: S) -> impl Stream<Item = QueryResult<EventEnvelope>>
where
    S: Stream<Item = QueryResult<Event>>,
{
    let mut constructor = EnvelopeConstructor::new();
    input.map_ok(move |event| constructor.wrap(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_offsets_count_deliveries() {
        let input = futures::stream::iter(vec![
            Ok(Event::with_timestamp("a", 4, 0, json!(null))),
            Ok(Event::with_timestamp("b", 1, 0, json!(null))),
        ]);

        let envelopes: Vec<EventEnvelope> = into_envelopes(input)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(envelopes[0].offset, Offset::Sequence(1));
        assert_eq!(envelopes[0].sequence_nr, 4);
        assert_eq!(envelopes[1].offset, Offset::Sequence(2));
        assert_eq!(envelopes[1].persistence_id, "b");
    }
}
