//! In-memory append-only event journal.
//!
//! Every committed domain event lands here, one stream per aggregate, so
//! the movement, payment and credit histories stay independently
//! auditable: a balance can always be cross-checked against the fold of
//! its stream.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use shopledger_core::AggregateId;

use crate::event::Event;

/// One retained event, with stream metadata and an assigned sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub entry_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl JournalEntry {
    /// Deserialize the payload back into a typed domain event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, JournalError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| JournalError::Codec(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("event payload codec failure: {0}")]
    Codec(String),

    #[error("journal lock poisoned")]
    Poisoned,
}

/// Append-only journal keyed per aggregate.
///
/// Intended for a single process; not optimized for large histories.
#[derive(Debug, Default)]
pub struct Journal {
    streams: RwLock<HashMap<AggregateId, Vec<JournalEntry>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of typed events to an aggregate stream.
    ///
    /// Sequence numbers continue from the current stream head; the whole
    /// batch is serialized before anything is appended, so a codec failure
    /// leaves the stream untouched.
    pub fn append<E>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        events: &[E],
    ) -> Result<Vec<JournalEntry>, JournalError>
    where
        E: Event + Serialize,
    {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let mut encoded = Vec::with_capacity(events.len());
        for ev in events {
            let payload =
                serde_json::to_value(ev).map_err(|e| JournalError::Codec(e.to_string()))?;
            encoded.push((ev.event_type(), ev.version(), ev.occurred_at(), payload));
        }

        let mut streams = self.streams.write().map_err(|_| JournalError::Poisoned)?;
        let stream = streams.entry(aggregate_id).or_default();
        let mut next = stream.last().map(|e| e.sequence_number).unwrap_or(0) + 1;

        let mut committed = Vec::with_capacity(encoded.len());
        for (event_type, event_version, occurred_at, payload) in encoded {
            let entry = JournalEntry {
                entry_id: Uuid::now_v7(),
                aggregate_id,
                aggregate_type: aggregate_type.to_string(),
                sequence_number: next,
                event_type: event_type.to_string(),
                event_version,
                occurred_at,
                payload,
            };
            next += 1;
            stream.push(entry.clone());
            committed.push(entry);
        }

        Ok(committed)
    }

    /// Load the full stream for an aggregate, in sequence order.
    pub fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<JournalEntry>, JournalError> {
        let streams = self.streams.read().map_err(|_| JournalError::Poisoned)?;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    /// Load every entry of a given event type across all streams.
    ///
    /// Display/reporting access; ordering across streams follows business time.
    pub fn load_by_type(&self, event_type: &str) -> Result<Vec<JournalEntry>, JournalError> {
        let streams = self.streams.read().map_err(|_| JournalError::Poisoned)?;
        let mut out: Vec<JournalEntry> = streams
            .values()
            .flatten()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.occurred_at);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Ping {
        n: u64,
        at: DateTime<Utc>,
    }

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "test.ping"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn sequence_numbers_are_monotonic_per_stream() {
        let journal = Journal::new();
        let id = AggregateId::new();
        let at = Utc::now();

        journal
            .append(id, "test", &[Ping { n: 1, at }, Ping { n: 2, at }])
            .unwrap();
        journal.append(id, "test", &[Ping { n: 3, at }]).unwrap();

        let stream = journal.load_stream(id).unwrap();
        let seqs: Vec<u64> = stream.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn entries_decode_back_to_typed_events() {
        let journal = Journal::new();
        let id = AggregateId::new();
        let ev = Ping { n: 7, at: Utc::now() };

        journal.append(id, "test", std::slice::from_ref(&ev)).unwrap();
        let stream = journal.load_stream(id).unwrap();
        let decoded: Ping = stream[0].decode().unwrap();
        assert_eq!(decoded, ev);
    }

    #[test]
    fn empty_append_is_a_noop() {
        let journal = Journal::new();
        let id = AggregateId::new();
        let committed = journal.append::<Ping>(id, "test", &[]).unwrap();
        assert!(committed.is_empty());
        assert!(journal.load_stream(id).unwrap().is_empty());
    }
}
