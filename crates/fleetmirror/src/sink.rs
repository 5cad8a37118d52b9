//! Downstream destinations for enriched records

use crate::enrich::{Enriched, EnrichedLink};
use crate::ignition::IgnitionTransition;
use crate::telemetry::{PositionFix, TripSummary};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Record emitted by the coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum SinkRecord {
    Position(Enriched<PositionFix>),
    Link(EnrichedLink),
    Trip(Enriched<TripSummary>),
    /// Ignition change with the tracker and reference of the sample behind it
    Ignition(Enriched<IgnitionTransition>),
}

impl SinkRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            SinkRecord::Position(_) => "position",
            SinkRecord::Link(_) => "link",
            SinkRecord::Trip(_) => "trip",
            SinkRecord::Ignition(_) => "ignition",
        }
    }
}

pub trait Sink: Send {
    fn deliver(&mut self, record: SinkRecord);
}

/// Logs every record as one JSON line at info level
#[derive(Debug, Default)]
pub struct TracingSink {
    delivered: u64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl Sink for TracingSink {
    fn deliver(&mut self, record: SinkRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => {
                self.delivered += 1;
                tracing::info!(target: "fleetmirror::sink", kind = record.kind(), "{}", json);
            }
            Err(e) => tracing::warn!(kind = record.kind(), "Failed to serialize record: {}", e),
        }
    }
}

/// Collects records in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SinkRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove and return everything collected so far
    pub fn drain(&self) -> Vec<SinkRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl Sink for MemorySink {
    fn deliver(&mut self, record: SinkRecord) {
        self.records.lock().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition() -> SinkRecord {
        SinkRecord::Ignition(Enriched {
            sample: IgnitionTransition {
                entity: "A".into(),
                ignition_on: true,
                previous: Some(false),
                voltage: 14.1,
            },
            tracker: None,
            reference: None,
        })
    }

    #[test]
    fn test_record_json_is_tagged() {
        let json = serde_json::to_value(transition()).unwrap();
        assert_eq!(json["record"], "ignition");
        assert_eq!(json["sample"]["entity"], "A");
        assert_eq!(json["sample"]["ignition_on"], true);
        assert!(json["tracker"].is_null());
    }

    #[test]
    fn test_memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.deliver(transition());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_tracing_sink_counts() {
        let mut sink = TracingSink::new();
        sink.deliver(transition());
        assert_eq!(sink.delivered(), 1);
    }
}
