//! Samples delivered by the independent telemetry producers

use crate::link::LinkUpdate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sample or a batch of samples, as a producer delivered them
///
/// Enrichment treats both shapes identically and preserves the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Samples<T> {
    Batch(Vec<T>),
    One(T),
}

impl<T> Samples<T> {
    pub fn len(&self) -> usize {
        match self {
            Samples::Batch(items) => items.len(),
            Samples::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Samples::Batch(items) => items.iter(),
            Samples::One(item) => std::slice::from_ref(item).iter(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Samples::Batch(items) => items,
            Samples::One(item) => vec![item],
        }
    }

    /// Transform every sample, keeping single/batch shape
    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> Samples<U> {
        match self {
            Samples::Batch(items) => Samples::Batch(items.into_iter().map(f).collect()),
            Samples::One(item) => Samples::One(f(item)),
        }
    }
}

/// A sample attributed to a tracked entity by its short identifier
pub trait TrackedSample {
    fn short_id(&self) -> Option<&str>;
}

/// GPS fix, optionally carrying the supply voltage measured with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    #[serde(rename = "vID")]
    pub v_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl TrackedSample for PositionFix {
    fn short_id(&self) -> Option<&str> {
        Some(&self.v_id)
    }
}

/// Standalone analog supply-voltage reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageSample {
    #[serde(rename = "vID")]
    pub v_id: String,
    pub voltage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl TrackedSample for VoltageSample {
    fn short_id(&self) -> Option<&str> {
        Some(&self.v_id)
    }
}

/// Summary of a finished trip or work period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    #[serde(rename = "vID")]
    pub v_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    /// Work periods cover shifts rather than single journeys
    #[serde(default)]
    pub work_period: bool,
}

impl TripSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

impl TrackedSample for TripSummary {
    fn short_id(&self) -> Option<&str> {
        Some(&self.v_id)
    }
}

/// A delivery from one of the telemetry producers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "producer", content = "samples", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Position(Samples<PositionFix>),
    Voltage(Samples<VoltageSample>),
    Link(Samples<LinkUpdate>),
    Trip(Samples<TripSummary>),
}

impl TelemetryEvent {
    pub fn producer(&self) -> &'static str {
        match self {
            TelemetryEvent::Position(_) => "position",
            TelemetryEvent::Voltage(_) => "voltage",
            TelemetryEvent::Link(_) => "link",
            TelemetryEvent::Trip(_) => "trip",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TelemetryEvent::Position(s) => s.len(),
            TelemetryEvent::Voltage(s) => s.len(),
            TelemetryEvent::Link(s) => s.len(),
            TelemetryEvent::Trip(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_shape_preserved() {
        let one = Samples::One(2).map(|x| x * 10);
        assert_eq!(one, Samples::One(20));

        let batch = Samples::Batch(vec![1, 2, 3]).map(|x| x + 1);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.into_vec(), vec![2, 3, 4]);
    }

    #[test]
    fn test_event_json_single_and_batch() {
        let single: TelemetryEvent = serde_json::from_str(
            r#"{"producer":"voltage","samples":{"vID":"A","voltage":12.4}}"#,
        )
        .unwrap();
        assert_eq!(single.producer(), "voltage");
        assert!(matches!(single, TelemetryEvent::Voltage(Samples::One(_))));

        let batch: TelemetryEvent = serde_json::from_str(
            r#"{"producer":"position","samples":[
                {"vID":"A","latitude":1.0,"longitude":2.0},
                {"vID":"B","latitude":3.0,"longitude":4.0,"voltage":13.9}
            ]}"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_trip_duration() {
        let trip: TripSummary = serde_json::from_str(
            r#"{"vID":"A","started_at":"2024-01-01T08:00:00Z","ended_at":"2024-01-01T09:30:00Z"}"#,
        )
        .unwrap();
        assert_eq!(trip.duration().num_minutes(), 90);
        assert!(!trip.work_period);
    }
}
