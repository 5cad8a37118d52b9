//! Wireless-link proximity updates
//!
//! A link update reports, for one tracker, the antenna currently nearest to
//! it and the antenna heard most recently. Either may be missing.

use crate::telemetry::TrackedSample;
use chrono::{DateTime, Utc};
use fleetmirror_core::types::DocId;
use serde::{Deserialize, Serialize};

/// One antenna as seen from a tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCandidate {
    #[serde(rename = "vID")]
    pub v_id: String,
    #[serde(rename = "rSSI", default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkUpdate {
    /// Tracker the update is about
    #[serde(rename = "vID")]
    pub v_id: String,
    #[serde(default)]
    pub nearest: Option<LinkCandidate>,
    #[serde(default)]
    pub newest: Option<LinkCandidate>,
}

impl TrackedSample for LinkUpdate {
    fn short_id(&self) -> Option<&str> {
        Some(&self.v_id)
    }
}

/// The link chosen for an update, flattened for the downstream sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveLink {
    /// True only when the update carried a nearest antenna
    pub is_active: bool,
    pub antenna_vid: String,
    pub antenna_rssi: Option<i32>,
    pub antenna_seen_at: Option<DateTime<Utc>>,
    /// Canonical id of the antenna, when the cross-reference knows it
    pub antenna_object_id: Option<DocId>,
}

/// Prefer the nearest antenna, fall back to the newest
///
/// `is_active` reflects only whether a nearest antenna was present. An
/// update with neither yields `None`: no active link.
pub fn select_active_link(update: &LinkUpdate) -> Option<ActiveLink> {
    let (candidate, is_active) = match (&update.nearest, &update.newest) {
        (Some(nearest), _) => (nearest, true),
        (None, Some(newest)) => (newest, false),
        (None, None) => return None,
    };
    Some(ActiveLink {
        is_active,
        antenna_vid: candidate.v_id.clone(),
        antenna_rssi: candidate.rssi,
        antenna_seen_at: candidate.seen_at,
        antenna_object_id: None,
    })
}
