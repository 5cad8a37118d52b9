//! Ignition state derived from supply voltage
//!
//! Voltages inside any configured "off" band (resting battery, alternator
//! idle ranges) mean the ignition is off; anything else means it is on. The
//! gaps between bands form the dead zone that keeps a voltage hovering near a
//! threshold from flickering the state. Only changes are reported.

use fleetmirror_core::{
    config::{IgnitionConfig, VoltageBand},
    error::Result,
    observe,
};
use serde::Serialize;
use std::collections::HashMap;

/// A change of ignition state for one tracked entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IgnitionTransition {
    pub entity: String,
    pub ignition_on: bool,
    /// State before this sample, `None` on the first observation
    pub previous: Option<bool>,
    pub voltage: f64,
}

/// Per-entity boolean ignition state machine
#[derive(Debug, Clone)]
pub struct IgnitionEngine {
    bands: Vec<VoltageBand>,
    states: HashMap<String, bool>,
}

impl IgnitionEngine {
    pub fn new(config: &IgnitionConfig) -> Result<Self> {
        Ok(Self {
            bands: config.validated_bands()?,
            states: HashMap::new(),
        })
    }

    pub fn bands(&self) -> &[VoltageBand] {
        &self.bands
    }

    /// True when `voltage` falls inside an "off" band
    ///
    /// Membership is tested on the magnitude, so a reversed-polarity reading
    /// classifies like its positive counterpart.
    pub fn classify(&self, voltage: f64) -> bool {
        let magnitude = voltage.abs();
        self.bands.iter().any(|band| band.contains(magnitude))
    }

    /// Feed one sample; returns a transition when the state changed or the
    /// entity is seen for the first time
    ///
    /// Non-finite readings are ignored and leave the state untouched.
    pub fn update(&mut self, entity: &str, voltage: f64) -> Option<IgnitionTransition> {
        if !voltage.is_finite() {
            tracing::warn!(entity, voltage, "Ignoring non-finite voltage sample");
            return None;
        }

        let ignition_on = !self.classify(voltage);
        let previous = self.states.insert(entity.to_string(), ignition_on);
        if previous == Some(ignition_on) {
            return None;
        }

        tracing::debug!(entity, voltage, ignition_on, ?previous, "Ignition transition");
        observe::record_ignition_transition(ignition_on);
        Some(IgnitionTransition {
            entity: entity.to_string(),
            ignition_on,
            previous,
            voltage,
        })
    }

    /// Last known state of an entity
    pub fn state(&self, entity: &str) -> Option<bool> {
        self.states.get(entity).copied()
    }

    /// Number of entities observed so far
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}
