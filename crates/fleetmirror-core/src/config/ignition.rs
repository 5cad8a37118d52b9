use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};

/// Half-open voltage interval `[low, high)` in which the ignition is off
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageBand {
    pub low: f64,
    pub high: f64,
}

impl VoltageBand {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, voltage: f64) -> bool {
        voltage >= self.low && voltage < self.high
    }
}

/// Configuration for the ignition hysteresis engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnitionConfig {
    /// Bands classified as "ignition off"; anything else is "on".
    /// Default: resting battery `[0, 13)` and `[16, 25)`
    #[serde(default = "default_off_bands")]
    pub off_bands: Vec<VoltageBand>,
}

fn default_off_bands() -> Vec<VoltageBand> {
    vec![VoltageBand::new(0.0, 13.0), VoltageBand::new(16.0, 25.0)]
}

impl Default for IgnitionConfig {
    fn default() -> Self {
        Self {
            off_bands: default_off_bands(),
        }
    }
}

impl IgnitionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_off_bands(mut self, bands: Vec<VoltageBand>) -> Self {
        self.off_bands = bands;
        self
    }

    /// Bands sorted by lower bound, rejecting empty, non-finite or overlapping ranges
    pub fn validated_bands(&self) -> Result<Vec<VoltageBand>> {
        let mut bands = self.off_bands.clone();
        for band in &bands {
            if !band.low.is_finite() || !band.high.is_finite() {
                return Err(MirrorError::Config(format!(
                    "voltage band [{}, {}) must be finite",
                    band.low, band.high
                )));
            }
            if band.low >= band.high {
                return Err(MirrorError::Config(format!(
                    "voltage band [{}, {}) is empty",
                    band.low, band.high
                )));
            }
        }

        bands.sort_by(|a, b| a.low.total_cmp(&b.low));
        for pair in bands.windows(2) {
            if pair[1].low < pair[0].high {
                return Err(MirrorError::Config(format!(
                    "voltage bands [{}, {}) and [{}, {}) overlap",
                    pair[0].low, pair[0].high, pair[1].low, pair[1].high
                )));
            }
        }
        Ok(bands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bands_are_valid() {
        let bands = IgnitionConfig::default().validated_bands().unwrap();
        assert_eq!(bands.len(), 2);
        assert!(bands[0].contains(12.9));
        assert!(!bands[0].contains(13.0));
    }

    #[test]
    fn test_bands_are_sorted() {
        let cfg = IgnitionConfig::new().with_off_bands(vec![
            VoltageBand::new(16.0, 25.0),
            VoltageBand::new(0.0, 13.0),
        ]);
        let bands = cfg.validated_bands().unwrap();
        assert_eq!(bands[0].low, 0.0);
    }

    #[test]
    fn test_rejects_overlap_and_empty() {
        let overlap = IgnitionConfig::new().with_off_bands(vec![
            VoltageBand::new(0.0, 14.0),
            VoltageBand::new(13.0, 20.0),
        ]);
        assert!(matches!(
            overlap.validated_bands(),
            Err(MirrorError::Config(_))
        ));

        let empty = IgnitionConfig::new().with_off_bands(vec![VoltageBand::new(5.0, 5.0)]);
        assert!(empty.validated_bands().is_err());

        let nan = IgnitionConfig::new().with_off_bands(vec![VoltageBand::new(f64::NAN, 5.0)]);
        assert!(nan.validated_bands().is_err());
    }

    #[test]
    fn test_adjacent_bands_allowed() {
        let cfg = IgnitionConfig::new().with_off_bands(vec![
            VoltageBand::new(0.0, 13.0),
            VoltageBand::new(13.0, 14.0),
        ]);
        assert!(cfg.validated_bands().is_ok());
    }
}
