use super::{EnrichmentConfig, IgnitionConfig, LmdbConfig, SyncConfig};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, loadable from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub ignition: IgnitionConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub lmdb: LmdbConfig,
}

impl FleetConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
