use serde::{Deserialize, Serialize};

/// Names of the mirrors and fields that telemetry is joined against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Mirror holding tracked entities
    /// Default: "trackers"
    #[serde(default = "default_trackers")]
    pub trackers: String,

    /// Mirror holding documents referenced by trackers
    /// Default: "references"
    #[serde(default = "default_references")]
    pub references: String,

    /// Tracker field carrying the short device identifier
    /// Default: "vID"
    #[serde(default = "default_short_id_field")]
    pub short_id_field: String,

    /// Tracker field pointing at a document in the references mirror
    /// Default: "referenceId"
    #[serde(default = "default_reference_field")]
    pub reference_field: String,
}

fn default_trackers() -> String {
    "trackers".to_string()
}

fn default_references() -> String {
    "references".to_string()
}

fn default_short_id_field() -> String {
    "vID".to_string()
}

fn default_reference_field() -> String {
    "referenceId".to_string()
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            trackers: default_trackers(),
            references: default_references(),
            short_id_field: default_short_id_field(),
            reference_field: default_reference_field(),
        }
    }
}
