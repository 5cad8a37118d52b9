pub mod enrichment;
pub mod fleet;
pub mod ignition;
pub mod lmdb;
pub mod sync;

pub use enrichment::EnrichmentConfig;
pub use fleet::FleetConfig;
pub use ignition::{IgnitionConfig, VoltageBand};
pub use lmdb::{LmdbConfig, SyncMode};
pub use sync::{CommitMode, SyncConfig};
