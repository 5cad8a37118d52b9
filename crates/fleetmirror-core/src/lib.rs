//! Fleetmirror Core: Traits and types shared by the mirror subsystem
//!
//! This crate defines the abstractions used to keep a crash-recoverable local
//! replica of remote collections:
//! - Documents and change records delivered by the remote source
//! - The checkpoint store contract (durable key -> version)
//! - Configuration for synchronization, ignition and enrichment
//! - Optional metrics hooks (`observe` feature)

pub mod config;
pub mod error;
pub mod observe;
pub mod traits;
pub mod types;

pub use config::{
    CommitMode, EnrichmentConfig, FleetConfig, IgnitionConfig, LmdbConfig, SyncConfig, SyncMode,
    VoltageBand,
};
pub use error::{MirrorError, Result};
pub use traits::CheckpointStore;
pub use types::{ChangeKind, DocId, Document, RemoteChange, Version, NO_VERSION};
