//! Fleetmirror Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use fleetmirror::prelude::*;
//! ```

// Core types
pub use crate::{
    ChangeKind, DocId, Document, MirrorError, RemoteChange, Result, Version, NO_VERSION,
};

// Configs
pub use crate::{CommitMode, EnrichmentConfig, FleetConfig, IgnitionConfig, SyncConfig};

// Traits
pub use crate::{ChangeFeed, CheckpointStore, MirrorHandler, Sink, TelemetryProducer};

// Implementations
pub use crate::{
    CheckpointLedger, Coordinator, JsonLinesChangeFeed, LmdbCheckpointStore,
    MemoryCheckpointStore, MemorySink, Mirror, SyncRegistry, TracingSink, VecChangeFeed,
};

// Telemetry
pub use crate::{LinkUpdate, PositionFix, Samples, TelemetryEvent, TripSummary, VoltageSample};
