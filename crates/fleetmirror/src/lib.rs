//! Fleetmirror: checkpointed collection mirrors with derived fleet state
//!
//! Fleetmirror keeps a crash-recoverable local replica of remote collections
//! and derives secondary state from it:
//! - **Mirrors**: in-memory replicas updated by remote change batches
//! - **Synchronizers**: per-mirror version filters that run domain handlers
//!   once per version advance and persist a checkpoint afterwards
//! - **Cross-reference index**: short device id -> canonical object id
//! - **Ignition engine**: hysteresis over supply-voltage bands
//! - **Enrichment**: joins telemetry samples against the mirrors
//!
//! # Quick Start
//!
//! ```no_run
//! use fleetmirror::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let config = FleetConfig::default();
//! let store = Arc::new(LmdbCheckpointStore::open(config.lmdb.clone())?);
//! let mut coordinator = Coordinator::new(&config, store, Box::new(TracingSink::new()))?;
//!
//! // Load checkpoints before any change is accepted
//! coordinator.start().await?;
//!
//! let feed = JsonLinesChangeFeed::open("./changes.jsonl").await?;
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! // Producers get clones of `tx` via `producer::connect`; the run ends once
//! // the feed is exhausted and every sender is gone
//! drop(tx);
//! coordinator.run(feed, rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod coordinator;
pub mod enrich;
pub mod feed;
pub mod ignition;
pub mod link;
pub mod mirror;
pub mod prelude;
pub mod producer;
pub mod registry;
pub mod sink;
pub mod sync;
pub mod telemetry;
pub mod xref;

// Re-export core types
pub use fleetmirror_core::{
    config::{
        CommitMode, EnrichmentConfig, FleetConfig, IgnitionConfig, LmdbConfig, SyncConfig,
        SyncMode, VoltageBand,
    },
    error::{MirrorError, Result},
    traits::CheckpointStore,
    types::{ChangeKind, DocId, Document, RemoteChange, Version, NO_VERSION},
};

// Re-export implementations
pub use fleetmirror_lmdb::LmdbCheckpointStore;

pub use checkpoint::{CheckpointLedger, CommitStatus, MemoryCheckpointStore};
pub use coordinator::{Coordinator, RunStats};
pub use enrich::{Enriched, EnrichedLink, Enricher, JoinContext};
pub use feed::{group_batches, ChangeFeed, JsonLinesChangeFeed, VecChangeFeed};
pub use ignition::{IgnitionEngine, IgnitionTransition};
pub use link::{select_active_link, ActiveLink, LinkCandidate, LinkUpdate};
pub use mirror::{Mirror, MirrorChange};
pub use producer::{ChannelProducer, JsonLinesProducer, SampleHandler, TelemetryProducer};
pub use registry::SyncRegistry;
pub use sink::{MemorySink, Sink, SinkRecord, TracingSink};
pub use sync::{MirrorHandler, MirrorSynchronizer, NoopHandler, SyncOutcome};
pub use telemetry::{
    PositionFix, Samples, TelemetryEvent, TrackedSample, TripSummary, VoltageSample,
};
pub use xref::{CrossReferenceIndex, IndexingHandler, SharedIndex};
