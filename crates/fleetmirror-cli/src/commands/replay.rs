//! Replay command implementation

use anyhow::{Context, Result};
use fleetmirror::prelude::*;
use fleetmirror::producer::{self, JsonLinesProducer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn execute(
    config: &FleetConfig,
    changes: PathBuf,
    telemetry: Option<PathBuf>,
) -> Result<()> {
    let store = Arc::new(
        LmdbCheckpointStore::open(config.lmdb.clone())
            .context("Failed to open checkpoint store")?,
    );
    let mut coordinator = Coordinator::new(config, store, Box::new(TracingSink::new()))
        .context("Failed to build coordinator")?;

    // Checkpoints must be loaded before any change is routed
    coordinator
        .start()
        .await
        .context("Failed to load checkpoints")?;

    let feed = JsonLinesChangeFeed::open(&changes)
        .await
        .with_context(|| format!("Failed to open {}", changes.display()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    if let Some(path) = telemetry {
        let mut replay = JsonLinesProducer::new("replay", path);
        producer::connect(&mut replay, tx).context("Failed to start telemetry replay")?;
    } else {
        drop(tx);
    }

    let stats = coordinator.run(feed, rx).await.context("Replay failed")?;

    println!(
        "✓ Replayed {} batches ({} changes, {} accepted), {} telemetry deliveries",
        stats.batches, stats.changes, stats.accepted, stats.telemetry_events
    );
    for name in coordinator.registry().names() {
        if let Some(baseline) = coordinator.registry().baseline(name) {
            println!("  {:<24} {}", name, baseline);
        }
    }

    Ok(())
}
