//! Status command implementation

use anyhow::{Context, Result};
use fleetmirror::prelude::*;

pub async fn execute(config: &FleetConfig, mirrors: &[String]) -> Result<()> {
    tracing::info!("Reading checkpoints from {}", config.lmdb.path.display());

    let store = LmdbCheckpointStore::open(config.lmdb.clone())
        .context("Failed to open checkpoint store")?;
    let ledger = CheckpointLedger::new(std::sync::Arc::new(store.clone()), config.sync.clone());

    println!("\nCheckpoint Status");
    println!("{}", "=".repeat(60));
    println!("Store: {} ({})", store.path().display(), store.store_type());

    let names: Vec<String> = if mirrors.is_empty() {
        let prefix = &config.sync.key_prefix;
        store
            .list()
            .await
            .context("Failed to list checkpoints")?
            .into_iter()
            .filter_map(|(key, _)| key.strip_prefix(prefix.as_str()).map(str::to_string))
            .collect()
    } else {
        mirrors.to_vec()
    };

    if names.is_empty() {
        println!("\nNo checkpoints recorded");
        return Ok(());
    }

    println!();
    for name in names {
        let version = ledger.load(&name).await;
        if version == NO_VERSION {
            println!("  {:<24} (none)", name);
        } else {
            println!("  {:<24} {}", name, version);
        }
    }

    Ok(())
}
