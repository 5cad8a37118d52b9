//! Wires mirrors, derived state and telemetry together
//!
//! The coordinator owns every piece of mutable state and is driven from a
//! single task: remote change batches and producer deliveries are processed
//! one at a time, in the order they are received.

use crate::checkpoint::CheckpointLedger;
use crate::enrich::{Enriched, Enricher, JoinContext};
use crate::feed::ChangeFeed;
use crate::ignition::IgnitionEngine;
use crate::registry::SyncRegistry;
use crate::sink::{Sink, SinkRecord};
use crate::sync::{MirrorHandler, NoopHandler, SyncOutcome};
use crate::telemetry::{TelemetryEvent, TrackedSample};
use crate::xref::{CrossReferenceIndex, IndexingHandler, SharedIndex};
use fleetmirror_core::{
    config::FleetConfig,
    error::Result,
    traits::CheckpointStore,
    types::RemoteChange,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Batches read ahead from a change feed while telemetry is being handled
const FEED_BUFFER: usize = 64;

/// Counters for one [`Coordinator::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub batches: usize,
    pub changes: usize,
    pub accepted: usize,
    pub telemetry_events: usize,
}

pub struct Coordinator {
    registry: SyncRegistry,
    index: SharedIndex,
    ignition: IgnitionEngine,
    enricher: Enricher,
    sink: Box<dyn Sink>,
}

impl Coordinator {
    /// Build a coordinator with the trackers and references mirrors registered
    ///
    /// The trackers mirror maintains the cross-reference index; the
    /// references mirror is read-only.
    pub fn new(
        config: &FleetConfig,
        store: Arc<dyn CheckpointStore>,
        sink: Box<dyn Sink>,
    ) -> Result<Self> {
        let ledger = CheckpointLedger::new(store, config.sync.clone());
        let mut registry = SyncRegistry::new(ledger);
        let index: SharedIndex = Arc::new(RwLock::new(CrossReferenceIndex::default()));

        let enrichment = &config.enrichment;
        registry.register(
            enrichment.trackers.clone(),
            Box::new(IndexingHandler::new(
                index.clone(),
                enrichment.short_id_field.clone(),
            )),
        )?;
        registry.register(enrichment.references.clone(), Box::new(NoopHandler))?;

        Ok(Self {
            registry,
            index,
            ignition: IgnitionEngine::new(&config.ignition)?,
            enricher: Enricher::new(enrichment.clone()),
            sink,
        })
    }

    /// Mirror an additional collection; must happen before [`start`](Self::start)
    pub fn register_mirror(
        &mut self,
        name: impl Into<String>,
        handler: Box<dyn MirrorHandler>,
    ) -> Result<()> {
        self.registry.register(name, handler)
    }

    pub fn registry(&self) -> &SyncRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SyncRegistry {
        &mut self.registry
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn ignition(&self) -> &IgnitionEngine {
        &self.ignition
    }

    /// Load every mirror's checkpoint and release batches held back so far
    pub async fn start(&mut self) -> Result<Vec<SyncOutcome>> {
        let outcomes = self.registry.initialize_all().await?;
        tracing::info!(
            mirrors = ?self.registry.names(),
            replayed = outcomes.len(),
            "Coordinator started"
        );
        Ok(outcomes)
    }

    /// Apply one remote change batch
    pub async fn handle_changes(&mut self, batch: Vec<RemoteChange>) -> Result<SyncOutcome> {
        let outcome = self.registry.apply_batch(batch).await?;
        tracing::trace!(outcome = outcome.label(), "Change batch routed");
        Ok(outcome)
    }

    /// Enrich one producer delivery and pass the results to the sink
    pub fn handle_telemetry(&mut self, event: TelemetryEvent) {
        self.refresh_index();

        let mut records = Vec::new();
        {
            let index = self.index.read();
            let config = self.enricher.config();
            let ctx = JoinContext {
                trackers: self.registry.mirror(&config.trackers),
                references: self.registry.mirror(&config.references),
                index: &index,
            };

            match event {
                TelemetryEvent::Position(fixes) => {
                    let mut transitions = Vec::new();
                    for enriched in self.enricher.enrich(fixes, &ctx).into_vec() {
                        let voltage = enriched.sample.voltage;
                        transitions.extend(track_ignition(&mut self.ignition, &enriched, voltage));
                        records.push(SinkRecord::Position(enriched));
                    }
                    records.extend(transitions);
                }
                TelemetryEvent::Voltage(samples) => {
                    for enriched in self.enricher.enrich(samples, &ctx).into_vec() {
                        let voltage = Some(enriched.sample.voltage);
                        records.extend(track_ignition(&mut self.ignition, &enriched, voltage));
                    }
                }
                TelemetryEvent::Link(updates) => {
                    for enriched in self.enricher.enrich_links(updates, &ctx).into_vec() {
                        records.push(SinkRecord::Link(enriched));
                    }
                }
                TelemetryEvent::Trip(trips) => {
                    for enriched in self.enricher.enrich(trips, &ctx).into_vec() {
                        records.push(SinkRecord::Trip(enriched));
                    }
                }
            }
        }

        for record in records {
            self.sink.deliver(record);
        }
    }

    /// Drive the coordinator until the feed is exhausted and every telemetry
    /// sender has been dropped
    ///
    /// Pending change batches take priority over pending telemetry. A feed
    /// error stops the run.
    pub async fn run<F>(
        &mut self,
        mut feed: F,
        mut telemetry: mpsc::UnboundedReceiver<TelemetryEvent>,
    ) -> Result<RunStats>
    where
        F: ChangeFeed + 'static,
    {
        let (batch_tx, mut batches) = mpsc::channel(FEED_BUFFER);
        let pump = tokio::spawn(async move {
            while let Some(next) = feed.next_batch().await.transpose() {
                let failed = next.is_err();
                if batch_tx.send(next).await.is_err() || failed {
                    break;
                }
            }
        });

        let mut stats = RunStats::default();
        let mut feed_open = true;
        let mut telemetry_open = true;

        while feed_open || telemetry_open {
            tokio::select! {
                biased;

                batch = batches.recv(), if feed_open => match batch {
                    Some(Ok(batch)) => {
                        stats.batches += 1;
                        stats.changes += batch.len();
                        match self.handle_changes(batch).await {
                            Ok(outcome) => {
                                if outcome.is_applied() {
                                    stats.accepted += 1;
                                }
                            }
                            Err(e) => {
                                pump.abort();
                                return Err(e);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("Change feed failed: {}", e);
                        pump.abort();
                        return Err(e);
                    }
                    None => {
                        tracing::debug!("Change feed exhausted");
                        feed_open = false;
                    }
                },

                event = telemetry.recv(), if telemetry_open => match event {
                    Some(event) => {
                        stats.telemetry_events += 1;
                        self.handle_telemetry(event);
                    }
                    None => {
                        tracing::debug!("All telemetry producers closed");
                        telemetry_open = false;
                    }
                },
            }
        }

        tracing::info!(
            batches = stats.batches,
            changes = stats.changes,
            accepted = stats.accepted,
            telemetry = stats.telemetry_events,
            "Run complete"
        );
        Ok(stats)
    }

    fn refresh_index(&self) {
        let config = self.enricher.config();
        let Some(trackers) = self.registry.mirror(&config.trackers) else {
            return;
        };
        if self.index.read().is_current(trackers) {
            return;
        }
        let rebuilt = CrossReferenceIndex::rebuild(trackers, &config.short_id_field);
        *self.index.write() = rebuilt;
    }
}

/// Feed a sample's voltage to the engine; a transition inherits the
/// sample's resolved tracker and reference
fn track_ignition<S: TrackedSample>(
    engine: &mut IgnitionEngine,
    enriched: &Enriched<S>,
    voltage: Option<f64>,
) -> Option<SinkRecord> {
    let entity = enriched.sample.short_id()?;
    let transition = engine.update(entity, voltage?)?;
    Some(SinkRecord::Ignition(Enriched {
        sample: transition,
        tracker: enriched.tracker.clone(),
        reference: enriched.reference.clone(),
    }))
}
