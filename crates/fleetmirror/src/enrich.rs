//! Joins telemetry samples against the mirrors
//!
//! For each sample: short id -> (cross-reference) -> tracker document ->
//! reference field -> reference document. A miss at any step leaves the
//! remaining fields absent; it never fails the sample or its batch.

use crate::link::{select_active_link, ActiveLink, LinkUpdate};
use crate::mirror::Mirror;
use crate::telemetry::{Samples, TrackedSample};
use crate::xref::CrossReferenceIndex;
use fleetmirror_core::{config::EnrichmentConfig, observe, types::Document};
use serde::Serialize;

/// Current state the joins read from
#[derive(Clone, Copy)]
pub struct JoinContext<'a> {
    pub trackers: Option<&'a Mirror>,
    pub references: Option<&'a Mirror>,
    pub index: &'a CrossReferenceIndex,
}

/// A sample with the documents it resolved to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enriched<S> {
    pub sample: S,
    pub tracker: Option<Document>,
    pub reference: Option<Document>,
}

/// A link update with its resolved tracker and chosen antenna
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedLink {
    pub sample: LinkUpdate,
    pub tracker: Option<Document>,
    pub reference: Option<Document>,
    pub link: Option<ActiveLink>,
}

pub struct Enricher {
    config: EnrichmentConfig,
}

impl Enricher {
    pub fn new(config: EnrichmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Enrich a single sample or a batch; batches are enriched per item
    pub fn enrich<S: TrackedSample>(
        &self,
        samples: Samples<S>,
        ctx: &JoinContext<'_>,
    ) -> Samples<Enriched<S>> {
        samples.map(|sample| self.enrich_one(sample, ctx))
    }

    pub fn enrich_one<S: TrackedSample>(&self, sample: S, ctx: &JoinContext<'_>) -> Enriched<S> {
        let tracker = sample
            .short_id()
            .and_then(|short_id| self.resolve_tracker(short_id, ctx));
        let reference = tracker
            .as_ref()
            .and_then(|tracker| self.resolve_reference(tracker, ctx));
        Enriched {
            sample,
            tracker,
            reference,
        }
    }

    /// Enrich link updates, additionally selecting the active antenna
    pub fn enrich_links(
        &self,
        samples: Samples<LinkUpdate>,
        ctx: &JoinContext<'_>,
    ) -> Samples<EnrichedLink> {
        samples.map(|update| {
            let link = select_active_link(&update).map(|mut link| {
                link.antenna_object_id = ctx.index.lookup(&link.antenna_vid).cloned();
                link
            });
            let Enriched {
                sample,
                tracker,
                reference,
            } = self.enrich_one(update, ctx);
            EnrichedLink {
                sample,
                tracker,
                reference,
                link,
            }
        })
    }

    fn resolve_tracker(&self, short_id: &str, ctx: &JoinContext<'_>) -> Option<Document> {
        let Some(object_id) = ctx.index.lookup(short_id) else {
            tracing::debug!(short_id, "Unknown tracker short id");
            observe::record_enrichment_miss("tracker");
            return None;
        };
        let tracker = ctx.trackers.and_then(|mirror| mirror.get(object_id)).cloned();
        if tracker.is_none() {
            tracing::debug!(short_id, object_id = %object_id, "Tracker missing from mirror");
            observe::record_enrichment_miss("tracker");
        }
        tracker
    }

    fn resolve_reference(&self, tracker: &Document, ctx: &JoinContext<'_>) -> Option<Document> {
        let reference_id = tracker.get_doc_id(&self.config.reference_field)?;
        let reference = ctx
            .references
            .and_then(|mirror| mirror.get(&reference_id))
            .cloned();
        if reference.is_none() {
            tracing::debug!(
                tracker = %tracker.id,
                reference = %reference_id,
                "Unknown reference"
            );
            observe::record_enrichment_miss("reference");
        }
        reference
    }
}
