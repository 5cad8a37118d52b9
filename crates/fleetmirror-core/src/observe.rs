//! Optional metrics instrumentation for fleetmirror.
//!
//! When the `observe` feature is enabled, synchronization, checkpointing,
//! ignition and enrichment emit counters and histograms via the [`metrics`]
//! crate. A downstream application must install a metrics recorder to
//! collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record the outcome of routing one change through a synchronizer.
///
/// - `fleetmirror.sync.changes_total` – counter with `mirror` and `outcome` labels
#[inline]
pub fn record_change(mirror: &str, outcome: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!(
            "fleetmirror.sync.changes_total",
            "mirror" => mirror.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (mirror, outcome);
    }
}

/// Record a checkpoint write (counter + latency histogram).
///
/// - `fleetmirror.checkpoint.writes_total` – counter with `outcome` label
/// - `fleetmirror.checkpoint.write_duration_seconds` – histogram
#[inline]
pub fn record_checkpoint_write(duration: std::time::Duration, success: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "fail" };
        metrics::counter!("fleetmirror.checkpoint.writes_total", "outcome" => outcome)
            .increment(1);
        metrics::histogram!("fleetmirror.checkpoint.write_duration_seconds")
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (duration, success);
    }
}

/// Record an ignition transition.
///
/// - `fleetmirror.ignition.transitions_total` – counter with `state` label (`on` / `off`)
#[inline]
pub fn record_ignition_transition(ignition_on: bool) {
    #[cfg(feature = "observe")]
    {
        let state = if ignition_on { "on" } else { "off" };
        metrics::counter!("fleetmirror.ignition.transitions_total", "state" => state).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = ignition_on;
    }
}

/// Record a join that could not be resolved during enrichment.
///
/// - `fleetmirror.enrichment.misses_total` – counter with `field` label
#[inline]
pub fn record_enrichment_miss(field: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("fleetmirror.enrichment.misses_total", "field" => field).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = field;
    }
}
