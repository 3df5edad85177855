//! Deterministic offline driver: advances simulated time without timers.

use crate::{SchedulerConfig, SimulationEngine};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use sim_core::AssetId;
use std::collections::BTreeMap;
use tracing::info;

/// Totals of an offline run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub production_ticks: u64,
    pub drifts: u64,
    pub autosaves: u64,
    /// Amount mined per asset during the run.
    pub mined: BTreeMap<AssetId, f64>,
}

/// Advance the engine by `steps` production periods starting at `start`.
///
/// Within a step the production tick runs first, then the price drift and
/// the autosave when their period divides the elapsed time.
pub fn run_seconds(
    engine: &mut SimulationEngine,
    cfg: &SchedulerConfig,
    steps: u64,
    start: DateTime<Utc>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let step_ms = cfg.production.as_millis().max(1);
    let drift_ms = cfg.drift.as_millis().max(1);
    let save_ms = cfg.autosave.as_millis().max(1);
    for i in 1..=steps {
        let elapsed_ms = step_ms * u128::from(i);
        let offset = i64::try_from(elapsed_ms).unwrap_or(i64::MAX);
        let now = start + ChronoDuration::milliseconds(offset);
        let report = engine.tick(now);
        for (asset, reward) in report.rewards {
            *summary.mined.entry(asset).or_insert(0.0) += reward;
        }
        summary.production_ticks += 1;
        if elapsed_ms % drift_ms == 0 {
            engine.drift_prices();
            summary.drifts += 1;
        }
        if elapsed_ms % save_ms == 0 {
            engine.save();
            summary.autosaves += 1;
        }
    }
    info!(
        ticks = summary.production_ticks,
        drifts = summary.drifts,
        autosaves = summary.autosaves,
        "offline run finished"
    );
    summary
}
