//! Optional graph/hotspot/scoring analysis, run once after rule evaluation
//! when any of the three is enabled in configuration.

pub mod graphs;
pub mod hotspots;
pub mod scoring;

use serde::{Deserialize, Serialize};

use crate::api::config::AnalysisConfig;
use crate::core::cancellation::CancellationToken;
use crate::core::fact_index::FactIndex;
pub use graphs::GraphSnapshot;
pub use hotspots::HotspotResult;
pub use scoring::ScoringReport;

/// The combined output of whichever analyses were enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub graphs: Vec<GraphSnapshot>,
    #[serde(default)]
    pub hotspots: Vec<HotspotResult>,
    #[serde(default)]
    pub scoring: Option<ScoringReport>,
}

/// Run every analysis enabled in `config` against `facts`. Returns `None`
/// when nothing is enabled, matching `EngineReport.analysis`'s `Option`.
pub fn run(facts: &FactIndex, config: &AnalysisConfig, cancel: &CancellationToken) -> Option<AnalysisReport> {
    if config.graphs.is_none() && config.hotspots.is_none() && config.scoring.is_none() {
        return None;
    }

    let graphs = config.graphs.as_ref().map(|g| graphs::build_snapshots(facts, g, cancel)).unwrap_or_default();
    let hotspots = config.hotspots.as_ref().map(|h| hotspots::compute(facts, h)).unwrap_or_default();
    let scoring = config.scoring.as_ref().map(|s| scoring::compute(facts, s));

    Some(AnalysisReport { graphs, hotspots, scoring })
}
