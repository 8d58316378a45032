//! Top-N rankings per metric at class and package granularity.

use serde::{Deserialize, Serialize};

use crate::api::config::{Granularity, HotspotConfig, HotspotMetric};
use crate::core::analysis::graphs::graph_for;
use crate::core::fact_index::FactIndex;
use crate::core::graph_util::DirectedGraph;

/// One ranked entry: a node id, its raw metric value, and its 1-based rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotEntry {
    pub id: String,
    pub value: f64,
    pub rank: usize,
}

/// The top-N ranking for one metric at one granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotResult {
    pub granularity: Granularity,
    pub metric: HotspotMetric,
    pub entries: Vec<HotspotEntry>,
}

/// Number of distinct packages touched by a class's direct dependencies.
pub(crate) fn package_spread_of(class_graph: &DirectedGraph, facts: &FactIndex, fq_name: &str) -> f64 {
    let mut packages: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
    for succ in class_graph.successors(fq_name) {
        if let Some(c) = facts.class(succ) {
            packages.insert(&c.package_name);
        }
    }
    packages.len() as f64
}

fn metric_value(metric: HotspotMetric, granularity: Granularity, graph: &DirectedGraph, facts: &FactIndex, node: &str) -> f64 {
    match metric {
        HotspotMetric::FanIn => graph.fan_in(node) as f64,
        HotspotMetric::FanOut => graph.fan_out(node) as f64,
        HotspotMetric::PackageSpread => match granularity {
            Granularity::Class => package_spread_of(graph, facts, node),
            _ => graph.fan_out(node) as f64,
        },
        HotspotMetric::MethodCount => match granularity {
            Granularity::Class => facts.class(node).map(|c| c.method_count as f64).unwrap_or(0.0),
            Granularity::Package => facts.classes.iter().filter(|c| c.package_name == node).map(|c| c.method_count as f64).sum(),
            Granularity::Module => facts
                .classes
                .iter()
                .filter(|c| c.package_name.split('.').next().unwrap_or(&c.package_name) == node)
                .map(|c| c.method_count as f64)
                .sum(),
        },
    }
}

fn rank_metric(metric: HotspotMetric, granularity: Granularity, facts: &FactIndex, top_n: usize) -> HotspotResult {
    let graph = graph_for(granularity, facts);
    let mut scored: Vec<(String, f64)> =
        graph.nodes().into_iter().map(|n| (n.to_string(), metric_value(metric, granularity, &graph, facts, n))).collect();
    // Descending value, ties broken by id ascending.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    let entries = scored
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (id, value))| HotspotEntry { id, value, rank: i + 1 })
        .collect();
    HotspotResult { granularity, metric, entries }
}

/// Compute every configured metric's top-N ranking at class and package
/// granularity (module granularity is out of scope for hotspot ranking).
pub fn compute(facts: &FactIndex, config: &HotspotConfig) -> Vec<HotspotResult> {
    let mut out = Vec::new();
    for &metric in &config.metrics {
        for granularity in [Granularity::Class, Granularity::Package] {
            out.push(rank_metric(metric, granularity, facts, config.top_n));
        }
    }
    out
}
