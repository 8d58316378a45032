//! Per-granularity graph snapshots: sorted nodes, sorted adjacency, SCC
//! count, cyclic SCCs, and a bounded set of representative cycles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::config::{Granularity, GraphAnalysisConfig};
use crate::core::cancellation::CancellationToken;
use crate::core::fact_index::FactIndex;
use crate::core::graph_util::{build_class_graph, build_module_graph, build_package_graph, DirectedGraph};

/// A deterministic snapshot of one granularity's dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub granularity: Granularity,
    /// Sorted node ids.
    pub nodes: Vec<String>,
    /// `node -> sorted successor list`.
    pub adjacency: BTreeMap<String, Vec<String>>,
    /// Total number of strongly connected components.
    pub scc_count: usize,
    /// SCCs with more than one member, or a self-loop, sorted.
    pub cyclic_sccs: Vec<Vec<String>>,
    /// Up to `max_cycles` representative simple cycles, each ≤ `max_cycle_nodes` long.
    pub sample_cycles: Vec<Vec<String>>,
}

pub(crate) fn graph_for(granularity: Granularity, facts: &FactIndex) -> DirectedGraph {
    match granularity {
        Granularity::Class => build_class_graph(facts),
        Granularity::Package => build_package_graph(facts),
        Granularity::Module => build_module_graph(facts),
    }
}

fn snapshot_one(granularity: Granularity, facts: &FactIndex, config: &GraphAnalysisConfig, cancel: &CancellationToken) -> GraphSnapshot {
    let graph = graph_for(granularity, facts);

    let nodes: Vec<String> = graph.nodes().into_iter().map(str::to_string).collect();
    let adjacency = nodes
        .iter()
        .map(|n| (n.clone(), graph.successors(n).into_iter().map(str::to_string).collect()))
        .collect();
    let sccs = graph.strongly_connected_components();
    let scc_count = sccs.len();
    let cyclic_sccs: Vec<Vec<String>> =
        graph.cyclic_components().into_iter().map(|scc| scc.into_iter().map(str::to_string).collect()).collect();
    let sample_cycles = graph.sample_cycles(config.max_cycles, config.max_cycle_nodes, cancel);

    GraphSnapshot { granularity, nodes, adjacency, scc_count, cyclic_sccs, sample_cycles }
}

/// Build one snapshot per configured granularity.
pub fn build_snapshots(facts: &FactIndex, config: &GraphAnalysisConfig, cancel: &CancellationToken) -> Vec<GraphSnapshot> {
    let mut out = Vec::new();
    for &granularity in &config.granularities {
        if cancel.is_cancelled() {
            break;
        }
        out.push(snapshot_one(granularity, facts, config, cancel));
    }
    out
}
