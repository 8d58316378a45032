//! Per-class "god score" and per-package "overall score" (model V1).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::config::{GodScoreWeights, Granularity, PackageScoreWeights, ScoringConfig};
use crate::core::analysis::graphs::graph_for;
use crate::core::analysis::hotspots::package_spread_of;
use crate::core::fact_index::FactIndex;

/// Severity band a score falls into, per the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScoreBand {
    Ok,
    Warn,
    Error,
}

fn band_of(score: f64, config: &ScoringConfig) -> ScoreBand {
    if score >= config.error_threshold {
        ScoreBand::Error
    } else if score >= config.warn_threshold {
        ScoreBand::Warn
    } else {
        ScoreBand::Ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassScore {
    pub fq_name: String,
    pub god_score: f64,
    pub band: ScoreBand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageScore {
    pub package: String,
    pub overall_score: f64,
    pub band: ScoreBand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringReport {
    pub classes: Vec<ClassScore>,
    pub packages: Vec<PackageScore>,
}

fn normalize(raw: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let max = raw.values().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return raw.keys().map(|k| (k.clone(), 0.0)).collect();
    }
    raw.iter().map(|(k, v)| (k.clone(), v / max)).collect()
}

fn weighted_average(components: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = components.iter().map(|(w, _)| w).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    components.iter().map(|(w, v)| w * v).sum::<f64>() / total_weight
}

fn god_scores(facts: &FactIndex, weights: &GodScoreWeights) -> BTreeMap<String, f64> {
    let class_graph = graph_for(Granularity::Class, facts);

    let mut method_count = BTreeMap::new();
    let mut field_count = BTreeMap::new();
    let mut fan_out = BTreeMap::new();
    let mut fan_in = BTreeMap::new();
    let mut pkg_spread = BTreeMap::new();

    for class in &facts.classes {
        method_count.insert(class.fq_name.clone(), class.method_count as f64);
        field_count.insert(class.fq_name.clone(), class.field_count as f64);
        fan_out.insert(class.fq_name.clone(), class_graph.fan_out(&class.fq_name) as f64);
        fan_in.insert(class.fq_name.clone(), class_graph.fan_in(&class.fq_name) as f64);
        pkg_spread.insert(class.fq_name.clone(), package_spread_of(&class_graph, facts, &class.fq_name));
    }

    let method_count = normalize(&method_count);
    let field_count = normalize(&field_count);
    let fan_out = normalize(&fan_out);
    let fan_in = normalize(&fan_in);
    let pkg_spread = normalize(&pkg_spread);

    facts
        .classes
        .iter()
        .map(|class| {
            let score = weighted_average(&[
                (weights.method_count, method_count[&class.fq_name]),
                (weights.field_count, field_count[&class.fq_name]),
                (weights.fan_out, fan_out[&class.fq_name]),
                (weights.fan_in, fan_in[&class.fq_name]),
                (weights.package_spread, pkg_spread[&class.fq_name]),
            ]);
            (class.fq_name.clone(), score)
        })
        .collect()
}

/// Local density of a single node: its incident-edge count over the
/// maximum possible incident edges to every other node. A per-node
/// generalization of `DirectedGraph::dependency_density`.
fn node_density(graph: &crate::core::graph_util::DirectedGraph, node: &str) -> f64 {
    let n = graph.node_count();
    if n < 2 {
        return 0.0;
    }
    let incident = (graph.fan_in(node) + graph.fan_out(node)) as f64;
    incident / (2.0 * (n as f64 - 1.0))
}

fn package_scores(facts: &FactIndex, weights: &PackageScoreWeights, class_scores: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let package_graph = graph_for(Granularity::Package, facts);
    let cyclic: std::collections::BTreeSet<&str> = package_graph.cyclic_components().into_iter().flatten().collect();

    package_graph
        .nodes()
        .into_iter()
        .map(|pkg| {
            let cycles = if cyclic.contains(pkg) { 1.0 } else { 0.0 };
            let density = node_density(&package_graph, pkg);
            // Reserved for a future layering-violation detector; always 0 in V1.
            let layering_violations = 0.0;
            let classes_in_pkg: Vec<&str> = facts.classes.iter().filter(|c| c.package_name == pkg).map(|c| c.fq_name.as_str()).collect();
            let god_class_prevalence = if classes_in_pkg.is_empty() {
                0.0
            } else {
                classes_in_pkg.iter().map(|fqn| class_scores.get(*fqn).copied().unwrap_or(0.0)).sum::<f64>() / classes_in_pkg.len() as f64
            };
            // FactIndex only retains project-internal edges, so no out-edge ever
            // targets an external bucket in this build; external coupling is
            // always 0 until the scanner grows external-bucket edge capture.
            let external_coupling = 0.0;

            let score = weighted_average(&[
                (weights.cycles, cycles),
                (weights.dependency_density, density),
                (weights.layering_violations, layering_violations),
                (weights.god_class_prevalence, god_class_prevalence),
                (weights.external_coupling, external_coupling),
            ]);
            (pkg.to_string(), score)
        })
        .collect()
}

/// Compute the full scoring report for one run.
pub fn compute(facts: &FactIndex, config: &ScoringConfig) -> ScoringReport {
    let god = god_scores(facts, &config.god_score_weights);
    let pkg = package_scores(facts, &config.package_score_weights, &god);

    let classes = facts
        .classes
        .iter()
        .map(|c| {
            let score = god[&c.fq_name];
            ClassScore { fq_name: c.fq_name.clone(), god_score: score, band: band_of(score, config) }
        })
        .collect();

    let packages = pkg
        .into_iter()
        .map(|(package, score)| PackageScore { overall_score: score, band: band_of(score, config), package })
        .collect();

    ScoringReport { classes, packages }
}
