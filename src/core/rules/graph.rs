//! Aggregate graph-shape rules.

use std::collections::BTreeMap;

use crate::api::config::{EngineConfig, RuleDef};
use crate::api::types::Finding;
use crate::core::fact_index::FactIndex;
use crate::core::graph_util::{build_class_graph, build_module_graph, build_package_graph, DirectedGraph};
use crate::core::param_reader::ParamReader;
use crate::spi::traits::{Rule, RuleFailure};

fn build_graph(granularity: &str, facts: &FactIndex) -> DirectedGraph {
    match granularity {
        "package" => build_package_graph(facts),
        "module" => build_module_graph(facts),
        _ => build_class_graph(facts),
    }
}

/// `graph.maxEdgeCount`: flags when a granularity's total edge count
/// exceeds a configured ceiling. Not anchored to a single class, so the
/// finding's `file_path` carries the project base path as a stand-in
/// anchor and the granularity is recorded in `data`.
pub struct MaxEdgeCount;

impl Rule for MaxEdgeCount {
    fn base_id(&self) -> &'static str {
        "graph.maxEdgeCount"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        let granularity = reader.get_enum("granularity", &["class", "package", "module"]).unwrap_or("class");
        let max = reader.get_i64("max")?;

        let graph = build_graph(granularity, facts);
        let edge_count = graph.edge_count() as i64;
        if edge_count <= max {
            return Ok(Vec::new());
        }

        let mut data = BTreeMap::new();
        data.insert("granularity".to_string(), granularity.to_string());
        data.insert("edgeCount".to_string(), edge_count.to_string());
        data.insert("max".to_string(), max.to_string());

        Ok(vec![Finding {
            rule_id: String::new(),
            message: format!("{granularity} dependency graph has {edge_count} edges, exceeding the configured maximum of {max}"),
            file_path: config.project.bytecode.project_base.display().to_string(),
            severity: def.severity,
            class_fqn: None,
            member_name: None,
            start_offset: None,
            end_offset: None,
            data,
        }])
    }
}
