//! Per-node and per-class size/connectivity ceilings.

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

fn anchor_finding(facts: &FactIndex, granularity: &str, node: &str) -> (Option<String>, String) {
    if granularity == "class" {
        let path = facts.class(node).map(|c| c.location.display_path()).unwrap_or_default();
        (Some(node.to_string()), path)
    } else {
        (None, node.to_string())
    }
}

fn fan_rule(
    reader: &ParamReader,
    facts: &FactIndex,
    def: &RuleDef,
    metric_name: &str,
    metric: impl Fn(&DirectedGraph, &str) -> usize,
) -> Result<Vec<Finding>, RuleFailure> {
    let granularity = reader.get_enum("granularity", &["class", "package", "module"]).unwrap_or("class");
    let max = reader.get_i64("max")?;
    let graph = build_graph(granularity, facts);

    let mut findings = Vec::new();
    for node in graph.nodes() {
        let value = metric(&graph, node) as i64;
        if value <= max {
            continue;
        }
        let (class_fqn, file_path) = anchor_finding(facts, granularity, node);
        let mut data = BTreeMap::new();
        data.insert("granularity".to_string(), granularity.to_string());
        data.insert(metric_name.to_string(), value.to_string());
        data.insert("max".to_string(), max.to_string());
        findings.push(Finding {
            rule_id: String::new(),
            message: format!("{granularity} node '{node}' has {metric_name} {value}, exceeding the configured maximum of {max}"),
            file_path,
            severity: def.severity,
            class_fqn,
            member_name: None,
            start_offset: None,
            end_offset: None,
            data,
        });
    }
    Ok(findings)
}

/// `metrics.maxFanIn`: flags nodes whose incoming edge count exceeds a ceiling.
pub struct MaxFanIn;

impl Rule for MaxFanIn {
    fn base_id(&self) -> &'static str {
        "metrics.maxFanIn"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        fan_rule(&reader, facts, def, "fanIn", DirectedGraph::fan_in)
    }
}

/// `metrics.maxFanOut`: flags nodes whose outgoing edge count exceeds a ceiling.
pub struct MaxFanOut;

impl Rule for MaxFanOut {
    fn base_id(&self) -> &'static str {
        "metrics.maxFanOut"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        fan_rule(&reader, facts, def, "fanOut", DirectedGraph::fan_out)
    }
}

/// `metrics.maxMethods`: flags classes declaring more than `max` methods.
pub struct MaxMethods;

impl Rule for MaxMethods {
    fn base_id(&self) -> &'static str {
        "metrics.maxMethods"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        let max = reader.get_i64("max")?;

        let findings = facts
            .classes
            .iter()
            .filter(|c| c.method_count as i64 > max)
            .map(|c| {
                let mut data = BTreeMap::new();
                data.insert("methodCount".to_string(), c.method_count.to_string());
                data.insert("max".to_string(), max.to_string());
                Finding {
                    rule_id: String::new(),
                    message: format!("class '{}' declares {} methods, exceeding the configured maximum of {max}", c.fq_name, c.method_count),
                    file_path: c.location.display_path(),
                    severity: def.severity,
                    class_fqn: Some(c.fq_name.clone()),
                    member_name: None,
                    start_offset: None,
                    end_offset: None,
                    data,
                }
            })
            .collect();
        Ok(findings)
    }
}

/// `metrics.maxFields`: flags classes declaring more than `max` fields.
pub struct MaxFields;

impl Rule for MaxFields {
    fn base_id(&self) -> &'static str {
        "metrics.maxFields"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        let max = reader.get_i64("max")?;

        let findings = facts
            .classes
            .iter()
            .filter(|c| c.field_count as i64 > max)
            .map(|c| {
                let mut data = BTreeMap::new();
                data.insert("fieldCount".to_string(), c.field_count.to_string());
                data.insert("max".to_string(), max.to_string());
                Finding {
                    rule_id: String::new(),
                    message: format!("class '{}' declares {} fields, exceeding the configured maximum of {max}", c.fq_name, c.field_count),
                    file_path: c.location.display_path(),
                    severity: def.severity,
                    class_fqn: Some(c.fq_name.clone()),
                    member_name: None,
                    start_offset: None,
                    end_offset: None,
                    data,
                }
            })
            .collect();
        Ok(findings)
    }
}
