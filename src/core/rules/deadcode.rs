//! Unreachable-class detection.

use std::collections::BTreeMap;

use crate::api::config::{EngineConfig, RuleDef};
use crate::api::types::{ClassFact, Finding};
use crate::core::fact_index::FactIndex;
use crate::core::graph_util::build_class_graph;
use crate::spi::traits::{Rule, RuleFailure};

/// Whether `class` carries a marker annotation identifying it as an
/// entry point, by simple name (`EntryPoint`, `entry-point`, case-insensitive).
fn is_annotated_entry_point(class: &ClassFact) -> bool {
    class.annotation_fqns.iter().any(|fqn| {
        let simple = fqn.rsplit('.').next().unwrap_or(fqn);
        simple.eq_ignore_ascii_case("EntryPoint") || simple.eq_ignore_ascii_case("entry-point")
    })
}

/// `deadcode.unreachable`: flags classes with no incoming project
/// dependency edge, excluding entry points (classes with a `main` method
/// or annotated as an entry point). Takes no parameters.
pub struct Unreachable;

impl Rule for Unreachable {
    fn base_id(&self) -> &'static str {
        "deadcode.unreachable"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let graph = build_class_graph(facts);
        let mut findings = Vec::new();

        for class in &facts.classes {
            if class.has_main_method || is_annotated_entry_point(class) {
                continue;
            }
            if graph.fan_in(&class.fq_name) > 0 {
                continue;
            }

            findings.push(Finding {
                rule_id: String::new(),
                message: format!("class '{}' has no incoming dependency within the project", class.fq_name),
                file_path: class.location.display_path(),
                severity: def.severity,
                class_fqn: Some(class.fq_name.clone()),
                member_name: None,
                start_offset: None,
                end_offset: None,
                data: BTreeMap::new(),
            });
        }
        Ok(findings)
    }
}
