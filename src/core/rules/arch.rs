//! Role- and package-level architectural constraints.

use std::collections::BTreeMap;

use regex::Regex;

use crate::api::config::{EngineConfig, RuleDef};
use crate::api::types::Finding;
use crate::core::fact_index::FactIndex;
use crate::core::param_reader::ParamReader;
use crate::spi::traits::{Rule, RuleFailure};

fn base_finding(severity: crate::api::types::Severity, class_fqn: &str, file_path: &str, message: String) -> Finding {
    Finding {
        rule_id: String::new(),
        message,
        file_path: file_path.to_string(),
        severity,
        class_fqn: Some(class_fqn.to_string()),
        member_name: None,
        start_offset: None,
        end_offset: None,
        data: BTreeMap::new(),
    }
}

/// Parse a `"A->B"` role-pair param entry into `(from, to)`.
fn parse_role_pair(base_id: &str, raw: &str) -> Result<(String, String), RuleFailure> {
    match raw.split_once("->") {
        Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
            Ok((from.trim().to_string(), to.trim().to_string()))
        }
        _ => Err(RuleFailure::Param(format!("{base_id}: expected a 'from->to' role pair, got '{raw}'"))),
    }
}

/// Rewrite `to` to an external bucket node (`__external__:<package>` or
/// `__external__`) when it isn't a project class and `include_external` is
/// set; otherwise `None` drops the edge.
fn external_bucket(facts: &FactIndex, to: &crate::api::types::TypeRef, include_external: bool) -> Option<String> {
    if facts.contains_class(&to.fq_name) {
        return Some(to.fq_name.clone());
    }
    if !include_external {
        return None;
    }
    if to.package_name.is_empty() {
        Some(crate::core::graph_util::EXTERNAL_PREFIX.to_string())
    } else {
        Some(format!("{}:{}", crate::core::graph_util::EXTERNAL_PREFIX, to.package_name))
    }
}

/// Build a class-granularity graph including external bucket nodes when
/// `include_external` is set, so role-dependency rules can see edges that
/// leave the project.
fn build_class_graph_with_external(facts: &FactIndex, include_external: bool) -> crate::core::graph_util::DirectedGraph {
    let mut g = crate::core::graph_util::DirectedGraph::new();
    for class in &facts.classes {
        g.add_node(&class.fq_name);
    }
    for edge in &facts.edges {
        if edge.from.fq_name == edge.to.fq_name {
            continue;
        }
        if let Some(to) = external_bucket(facts, &edge.to, include_external) {
            g.add_edge(&edge.from.fq_name, &to);
        }
    }
    g
}

/// The role of a graph node: the class's role, or, for an external bucket
/// node, the literal node id itself (so a forbidden pair naming an external
/// bucket can still match).
fn role_of_node<'a>(facts: &'a FactIndex, node: &'a str) -> Option<&'a str> {
    if node.starts_with(crate::core::graph_util::EXTERNAL_PREFIX) {
        Some(node)
    } else {
        facts.role_of(node)
    }
}

/// `arch.forbiddenRoleDependencies`: for each configured `"from->to"` role
/// pair, flags whether any class in `from` depends (directly, or
/// transitively in `transitive` mode) on a class in `to`.
pub struct ForbiddenRoleDependencies;

impl Rule for ForbiddenRoleDependencies {
    fn base_id(&self) -> &'static str {
        "arch.forbiddenRoleDependencies"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        let pairs: Vec<(String, String)> =
            reader.get_str_list("forbid")?.into_iter().map(|raw| parse_role_pair(self.base_id(), raw)).collect::<Result<_, _>>()?;
        let mode = reader.get_enum("mode", &["direct", "transitive"]).unwrap_or("direct");
        let max_examples = reader.get_i64_or("maxExamples", 10)?.max(0) as usize;
        let include_external = reader.get_bool("includeExternal", false)?;

        let graph = build_class_graph_with_external(facts, include_external);
        let mut findings = Vec::new();

        for (from_role, to_role) in pairs {
            if from_role == to_role {
                continue;
            }

            let mut examples: Vec<String> = Vec::new();
            let mut role_path: Option<Vec<String>> = None;
            let mut anchor: Option<&crate::api::types::ClassFact> = None;

            for from_class in facts.classes_in_role(&from_role) {
                if mode == "transitive" {
                    for to_class in facts.classes_in_role(&to_role) {
                        if to_class.fq_name == from_class.fq_name {
                            continue;
                        }
                        let Some(path) = graph.shortest_path(&from_class.fq_name, &to_class.fq_name) else { continue };
                        if anchor.is_none() {
                            anchor = Some(from_class);
                            role_path = Some(collapse_role_path(facts, &path));
                        }
                        examples.push(format!("{}->{}", from_class.fq_name, to_class.fq_name));
                        if examples.len() >= max_examples {
                            break;
                        }
                    }
                } else {
                    for succ in graph.successors(&from_class.fq_name) {
                        if role_of_node(facts, succ) != Some(to_role.as_str()) {
                            continue;
                        }
                        if anchor.is_none() {
                            anchor = Some(from_class);
                        }
                        examples.push(format!("{}->{}", from_class.fq_name, succ));
                        if examples.len() >= max_examples {
                            break;
                        }
                    }
                }
                if examples.len() >= max_examples {
                    break;
                }
            }

            let Some(anchor) = anchor else { continue };

            let mut finding = base_finding(
                def.severity,
                &anchor.fq_name,
                &anchor.location.display_path(),
                format!("role '{from_role}' depends on forbidden role '{to_role}'"),
            );
            finding.data.insert("fromRole".to_string(), from_role.clone());
            finding.data.insert("toRole".to_string(), to_role.clone());
            finding.data.insert("mode".to_string(), mode.to_string());
            finding.data.insert("examples".to_string(), examples.join(","));
            if let Some(path) = role_path {
                finding.data.insert("path".to_string(), path.join(" -> "));
            }
            findings.push(finding);
        }

        Ok(findings)
    }
}

/// Map a BFS class-level path to its role chain, collapsing consecutive
/// classes that share a role (nodes with no role, including external
/// buckets, keep their raw node id).
fn collapse_role_path(facts: &FactIndex, path: &[String]) -> Vec<String> {
    let mut roles: Vec<String> = Vec::new();
    for node in path {
        let label = role_of_node(facts, node).unwrap_or(node.as_str()).to_string();
        if roles.last() != Some(&label) {
            roles.push(label);
        }
    }
    roles
}

/// `arch.allowedRoleDependencies`: flags every observed role-to-role edge
/// in the project graph that isn't in the configured allow list. Same-role
/// edges are always allowed.
pub struct AllowedRoleDependencies;

impl Rule for AllowedRoleDependencies {
    fn base_id(&self) -> &'static str {
        "arch.allowedRoleDependencies"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        let allow: std::collections::BTreeSet<(String, String)> = reader
            .get_str_list("allow")?
            .into_iter()
            .map(|raw| parse_role_pair(self.base_id(), raw))
            .collect::<Result<_, _>>()?;
        let max_examples = reader.get_i64_or("maxExamples", 10)?.max(0) as usize;
        let include_external = reader.get_bool("includeExternal", false)?;

        let graph = build_class_graph_with_external(facts, include_external);

        // Collect observed (fromRole, toRole) edges together with an anchor
        // class and up to `max_examples` class-level examples per pair;
        // role pairs iterate in `BTreeMap` (sorted) order, deterministic.
        let mut observed: BTreeMap<(String, String), (String, Vec<String>)> = BTreeMap::new();
        for class in &facts.classes {
            let Some(from_role) = facts.role_of(&class.fq_name) else { continue };
            for succ in graph.successors(&class.fq_name) {
                let Some(to_role) = role_of_node(facts, succ) else { continue };
                if from_role == to_role {
                    continue;
                }
                let key = (from_role.to_string(), to_role.to_string());
                let (_, examples) = observed.entry(key).or_insert_with(|| (class.fq_name.clone(), Vec::new()));
                if examples.len() < max_examples {
                    examples.push(format!("{}->{}", class.fq_name, succ));
                }
            }
        }

        let mut findings = Vec::new();
        for ((from_role, to_role), (anchor_fqn, examples)) in observed {
            if allow.contains(&(from_role.clone(), to_role.clone())) {
                continue;
            }
            let anchor = facts.class(&anchor_fqn);
            let mut finding = base_finding(
                def.severity,
                &anchor_fqn,
                anchor.map(|c| c.location.display_path()).unwrap_or_default().as_str(),
                format!("role '{from_role}' depends on role '{to_role}', which is outside its allow-list"),
            );
            finding.data.insert("fromRole".to_string(), from_role);
            finding.data.insert("toRole".to_string(), to_role);
            finding.data.insert("examples".to_string(), examples.join(","));
            findings.push(finding);
        }

        Ok(findings)
    }
}

fn compile_patterns(reader: &ParamReader, base_id: &str) -> Result<Vec<Regex>, RuleFailure> {
    reader
        .get_str_list("patterns")?
        .into_iter()
        .map(|p| Regex::new(p).map_err(|e| RuleFailure::Param(format!("{base_id}: invalid pattern '{p}': {e}"))))
        .collect()
}

/// `arch.allowedPackages`: flags classes whose package matches none of the
/// configured patterns.
pub struct AllowedPackages;

impl Rule for AllowedPackages {
    fn base_id(&self) -> &'static str {
        "arch.allowedPackages"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        let patterns = compile_patterns(&reader, self.base_id())?;

        let findings = facts
            .classes
            .iter()
            .filter(|c| !patterns.iter().any(|re| re.is_match(&c.package_name)))
            .map(|c| {
                base_finding(
                    def.severity,
                    &c.fq_name,
                    &c.location.display_path(),
                    format!("package '{}' is not in the allowed set", c.package_name),
                )
            })
            .collect();
        Ok(findings)
    }
}

/// `arch.forbiddenPackages`: flags classes whose package matches any of the
/// configured patterns.
pub struct ForbiddenPackages;

impl Rule for ForbiddenPackages {
    fn base_id(&self) -> &'static str {
        "arch.forbiddenPackages"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        let patterns = compile_patterns(&reader, self.base_id())?;

        let findings = facts
            .classes
            .iter()
            .filter(|c| patterns.iter().any(|re| re.is_match(&c.package_name)))
            .map(|c| {
                base_finding(
                    def.severity,
                    &c.fq_name,
                    &c.location.display_path(),
                    format!("package '{}' is forbidden", c.package_name),
                )
            })
            .collect();
        Ok(findings)
    }
}
