//! Resolves configured rule instances against the set of compiled-in
//! [`Rule`] implementations, expands role-scoped instances, and runs
//! evaluation. Explicit registration, no reflection.

use std::collections::BTreeMap;

use tracing::warn;

use crate::api::config::{EngineConfig, RuleDef, RuleScope, UnknownRulePolicy};
use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::Finding;
use crate::core::fact_index::FactIndex;
use crate::spi::traits::Rule;
use crate::spi::types::CompiledScope;

/// The explicit set of available rule implementations, keyed by base id.
pub struct RuleRegistry {
    rules: BTreeMap<&'static str, Box<dyn Rule>>,
}

impl RuleRegistry {
    /// The shipped rule set.
    pub fn standard() -> Self {
        let mut registry = RuleRegistry { rules: BTreeMap::new() };
        for rule in crate::core::rules::shipped_rules() {
            registry.register(rule);
        }
        registry
    }

    /// Build a registry from the shipped set plus extension rules,
    /// overriding shipped rules with the same base id.
    pub fn with_extra(extra: Vec<Box<dyn Rule>>) -> Self {
        let mut registry = Self::standard();
        for rule in extra {
            registry.register(rule);
        }
        registry
    }

    fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.insert(rule.base_id(), rule);
    }

    pub fn get(&self, base_id: &str) -> Option<&dyn Rule> {
        self.rules.get(base_id).map(|b| b.as_ref())
    }

    /// Every registered rule's base id and display name, in id order
    /// (the `BTreeMap` key order). Used by the `registry list` CLI command.
    pub fn list(&self) -> Vec<(&'static str, &'static str)> {
        self.rules.values().map(|r| (r.base_id(), r.display_name())).collect()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Runs every enabled rule instance, expanding role scopes, normalizing
/// findings, and collecting non-fatal errors.
pub struct RuleEngine<'a> {
    registry: &'a RuleRegistry,
}

impl<'a> RuleEngine<'a> {
    pub fn new(registry: &'a RuleRegistry) -> Self {
        RuleEngine { registry }
    }

    /// Evaluate every enabled rule instance in `config.rules` against
    /// `facts`, returning deduplicated, sorted findings plus collected
    /// engine errors.
    pub fn run(&self, facts: &FactIndex, config: &EngineConfig) -> (Vec<Finding>, Vec<EngineError>) {
        let mut findings = Vec::new();
        let mut errors = Vec::new();

        for def in &config.rules {
            if !def.enabled {
                continue;
            }
            let Some(rule) = self.registry.get(&def.rule_type) else {
                match config.project.validation.unknown_rule {
                    UnknownRulePolicy::Error => {
                        errors.push(EngineError::new(
                            EngineErrorKind::RuleNotFound,
                            format!("no rule implementation registered for '{}'", def.rule_type),
                        ));
                    }
                    UnknownRulePolicy::Warn | UnknownRulePolicy::Ignore => {}
                }
                continue;
            };

            for instance_def in expand_roles(def) {
                let canonical_id = canonical_id(&def.rule_type, &def.name, instance_def.roles.as_deref());
                match rule.evaluate(facts, &instance_def, config) {
                    Ok(raw) => {
                        for mut finding in raw {
                            finding.rule_id = canonical_id.clone();
                            finding.file_path = finding.file_path.replace('\\', "/");
                            if finding.class_fqn.as_deref().unwrap_or("").is_empty() {
                                finding.class_fqn = None;
                            }
                            if in_scope(facts, &finding, instance_def.scope.as_ref()) {
                                findings.push(finding);
                            }
                        }
                    }
                    Err(failure) => {
                        warn!(rule = %canonical_id, "rule evaluation failed");
                        errors.push(failure.into());
                    }
                }
            }
        }

        findings.sort_by(|a, b| a.identity_key().cmp(&b.identity_key()));
        findings.dedup_by(|a, b| a.identity_key() == b.identity_key());
        errors.sort();
        errors.dedup();

        (findings, errors)
    }
}

/// Expand a `RuleDef` into one instance per role (forcing `scope.include_roles`
/// to that single role unless the author already scoped it) or a single
/// unscoped instance when `roles` is unset.
fn expand_roles(def: &RuleDef) -> Vec<RuleDef> {
    match &def.roles {
        None => vec![def.clone()],
        Some(roles) => roles
            .iter()
            .map(|role| {
                let mut instance = def.clone();
                let mut scope = instance.scope.unwrap_or_default();
                if scope.include_roles.is_empty() {
                    scope.include_roles = vec![role.clone()];
                }
                instance.scope = Some(scope);
                instance.roles = Some(vec![role.clone()]);
                instance
            })
            .collect(),
    }
}

fn canonical_id(rule_type: &str, name: &str, roles: Option<&[String]>) -> String {
    match roles {
        Some([role]) => format!("{rule_type}.{name}.{role}"),
        _ => format!("{rule_type}.{name}"),
    }
}

fn in_scope(facts: &FactIndex, finding: &Finding, scope: Option<&RuleScope>) -> bool {
    let Some(scope) = scope else { return true };
    let Ok(compiled) = CompiledScope::compile(scope) else { return true };

    let class_fqn = finding.class_fqn.as_deref().unwrap_or("");
    let role = facts.role_of(class_fqn);
    let package = class_fqn.rfind('.').map(|i| &class_fqn[..i]).unwrap_or("");
    compiled.contains(role, package, &finding.file_path)
}
