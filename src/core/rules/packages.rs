//! Role-to-package placement checks.

use std::collections::BTreeMap;

use regex::Regex;

use crate::api::config::{EngineConfig, RuleDef};
use crate::api::types::Finding;
use crate::core::fact_index::FactIndex;
use crate::core::param_reader::ParamReader;
use crate::spi::traits::{Rule, RuleFailure};

/// `packages.rolePlacement`: flags classes assigned the governed role whose
/// package does not match the configured pattern.
pub struct RolePlacement;

impl Rule for RolePlacement {
    fn base_id(&self) -> &'static str {
        "packages.rolePlacement"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        let pattern = reader.get_str("packagePattern")?;
        let regex = Regex::new(pattern)
            .map_err(|e| RuleFailure::Param(format!("{}: invalid packagePattern '{pattern}': {e}", self.base_id())))?;

        let role = def
            .scope
            .as_ref()
            .and_then(|s| s.include_roles.first())
            .cloned()
            .ok_or_else(|| RuleFailure::Param(format!("{}: must be instantiated with a 'roles' list", self.base_id())))?;

        let findings = facts
            .classes_in_role(&role)
            .filter(|c| !regex.is_match(&c.package_name))
            .map(|c| {
                let mut data = BTreeMap::new();
                data.insert("role".to_string(), role.clone());
                data.insert("packagePattern".to_string(), pattern.to_string());
                Finding {
                    rule_id: String::new(),
                    message: format!("class '{}' (role '{role}') is in package '{}', which does not match '{pattern}'", c.fq_name, c.package_name),
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
