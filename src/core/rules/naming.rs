//! Naming convention checks.

use std::collections::BTreeMap;

use crate::api::config::{EngineConfig, RuleDef};
use crate::api::types::Finding;
use crate::core::fact_index::FactIndex;
use crate::core::param_reader::ParamReader;
use crate::spi::traits::{Rule, RuleFailure};

/// `naming.bannedSuffixes`: flags classes whose simple name ends with one
/// of the configured suffixes (e.g. forbidding a lingering `Impl`/`Helper`
/// naming pattern).
pub struct BannedSuffixes;

impl Rule for BannedSuffixes {
    fn base_id(&self) -> &'static str {
        "naming.bannedSuffixes"
    }

    fn evaluate(&self, facts: &FactIndex, def: &RuleDef, _config: &EngineConfig) -> Result<Vec<Finding>, RuleFailure> {
        let reader = ParamReader::new(self.base_id(), &def.params);
        let suffixes: Vec<&str> = reader.get_str_list("suffixes")?;
        if suffixes.is_empty() {
            return Err(RuleFailure::Param(format!("{}: 'suffixes' must be non-empty", self.base_id())));
        }

        let findings = facts
            .classes
            .iter()
            .filter_map(|c| {
                let hit = suffixes.iter().find(|s| c.simple_name.ends_with(*s))?;
                let mut data = BTreeMap::new();
                data.insert("suffix".to_string(), hit.to_string());
                Some(Finding {
                    rule_id: String::new(),
                    message: format!("class name '{}' ends with banned suffix '{hit}'", c.simple_name),
                    file_path: c.location.display_path(),
                    severity: def.severity,
                    class_fqn: Some(c.fq_name.clone()),
                    member_name: None,
                    start_offset: None,
                    end_offset: None,
                    data,
                })
            })
            .collect();
        Ok(findings)
    }
}
