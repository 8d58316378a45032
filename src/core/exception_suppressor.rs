//! Suppresses findings matching a configured exception: every populated
//! field of an [`ExceptionMatch`] must match (AND), unset fields are
//! ignored.

use regex::Regex;

use crate::api::config::{ExceptionDef, ExceptionMatch};
use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::Finding;

struct CompiledException {
    id: String,
    matcher: ExceptionMatch,
    class_name_regex: Option<Regex>,
    package_regex: Option<Regex>,
    origin_path_regex: Option<Regex>,
}

/// A compiled, enabled-only exception set.
pub struct ExceptionSuppressor {
    exceptions: Vec<CompiledException>,
}

impl ExceptionSuppressor {
    /// Compile every enabled exception definition.
    pub fn compile(defs: &[ExceptionDef]) -> Result<ExceptionSuppressor, EngineError> {
        let mut exceptions = Vec::new();
        for def in defs {
            if !def.enabled {
                continue;
            }
            let compile_opt = |pattern: &Option<String>| -> Result<Option<Regex>, EngineError> {
                pattern
                    .as_ref()
                    .map(|p| {
                        Regex::new(p).map_err(|e| {
                            EngineError::new(EngineErrorKind::RoleClassificationFailed, format!("invalid exception regex '{p}': {e}"))
                        })
                    })
                    .transpose()
            };
            exceptions.push(CompiledException {
                id: def.id.clone(),
                class_name_regex: compile_opt(&def.matcher.class_name_regex)?,
                package_regex: compile_opt(&def.matcher.package_regex)?,
                origin_path_regex: compile_opt(&def.matcher.origin_path_regex)?,
                matcher: def.matcher.clone(),
            });
        }
        Ok(ExceptionSuppressor { exceptions })
    }

    /// Whether `finding` is suppressed by any compiled exception, and if so,
    /// which exception id.
    pub fn suppressing_exception(&self, finding: &Finding) -> Option<&str> {
        self.exceptions.iter().find(|e| matches(e, finding)).map(|e| e.id.as_str())
    }

    pub fn is_suppressed(&self, finding: &Finding) -> bool {
        self.suppressing_exception(finding).is_some()
    }
}

fn matches(exception: &CompiledException, finding: &Finding) -> bool {
    let m = &exception.matcher;
    let mut touched = false;

    if let Some(rule_id) = &m.rule_id {
        touched = true;
        if rule_id != &finding.rule_id {
            return false;
        }
    } else {
        let mut parts = finding.rule_id.splitn(3, '.');
        let rule_type = parts.next();
        let rule_name = parts.next();
        if let Some(t) = &m.rule_type {
            touched = true;
            if rule_type != Some(t.as_str()) {
                return false;
            }
        }
        if let Some(n) = &m.rule_name {
            touched = true;
            if rule_name != Some(n.as_str()) {
                return false;
            }
        }
    }

    if let Some(roles) = &m.roles {
        touched = true;
        match finding.scoped_role() {
            Some(role) if roles.iter().any(|r| r == role) => {}
            _ => return false,
        }
    }

    if let Some(internal) = &m.class_internal_name {
        touched = true;
        let fqn_as_internal = finding.class_fqn.as_deref().map(|f| f.replace('.', "/"));
        if fqn_as_internal.as_deref() != Some(internal.as_str()) {
            return false;
        }
    }

    if let Some(re) = &exception.class_name_regex {
        touched = true;
        match &finding.class_fqn {
            Some(fqn) if re.is_match(fqn) => {}
            _ => return false,
        }
    }

    if let Some(re) = &exception.package_regex {
        touched = true;
        let package = finding.class_fqn.as_deref().and_then(|f| f.rfind('.').map(|i| &f[..i])).unwrap_or("");
        if !re.is_match(package) {
            return false;
        }
    }

    if let Some(re) = &exception.origin_path_regex {
        touched = true;
        if !re.is_match(&finding.file_path) {
            return false;
        }
    }

    if let Some(glob) = &m.glob {
        touched = true;
        if !crate::core::scanner::glob_matches(glob, &finding.file_path) {
            return false;
        }
    }

    // An exception with no populated fields matches nothing (it would
    // otherwise vacuously suppress every finding).
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Severity;
    use std::collections::BTreeMap;

    fn finding(rule_id: &str, class_fqn: &str, file_path: &str) -> Finding {
        Finding {
            rule_id: rule_id.to_string(),
            message: "violation".to_string(),
            file_path: file_path.to_string(),
            severity: Severity::Error,
            class_fqn: Some(class_fqn.to_string()),
            member_name: None,
            start_offset: None,
            end_offset: None,
            data: BTreeMap::new(),
        }
    }

    #[test]
    fn exact_rule_id_match_suppresses() {
        let defs = vec![ExceptionDef {
            id: "legacy".to_string(),
            enabled: true,
            reason: None,
            matcher: ExceptionMatch { rule_id: Some("arch.forbiddenRoleDependencies".to_string()), ..Default::default() },
        }];
        let suppressor = ExceptionSuppressor::compile(&defs).unwrap();
        let f = finding("arch.forbiddenRoleDependencies", "com.a.Foo", "a/Foo.class");
        assert!(suppressor.is_suppressed(&f));
    }

    #[test]
    fn empty_matcher_suppresses_nothing() {
        let defs = vec![ExceptionDef {
            id: "noop".to_string(),
            enabled: true,
            reason: None,
            matcher: ExceptionMatch::default(),
        }];
        let suppressor = ExceptionSuppressor::compile(&defs).unwrap();
        let f = finding("arch.forbiddenRoleDependencies", "com.a.Foo", "a/Foo.class");
        assert!(!suppressor.is_suppressed(&f));
    }

    #[test]
    fn disabled_exception_is_not_compiled() {
        let defs = vec![ExceptionDef {
            id: "legacy".to_string(),
            enabled: false,
            reason: None,
            matcher: ExceptionMatch { rule_id: Some("arch.forbiddenRoleDependencies".to_string()), ..Default::default() },
        }];
        let suppressor = ExceptionSuppressor::compile(&defs).unwrap();
        let f = finding("arch.forbiddenRoleDependencies", "com.a.Foo", "a/Foo.class");
        assert!(!suppressor.is_suppressed(&f));
    }
}
