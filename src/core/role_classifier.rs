//! Assigns each project class to at most one architectural role by
//! evaluating compiled [`Matcher`] trees in priority order.

use std::collections::{BTreeMap, BTreeSet};

use crate::api::config::RoleDef;
use crate::api::error::EngineError;
use crate::api::types::ClassFact;
use crate::spi::types::Matcher;

/// One compiled role, ready for classification.
struct CompiledRole {
    id: String,
    priority: i32,
    matcher: Matcher,
}

/// Compiled role set: roles ordered by priority descending, id ascending on
/// ties, matching the order they're tried in during classification.
pub struct RoleClassifier {
    roles: Vec<CompiledRole>,
}

impl RoleClassifier {
    /// Compile every configured role definition.
    pub fn compile(roles: &BTreeMap<String, RoleDef>) -> Result<RoleClassifier, EngineError> {
        let mut compiled = Vec::with_capacity(roles.len());
        for (id, def) in roles {
            let matcher = Matcher::compile(&def.matcher)?;
            compiled.push(CompiledRole { id: id.clone(), priority: def.priority, matcher });
        }
        compiled.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(RoleClassifier { roles: compiled })
    }

    /// Classify every class in `classes` (already fq-name sorted), first
    /// matching role wins. Unmatched classes are omitted from both maps.
    pub fn classify<'a, I>(&self, classes: I) -> (BTreeMap<String, BTreeSet<String>>, BTreeMap<String, String>)
    where
        I: IntoIterator<Item = &'a ClassFact>,
    {
        let mut role_to_classes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut class_to_role: BTreeMap<String, String> = BTreeMap::new();

        for fact in classes {
            if let Some(role) = self.roles.iter().find(|r| r.matcher.matches(fact)) {
                role_to_classes.entry(role.id.clone()).or_default().insert(fact.fq_name.clone());
                class_to_role.insert(fact.fq_name.clone(), role.id.clone());
            }
        }

        (role_to_classes, class_to_role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config::MatcherSpec;
    use crate::api::types::{OriginKind, SourceLocation, Visibility};

    fn fact(fq_name: &str, annotations: Vec<&str>) -> ClassFact {
        ClassFact {
            fq_name: fq_name.to_string(),
            package_name: fq_name.rsplit_once('.').map(|(p, _)| p.to_string()).unwrap_or_default(),
            simple_name: fq_name.rsplit_once('.').map(|(_, s)| s.to_string()).unwrap_or_else(|| fq_name.to_string()),
            visibility: Visibility::Public,
            is_interface: false,
            is_abstract: false,
            is_enum: false,
            has_main_method: false,
            annotation_fqns: annotations.into_iter().map(String::from).collect(),
            super_fqn: Some("java.lang.Object".to_string()),
            interface_fqns: vec![],
            method_count: 0,
            field_count: 0,
            class_file_version: (52, 0),
            location: SourceLocation {
                origin_kind: OriginKind::DirClass,
                origin_path: "out".to_string(),
                container_path: None,
                entry_path: None,
                source_file: None,
                line: None,
            },
        }
    }

    #[test]
    fn higher_priority_role_wins_and_ties_break_by_id() {
        let mut roles = BTreeMap::new();
        roles.insert(
            "controller".to_string(),
            RoleDef {
                id: "controller".to_string(),
                priority: 10,
                description: None,
                matcher: MatcherSpec::Annotation { fqn: "javax.ws.rs.Path".to_string() },
            },
        );
        roles.insert(
            "service".to_string(),
            RoleDef {
                id: "service".to_string(),
                priority: 5,
                description: None,
                matcher: MatcherSpec::ClassNameEndsWith { suffix: "Service".to_string() },
            },
        );

        let classifier = RoleClassifier::compile(&roles).unwrap();
        let f = fact("com.a.web.UserController", vec!["javax.ws.rs.Path"]);
        let (role_to_classes, class_to_role) = classifier.classify(std::iter::once(&f));

        assert_eq!(class_to_role.get("com.a.web.UserController"), Some(&"controller".to_string()));
        assert_eq!(role_to_classes.get("controller").unwrap().len(), 1);
    }

    #[test]
    fn unmatched_class_is_omitted() {
        let roles = BTreeMap::new();
        let classifier = RoleClassifier::compile(&roles).unwrap();
        let f = fact("com.a.Thing", vec![]);
        let (role_to_classes, class_to_role) = classifier.classify(std::iter::once(&f));
        assert!(role_to_classes.is_empty());
        assert!(class_to_role.is_empty());
    }
}
