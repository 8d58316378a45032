use regex::Regex;

use crate::api::config::MatcherSpec;
use crate::api::error::{EngineError, EngineErrorKind};

/// A pre-compiled matcher tree: regexes are compiled once at classifier
/// construction, never at classification time.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// True if any child matches (short-circuits on first match).
    AnyOf(Vec<Matcher>),
    /// True if every child matches (short-circuits on first mismatch).
    AllOf(Vec<Matcher>),
    /// True if the child does not match.
    Not(Box<Matcher>),
    /// Exact annotation fq-name membership.
    Annotation(String),
    /// Any annotation fq-name starting with this prefix.
    AnnotationPrefix(String),
    /// Compiled regex matched anywhere in the package name.
    PackageRegex(Regex),
    /// Dot-delimited package segment equality.
    PackageContainsSegment(String),
    /// Simple name suffix match.
    ClassNameEndsWith(String),
}

impl Matcher {
    /// Compile an authored [`MatcherSpec`] tree into its evaluable form.
    pub fn compile(spec: &MatcherSpec) -> Result<Matcher, EngineError> {
        Ok(match spec {
            MatcherSpec::AnyOf { children } => {
                Matcher::AnyOf(children.iter().map(Matcher::compile).collect::<Result<_, _>>()?)
            }
            MatcherSpec::AllOf { children } => {
                Matcher::AllOf(children.iter().map(Matcher::compile).collect::<Result<_, _>>()?)
            }
            MatcherSpec::Not { child } => Matcher::Not(Box::new(Matcher::compile(child)?)),
            MatcherSpec::Annotation { fqn } => Matcher::Annotation(fqn.clone()),
            MatcherSpec::AnnotationPrefix { prefix } => Matcher::AnnotationPrefix(prefix.clone()),
            MatcherSpec::PackageRegex { pattern } => {
                let re = Regex::new(pattern).map_err(|e| {
                    EngineError::new(
                        EngineErrorKind::RoleClassificationFailed,
                        format!("invalid packageRegex '{pattern}': {e}"),
                    )
                })?;
                Matcher::PackageRegex(re)
            }
            MatcherSpec::PackageContainsSegment { segment } => {
                Matcher::PackageContainsSegment(segment.clone())
            }
            MatcherSpec::ClassNameEndsWith { suffix } => Matcher::ClassNameEndsWith(suffix.clone()),
        })
    }

    /// Evaluate this matcher against a class fact.
    pub fn matches(&self, fact: &crate::api::types::ClassFact) -> bool {
        match self {
            Matcher::AnyOf(children) => children.iter().any(|c| c.matches(fact)),
            Matcher::AllOf(children) => children.iter().all(|c| c.matches(fact)),
            Matcher::Not(child) => !child.matches(fact),
            Matcher::Annotation(fqn) => fact.annotation_fqns.iter().any(|a| a == fqn),
            Matcher::AnnotationPrefix(prefix) => {
                fact.annotation_fqns.iter().any(|a| a.starts_with(prefix.as_str()))
            }
            Matcher::PackageRegex(re) => re.is_match(&fact.package_name),
            Matcher::PackageContainsSegment(seg) => {
                fact.package_name.split('.').any(|part| part == seg)
            }
            Matcher::ClassNameEndsWith(suffix) => fact.simple_name.ends_with(suffix.as_str()),
        }
    }
}

/// A compiled `RuleScope`: regexes pre-compiled, role sets pre-collected.
#[derive(Debug, Clone, Default)]
pub struct CompiledScope {
    /// Roles allowed; empty means all roles are allowed.
    pub include_roles: std::collections::BTreeSet<String>,
    /// Roles always excluded.
    pub exclude_roles: std::collections::BTreeSet<String>,
    /// Package regexes; empty means all packages are allowed.
    pub include_packages: Vec<Regex>,
    /// Package regexes that exclude an otherwise-included class.
    pub exclude_packages: Vec<Regex>,
    /// Path globs; empty means all paths are allowed.
    pub include_globs: Vec<String>,
    /// Path globs that exclude an otherwise-included path.
    pub exclude_globs: Vec<String>,
}

impl CompiledScope {
    /// Compile an authored [`crate::api::config::RuleScope`].
    pub fn compile(scope: &crate::api::config::RuleScope) -> Result<CompiledScope, EngineError> {
        let compile_all = |patterns: &[String]| -> Result<Vec<Regex>, EngineError> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        EngineError::new(EngineErrorKind::RuleParamError, format!("invalid regex '{p}': {e}"))
                    })
                })
                .collect()
        };
        Ok(CompiledScope {
            include_roles: scope.include_roles.iter().cloned().collect(),
            exclude_roles: scope.exclude_roles.iter().cloned().collect(),
            include_packages: compile_all(&scope.include_packages)?,
            exclude_packages: compile_all(&scope.exclude_packages)?,
            include_globs: scope.include_globs.clone(),
            exclude_globs: scope.exclude_globs.clone(),
        })
    }

    /// Whether a class at `package` / `normalized_path`, classified as `role`
    /// (if any), is in scope.
    pub fn contains(&self, role: Option<&str>, package: &str, normalized_path: &str) -> bool {
        if let Some(r) = role {
            if self.exclude_roles.contains(r) {
                return false;
            }
            if !self.include_roles.is_empty() && !self.include_roles.contains(r) {
                return false;
            }
        } else if !self.include_roles.is_empty() {
            return false;
        }

        if self.exclude_packages.iter().any(|re| re.is_match(package)) {
            return false;
        }
        if !self.include_packages.is_empty() && !self.include_packages.iter().any(|re| re.is_match(package)) {
            return false;
        }

        if self.exclude_globs.iter().any(|g| crate::core::scanner::glob_matches(g, normalized_path)) {
            return false;
        }
        if !self.include_globs.is_empty()
            && !self.include_globs.iter().any(|g| crate::core::scanner::glob_matches(g, normalized_path))
        {
            return false;
        }

        true
    }
}
