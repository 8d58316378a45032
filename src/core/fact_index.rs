//! The read-only, canonically-ordered store every downstream stage (role
//! classifier, rule engine, graph analysis, exporter) reads from. Built once
//! per run by [`FactIndexBuilder`] out of per-worker partial scan results.

use std::collections::{BTreeMap, BTreeSet};

use crate::api::error::EngineError;
use crate::api::types::{ClassFact, DependencyEdge, FieldRef, MethodRef};
use crate::core::fact_extractor::ExtractedClass;

/// Immutable, canonically-sorted snapshot of every fact extracted this run.
#[derive(Debug, Clone, Default)]
pub struct FactIndex {
    /// Classes, sorted by fully-qualified name.
    pub classes: Vec<ClassFact>,
    /// `fq_name -> index into classes`, first occurrence wins.
    by_fqn: BTreeMap<String, usize>,
    /// Methods, grouped implicitly by iteration order of `classes`.
    pub methods: Vec<MethodRef>,
    /// Fields, grouped implicitly by iteration order of `classes`.
    pub fields: Vec<FieldRef>,
    /// Dependency edges with both endpoints resolving to a project class.
    pub edges: Vec<DependencyEdge>,
    /// `role -> sorted set of class fq-names` (populated by the role classifier).
    pub role_to_classes: BTreeMap<String, BTreeSet<String>>,
    /// `class fq-name -> role`, the inverse of `role_to_classes`.
    pub class_to_role: BTreeMap<String, String>,
}

impl FactIndex {
    /// Look up a class by fully-qualified name.
    pub fn class(&self, fq_name: &str) -> Option<&ClassFact> {
        self.by_fqn.get(fq_name).map(|&i| &self.classes[i])
    }

    /// Whether `fq_name` is a project class (i.e. was scanned this run).
    pub fn contains_class(&self, fq_name: &str) -> bool {
        self.by_fqn.contains_key(fq_name)
    }

    /// The role assigned to a class, if classified and in-project.
    pub fn role_of(&self, fq_name: &str) -> Option<&str> {
        self.class_to_role.get(fq_name).map(|s| s.as_str())
    }

    /// All classes belonging to `role`, in fq-name order.
    pub fn classes_in_role<'a>(&'a self, role: &str) -> impl Iterator<Item = &'a ClassFact> + 'a {
        self.role_to_classes
            .get(role)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(move |fqn| self.class(fqn))
    }

    /// Install the role classifier's output. Called exactly once per run,
    /// after classification, before rule evaluation.
    pub fn set_roles(&mut self, role_to_classes: BTreeMap<String, BTreeSet<String>>, class_to_role: BTreeMap<String, String>) {
        self.role_to_classes = role_to_classes;
        self.class_to_role = class_to_role;
    }
}

/// Accumulates per-worker partial results during scanning/extraction, then
/// collapses them into one canonically-ordered [`FactIndex`].
#[derive(Default)]
pub struct FactIndexBuilder {
    classes: Vec<ClassFact>,
    methods: Vec<MethodRef>,
    fields: Vec<FieldRef>,
    edges: Vec<DependencyEdge>,
    pub errors: Vec<EngineError>,
}

impl FactIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one extracted class's facts into this builder. Not
    /// thread-safe; callers partition work across threads and merge
    /// (`extend`) each partial builder once back on a single thread.
    pub fn push(&mut self, extracted: ExtractedClass) {
        self.classes.push(extracted.fact);
        self.methods.extend(extracted.methods);
        self.fields.extend(extracted.fields);
        self.edges.extend(extracted.edges);
    }

    /// Absorb another (e.g. per-worker) builder's contents.
    pub fn extend(&mut self, other: FactIndexBuilder) {
        self.classes.extend(other.classes);
        self.methods.extend(other.methods);
        self.fields.extend(other.fields);
        self.edges.extend(other.edges);
        self.errors.extend(other.errors);
    }

    /// Finalize into a read-only, canonically-ordered [`FactIndex`].
    ///
    /// Classes are sorted by fq-name; if the same fq-name was scanned more
    /// than once (e.g. shadowed across roots), the first occurrence in
    /// pre-sort (discovery) order wins, and later duplicates are dropped.
    /// Edges whose `to` endpoint does not resolve to a scanned project class
    /// are dropped: the fact index only links project-internal dependencies.
    pub fn build(mut self) -> FactIndex {
        // Stable sort preserves first-discovered order among equal keys.
        self.classes.sort_by(|a, b| a.fq_name.cmp(&b.fq_name));

        let mut by_fqn = BTreeMap::new();
        let mut kept_classes = Vec::with_capacity(self.classes.len());
        let mut project_fqns: BTreeSet<String> = BTreeSet::new();
        for fact in self.classes {
            if by_fqn.contains_key(&fact.fq_name) {
                continue;
            }
            project_fqns.insert(fact.fq_name.clone());
            by_fqn.insert(fact.fq_name.clone(), kept_classes.len());
            kept_classes.push(fact);
        }

        self.methods.sort_by(|a, b| (&a.owner_fqn, &a.name, &a.descriptor).cmp(&(&b.owner_fqn, &b.name, &b.descriptor)));
        self.fields.sort_by(|a, b| (&a.owner_fqn, &a.name).cmp(&(&b.owner_fqn, &b.name)));

        self.edges.retain(|e| project_fqns.contains(&e.to.fq_name));
        self.edges.sort_by(|a, b| {
            (&a.from.fq_name, &a.to.fq_name, a.kind, &a.detail).cmp(&(&b.from.fq_name, &b.to.fq_name, b.kind, &b.detail))
        });
        self.edges.dedup();

        FactIndex {
            classes: kept_classes,
            by_fqn,
            methods: self.methods,
            fields: self.fields,
            edges: self.edges,
            role_to_classes: BTreeMap::new(),
            class_to_role: BTreeMap::new(),
        }
    }
}
