//! The validated configuration record the engine consumes. Schema validation
//! itself (YAML parsing, semantic checks) is an external collaborator; this
//! module only defines the shape the engine reads, plus convenience parsers
//! for tests and the `init`/`validate` CLI commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::FatalError;

/// Root configuration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `project { bytecode {...}, scan {...}, validation {...} }`.
    pub project: ProjectConfig,
    /// `roles { id -> RoleDef }`.
    #[serde(default)]
    pub roles: BTreeMap<String, RoleDef>,
    /// `analysis { graphs, hotspots, scoring }`.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// `rules: [ RuleDef ]`.
    #[serde(default)]
    pub rules: Vec<RuleDef>,
    /// `exceptions: [ ExceptionDef ]`.
    #[serde(default)]
    pub exceptions: Vec<ExceptionDef>,
    /// `baseline { mode, path }`.
    #[serde(default)]
    pub baseline: BaselineConfig,
    /// `export { enabled, outputDir, formats, overwrite }`.
    #[serde(default)]
    pub export: ExportConfig,
}

impl EngineConfig {
    /// Parse a TOML-encoded configuration document.
    pub fn from_toml_str(s: &str) -> Result<Self, FatalError> {
        toml::from_str(s).map_err(|e| FatalError::Config(e.to_string()))
    }

    /// Parse a JSON-encoded configuration document.
    pub fn from_json_str(s: &str) -> Result<Self, FatalError> {
        serde_json::from_str(s).map_err(|e| FatalError::Config(e.to_string()))
    }
}

/// `project.bytecode` + `project.scan` + `project.validation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Bytecode roots and glob sets.
    pub bytecode: BytecodeConfig,
    /// Scan behavior options.
    #[serde(default)]
    pub scan: ScanOptions,
    /// How to react to an unresolvable rule base id.
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Bytecode discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BytecodeConfig {
    /// Base project path.
    pub project_base: PathBuf,
    /// Directories to scan for class files and jars.
    pub roots: Vec<PathBuf>,
    /// Include/exclude globs for loose `.class` output directories.
    #[serde(default)]
    pub outputs_globs: GlobSetConfig,
    /// Include/exclude globs for jar archives.
    #[serde(default)]
    pub jar_globs: GlobSetConfig,
}

/// A paired include/exclude glob list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobSetConfig {
    /// Patterns that must match for a path to be considered.
    #[serde(default)]
    pub include: Vec<String>,
    /// Patterns that exclude an otherwise-included path.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Scope of sources the scanner should consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanScope {
    /// Only classes under the configured project bytecode roots.
    ProjectOnly,
    /// Every discoverable class, including third-party jars.
    AllSources,
    /// Project classes plus explicitly bucketed external dependencies.
    ProjectWithExternalBuckets,
}

impl Default for ScanScope {
    fn default() -> Self {
        ScanScope::ProjectOnly
    }
}

/// Scanner resource limits and traversal options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Whether to follow symbolic links during directory traversal.
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Hard cap on the number of classes scanned; scanning stops past this.
    #[serde(default = "default_max_classes")]
    pub max_classes: usize,
    /// Archives larger than this (bytes) are skipped.
    #[serde(default = "default_max_jar_bytes")]
    pub max_jar_bytes: u64,
    /// Class entries larger than this (bytes) are skipped.
    #[serde(default = "default_max_class_bytes")]
    pub max_class_bytes: u64,
    /// Which sources are in scope.
    #[serde(default)]
    pub scope: ScanScope,
    /// Bounded worker pool size; `None` uses available parallelism.
    #[serde(default)]
    pub max_workers: Option<usize>,
}

fn default_max_classes() -> usize {
    200_000
}
fn default_max_jar_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_max_class_bytes() -> u64 {
    16 * 1024 * 1024
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            follow_symlinks: false,
            max_classes: default_max_classes(),
            max_jar_bytes: default_max_jar_bytes(),
            max_class_bytes: default_max_class_bytes(),
            scope: ScanScope::default(),
            max_workers: None,
        }
    }
}

/// Policy for a rule referencing an unknown base id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRulePolicy {
    /// Record a fatal-for-the-rule engine error (`RuleNotFound`).
    Error,
    /// Non-fatal; the validation layer (external) is responsible for surfacing it.
    Warn,
    /// Silently skip.
    Ignore,
}

impl Default for UnknownRulePolicy {
    fn default() -> Self {
        UnknownRulePolicy::Error
    }
}

/// `project.validation`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Policy applied when a `RuleDef`'s base id has no implementation.
    #[serde(default)]
    pub unknown_rule: UnknownRulePolicy,
}

/// A single architectural role definition, as authored in `roles { ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDef {
    /// Role id (the map key this is stored under, duplicated here for
    /// convenience once parsed).
    #[serde(default)]
    pub id: String,
    /// Higher priority roles are tried first; ties break by id ascending.
    pub priority: i32,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// The matcher tree deciding membership.
    #[serde(rename = "match")]
    pub matcher: MatcherSpec,
}

/// Uncompiled matcher tree, as authored in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MatcherSpec {
    /// True if any child matches.
    AnyOf { children: Vec<MatcherSpec> },
    /// True if every child matches.
    AllOf { children: Vec<MatcherSpec> },
    /// True if the child does not match.
    Not { child: Box<MatcherSpec> },
    /// True if the class carries this exact annotation fq-name.
    Annotation { fqn: String },
    /// True if any class annotation fq-name starts with this prefix.
    AnnotationPrefix { prefix: String },
    /// True if the compiled regex finds a match in the class's package name.
    PackageRegex { pattern: String },
    /// True if any dot-delimited package segment equals this literal.
    PackageContainsSegment { segment: String },
    /// True if the class's simple name ends with this suffix.
    ClassNameEndsWith { suffix: String },
}

/// A rule instance definition, as authored in `rules: [...]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    /// Base id of the rule implementation to resolve, e.g. `arch.forbiddenRoleDependencies`.
    #[serde(rename = "type")]
    pub rule_type: String,
    /// User-facing instance name (kept for display; canonical id uses `rule_type`).
    pub name: String,
    /// Roles this rule instance is expanded over; `None` runs one unscoped instance.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    /// Whether this rule instance runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Severity assigned to every finding this instance produces.
    pub severity: crate::api::types::Severity,
    /// Optional scope restricting which classes/paths this instance applies to.
    #[serde(default)]
    pub scope: Option<RuleScope>,
    /// Opaque, rule-specific parameters.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

fn default_true() -> bool {
    true
}

/// `RuleDef.scope`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleScope {
    /// Only classes assigned one of these roles are in scope (empty = all).
    #[serde(default)]
    pub include_roles: Vec<String>,
    /// Classes assigned one of these roles are never in scope.
    #[serde(default)]
    pub exclude_roles: Vec<String>,
    /// Only packages matching one of these regexes are in scope (empty = all).
    #[serde(default)]
    pub include_packages: Vec<String>,
    /// Packages matching one of these regexes are never in scope.
    #[serde(default)]
    pub exclude_packages: Vec<String>,
    /// Only source paths matching one of these globs are in scope (empty = all).
    #[serde(default)]
    pub include_globs: Vec<String>,
    /// Source paths matching one of these globs are never in scope.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

/// A single exception (suppression) definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionDef {
    /// Identifier for this exception, used only for reporting/debugging.
    pub id: String,
    /// Whether this exception is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Human-readable justification.
    #[serde(default)]
    pub reason: Option<String>,
    /// The match criteria; a finding is suppressed when every populated field matches.
    #[serde(rename = "match")]
    pub matcher: ExceptionMatch,
}

/// Populated fields are AND-ed together; unset fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExceptionMatch {
    /// Exact canonical rule id.
    #[serde(default)]
    pub rule_id: Option<String>,
    /// Rule type prefix (first canonical segment), used only when `rule_id` is unset.
    #[serde(default)]
    pub rule_type: Option<String>,
    /// Rule name prefix (second canonical segment), used only when `rule_id` is unset.
    #[serde(default)]
    pub rule_name: Option<String>,
    /// Role set matched against the finding's third canonical segment.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    /// Exact internal (slash) class name.
    #[serde(default)]
    pub class_internal_name: Option<String>,
    /// Regex matched against the finding's class fq-name.
    #[serde(default)]
    pub class_name_regex: Option<String>,
    /// Regex matched against the finding's package name.
    #[serde(default)]
    pub package_regex: Option<String>,
    /// Regex matched against the finding's origin path.
    #[serde(default)]
    pub origin_path_regex: Option<String>,
    /// Glob matched against the finding's file path.
    #[serde(default)]
    pub glob: Option<String>,
}

/// Baseline coordinator mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMode {
    /// No baseline suppression.
    None,
    /// Write a new baseline from the current findings.
    Generate,
    /// Suppress findings whose fingerprint is already in the baseline.
    Verify,
}

impl Default for BaselineMode {
    fn default() -> Self {
        BaselineMode::None
    }
}

/// `baseline { mode, path }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Coordinator mode.
    #[serde(default)]
    pub mode: BaselineMode,
    /// Path to the baseline file.
    #[serde(default = "default_baseline_path")]
    pub path: PathBuf,
    /// On `Generate`, union with the baseline's existing fingerprints instead of replacing them.
    #[serde(default)]
    pub merge: bool,
}

fn default_baseline_path() -> PathBuf {
    PathBuf::from("baseline.json")
}

impl Default for BaselineConfig {
    fn default() -> Self {
        BaselineConfig { mode: BaselineMode::default(), path: default_baseline_path(), merge: false }
    }
}

/// Report/facts export format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    /// `report.json`.
    Json,
    /// `report.sarif`.
    Sarif,
    /// `report.xml`.
    Xml,
    /// `report.html`.
    Html,
    /// `facts.jsonl.gz` or `facts.json`, depending on `FactsFormat`.
    Facts,
}

/// `export { enabled, outputDir, formats, overwrite }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Whether exporting runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// Output directory; defaults to `.shamash/`.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Which formats to emit.
    #[serde(default)]
    pub formats: Vec<ExportFormat>,
    /// Whether to overwrite pre-existing artifacts.
    #[serde(default)]
    pub overwrite: bool,
    /// Facts record stream encoding.
    #[serde(default)]
    pub facts_format: FactsFormat,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".shamash")
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            enabled: false,
            output_dir: default_output_dir(),
            formats: Vec::new(),
            overwrite: false,
            facts_format: FactsFormat::default(),
        }
    }
}

/// Encoding used for the FACTS export stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactsFormat {
    /// One gzip-compressed JSON record per line.
    JsonlGz,
    /// A single JSON document containing every record.
    Json,
}

impl Default for FactsFormat {
    fn default() -> Self {
        FactsFormat::JsonlGz
    }
}

/// `analysis { graphs, hotspots, scoring }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Graph snapshot settings; `None` disables graph analysis.
    #[serde(default)]
    pub graphs: Option<GraphAnalysisConfig>,
    /// Hotspot ranking settings; `None` disables hotspot analysis.
    #[serde(default)]
    pub hotspots: Option<HotspotConfig>,
    /// Scoring model settings; `None` disables scoring.
    #[serde(default)]
    pub scoring: Option<ScoringConfig>,
}

/// Node granularity shared by graph-oriented rules and analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One node per class.
    Class,
    /// One node per package.
    Package,
    /// One node per top-level package segment ("module").
    Module,
}

/// `analysis.graphs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphAnalysisConfig {
    /// Granularities to build a snapshot for.
    pub granularities: Vec<Granularity>,
    /// Whether off-project edges are rewritten to `__external__:<package>` buckets.
    #[serde(default)]
    pub include_external: bool,
    /// Bound on the number of representative cycles sampled per snapshot.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,
    /// Bound on the number of nodes in a single sampled cycle.
    #[serde(default = "default_max_cycle_nodes")]
    pub max_cycle_nodes: usize,
}

fn default_max_cycles() -> usize {
    50
}
fn default_max_cycle_nodes() -> usize {
    120
}

/// Metric a hotspot ranking is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HotspotMetric {
    /// Incoming edge count.
    FanIn,
    /// Outgoing edge count.
    FanOut,
    /// Distinct package count touched by a package's dependencies.
    PackageSpread,
    /// Declared method count.
    MethodCount,
}

/// `analysis.hotspots`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotConfig {
    /// Metrics to rank.
    pub metrics: Vec<HotspotMetric>,
    /// How many top entries to keep per metric per granularity.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    10
}

/// `analysis.scoring`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Per-class god-score component weights.
    #[serde(default)]
    pub god_score_weights: GodScoreWeights,
    /// Per-package overall-score component weights.
    #[serde(default)]
    pub package_score_weights: PackageScoreWeights,
    /// Score at/above which a band is `WARN`.
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: f64,
    /// Score at/above which a band is `ERROR`.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,
}

fn default_warn_threshold() -> f64 {
    0.70
}
fn default_error_threshold() -> f64 {
    0.85
}

/// Weights for the per-class "god score" (model V1). Must not be assumed to
/// sum to 1; callers normalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GodScoreWeights {
    /// Weight of normalized method count.
    pub method_count: f64,
    /// Weight of normalized field count.
    pub field_count: f64,
    /// Weight of normalized fan-out.
    pub fan_out: f64,
    /// Weight of normalized fan-in.
    pub fan_in: f64,
    /// Weight of normalized package spread.
    pub package_spread: f64,
}

impl Default for GodScoreWeights {
    fn default() -> Self {
        GodScoreWeights { method_count: 0.35, field_count: 0.10, fan_out: 0.30, fan_in: 0.15, package_spread: 0.10 }
    }
}

/// Weights for the per-package "overall score" (model V1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageScoreWeights {
    /// Weight of cyclic-SCC presence.
    pub cycles: f64,
    /// Weight of dependency density.
    pub dependency_density: f64,
    /// Weight of layering violations (reserved, zero in V1).
    pub layering_violations: f64,
    /// Weight of mean god-score across the package's classes.
    pub god_class_prevalence: f64,
    /// Weight of the fraction of out-edges targeting external buckets.
    pub external_coupling: f64,
}

impl Default for PackageScoreWeights {
    fn default() -> Self {
        PackageScoreWeights {
            cycles: 0.30,
            dependency_density: 0.20,
            layering_violations: 0.25,
            god_class_prevalence: 0.15,
            external_coupling: 0.10,
        }
    }
}
