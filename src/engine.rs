//! Top-level orchestrator: wires every stage of the pipeline (Scanner,
//! FactExtractor, FactIndex, RoleClassifier, RuleEngine,
//! ExceptionSuppressor, BaselineCoordinator, AnalysisPipeline, Exporter)
//! into a single run.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::api::config::EngineConfig;
use crate::api::error::{EngineError, FatalError};
use crate::api::types::EngineReport;
use crate::core::baseline::BaselineCoordinator;
use crate::core::cancellation::CancellationToken;
use crate::core::exception_suppressor::ExceptionSuppressor;
use crate::core::exporter::{self, ExportMeta};
use crate::core::fact_extractor;
use crate::core::fact_index::{FactIndex, FactIndexBuilder};
use crate::core::role_classifier::RoleClassifier;
use crate::core::rule_registry::{RuleEngine, RuleRegistry};
use crate::core::{analysis, scanner};

const SCHEMA_ID: &str = "shamash-asm.report";
const SCHEMA_VERSION: u32 = 1;

/// The result of running the engine to completion, to cancellation, or to
/// a fatal error.
pub enum EngineOutcome {
    /// The run completed; `report` carries every stage's output, `facts`
    /// the indexed classes/edges (for `--export-facts` and the `facts`
    /// CLI command, which need the index independent of the report).
    Completed { report: EngineReport, facts: FactIndex },
    /// The run was cancelled partway through; `partial` carries whatever
    /// was produced before the cancellation was observed.
    Cancelled { partial: EngineReport, facts: FactIndex },
    /// The run could not continue at all (currently: an unsupported
    /// baseline schema version).
    Fatal(FatalError),
}

/// Owns a validated configuration and rule registry; `run()` executes the
/// full pipeline once.
pub struct Engine {
    config: EngineConfig,
    registry: RuleRegistry,
    cancel: CancellationToken,
}

impl Engine {
    /// Build an engine with the standard (shipped) rule registry.
    pub fn new(config: EngineConfig) -> Self {
        Engine { config, registry: RuleRegistry::standard(), cancel: CancellationToken::new() }
    }

    /// Build an engine with a caller-supplied registry (e.g.
    /// `RuleRegistry::with_extra`).
    pub fn with_registry(config: EngineConfig, registry: RuleRegistry) -> Self {
        Engine { config, registry, cancel: CancellationToken::new() }
    }

    /// A clone of this engine's cancellation token, for a caller to trigger
    /// cancellation from another thread (e.g. a CLI signal handler).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the scan-extract-classify-evaluate-suppress-analyze pipeline to
    /// completion (or to cancellation/fatal error).
    pub fn run(&self) -> EngineOutcome {
        let scan = scanner::scan(&self.config.project.bytecode, &self.config.project.scan, &self.cancel);
        let mut errors: Vec<EngineError> = scan.errors;

        let extracted: Vec<Result<fact_extractor::ExtractedClass, EngineError>> =
            scan.classes.par_iter().map(|c| fact_extractor::extract(&c.bytes, &c.location)).collect();

        let mut builder = FactIndexBuilder::new();
        for result in extracted {
            match result {
                Ok(class) => builder.push(class),
                Err(e) => {
                    warn!(%e, "class extraction failed");
                    errors.push(e);
                }
            }
        }
        errors.extend(std::mem::take(&mut builder.errors));

        let mut facts: FactIndex = builder.build();

        if self.cancel.is_cancelled() {
            let report = self.finish(&facts, Vec::new(), errors, true);
            return EngineOutcome::Cancelled { partial: report, facts };
        }

        match RoleClassifier::compile(&self.config.roles) {
            Ok(classifier) => {
                let (role_to_classes, class_to_role) = classifier.classify(&facts.classes);
                facts.set_roles(role_to_classes, class_to_role);
            }
            Err(e) => errors.push(e),
        }

        let rule_engine = RuleEngine::new(&self.registry);
        let (mut findings, rule_errors) = rule_engine.run(&facts, &self.config);
        errors.extend(rule_errors);

        match ExceptionSuppressor::compile(&self.config.exceptions) {
            Ok(suppressor) => findings.retain(|f| !suppressor.is_suppressed(f)),
            Err(e) => errors.push(e),
        }

        let coordinator = BaselineCoordinator::new(self.config.baseline.clone());
        match coordinator.apply(findings) {
            Ok((survivors, _wrote)) => findings = survivors,
            Err(fatal) => return EngineOutcome::Fatal(fatal),
        }

        if self.cancel.is_cancelled() {
            let report = self.finish(&facts, findings, errors, true);
            return EngineOutcome::Cancelled { partial: report, facts };
        }

        let report = self.finish(&facts, findings, errors, false);
        EngineOutcome::Completed { report, facts }
    }

    fn finish(
        &self,
        facts: &FactIndex,
        findings: Vec<crate::api::types::Finding>,
        mut errors: Vec<EngineError>,
        cancelled: bool,
    ) -> EngineReport {
        let analysis_report = analysis::run(facts, &self.config.analysis, &self.cancel);
        let report = EngineReport { findings, errors: Vec::new(), analysis: analysis_report, cancelled };

        if self.config.export.enabled {
            let project_name = self
                .config
                .project
                .bytecode
                .project_base
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string());
            let millis = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            let meta = ExportMeta {
                schema_id: SCHEMA_ID,
                schema_version: SCHEMA_VERSION,
                tool_name: env!("CARGO_PKG_NAME"),
                tool_version: env!("CARGO_PKG_VERSION"),
                generated_at_epoch_millis: millis,
                project_name: &project_name,
            };
            match exporter::export(&report, facts, &self.config.export, &meta) {
                Ok(export_errors) => errors.extend(export_errors),
                Err(e) => errors.push(e),
            }
        }

        errors.sort();
        errors.dedup();

        info!(findings = report.findings.len(), errors = errors.len(), cancelled, "engine run finished");

        EngineReport { errors, ..report }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
