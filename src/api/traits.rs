use crate::api::error::FatalError;
use crate::api::types::EngineReport;

/// Destination for a rendered report (JSON, SARIF, XML, HTML, …).
///
/// A narrow, single-method interface so new destinations (stdout, a file,
/// a message bus) can be added without touching the engine.
pub trait ReportSink {
    /// Write `report` to this sink's destination.
    fn emit(&self, report: &EngineReport) -> Result<(), FatalError>;
}

/// Destination for the streamable facts export (`facts.jsonl.gz` / `facts.json`).
pub trait FactsSink {
    /// Write every fact record for `index` to this sink's destination.
    fn emit(&self, index: &crate::core::fact_index::FactIndex) -> Result<(), FatalError>;
}
