//! JSON report export: `{ schemaId, schemaVersion, toolName, toolVersion,
//! generatedAtEpochMillis, projectName, findings[] }`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::{EngineReport, Finding};
use crate::core::exporter::ExportMeta;

#[derive(Serialize)]
struct JsonReport<'a> {
    schema_id: &'a str,
    schema_version: u32,
    tool_name: &'a str,
    tool_version: &'a str,
    generated_at_epoch_millis: u64,
    project_name: &'a str,
    findings: &'a [Finding],
}

pub fn write(path: &Path, report: &EngineReport, meta: &ExportMeta) -> Result<(), EngineError> {
    let doc = JsonReport {
        schema_id: meta.schema_id,
        schema_version: meta.schema_version,
        tool_name: meta.tool_name,
        tool_version: meta.tool_version,
        generated_at_epoch_millis: meta.generated_at_epoch_millis,
        project_name: meta.project_name,
        findings: &report.findings,
    };
    let file = File::create(path).map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &doc).map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))
}
