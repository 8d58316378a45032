//! Renders an [`EngineReport`] / [`FactIndex`] to the configured output
//! directory in one or more formats.

pub mod facts;
pub mod html;
pub mod json;
pub mod sarif;
pub mod xml;

use std::fs;
use std::path::Path;

use crate::api::config::{ExportConfig, ExportFormat};
use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::EngineReport;
use crate::core::fact_index::FactIndex;

/// Metadata stamped into every export format (JSON report header, SARIF
/// driver, FACTS META record).
pub struct ExportMeta<'a> {
    pub schema_id: &'a str,
    pub schema_version: u32,
    pub tool_name: &'a str,
    pub tool_version: &'a str,
    pub generated_at_epoch_millis: u64,
    pub project_name: &'a str,
}

/// Write every configured format to `config.output_dir`. When `overwrite`
/// is false and any requested artifact already exists, no export occurs at
/// all (all-or-nothing).
pub fn export(
    report: &EngineReport,
    facts: &FactIndex,
    config: &ExportConfig,
    meta: &ExportMeta,
) -> Result<Vec<EngineError>, EngineError> {
    if !config.enabled || config.formats.is_empty() {
        return Ok(Vec::new());
    }

    let paths: Vec<std::path::PathBuf> = config.formats.iter().map(|f| artifact_path(&config.output_dir, *f, config)).collect();
    if !config.overwrite {
        if let Some(existing) = paths.iter().find(|p| p.exists()) {
            return Err(EngineError::with_path(
                EngineErrorKind::ExportFailed,
                "export artifact already exists and overwrite is disabled",
                existing.display().to_string(),
            ));
        }
    }

    fs::create_dir_all(&config.output_dir)
        .map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, format!("cannot create output dir: {e}")))?;

    let mut errors = Vec::new();
    for format in &config.formats {
        let path = artifact_path(&config.output_dir, *format, config);
        let result = match format {
            ExportFormat::Json => json::write(&path, report, meta),
            ExportFormat::Sarif => sarif::write(&path, report, meta),
            ExportFormat::Xml => xml::write(&path, report, meta),
            ExportFormat::Html => html::write(&path, report, meta),
            ExportFormat::Facts => facts::write(&path, facts, config.facts_format, meta),
        };
        if let Err(e) = result {
            errors.push(e);
        }
    }
    Ok(errors)
}

fn artifact_path(dir: &Path, format: ExportFormat, config: &ExportConfig) -> std::path::PathBuf {
    match format {
        ExportFormat::Json => dir.join("report.json"),
        ExportFormat::Sarif => dir.join("report.sarif"),
        ExportFormat::Xml => dir.join("report.xml"),
        ExportFormat::Html => dir.join("report.html"),
        ExportFormat::Facts => match config.facts_format {
            crate::api::config::FactsFormat::JsonlGz => dir.join("facts.jsonl.gz"),
            crate::api::config::FactsFormat::Json => dir.join("facts.json"),
        },
    }
}
