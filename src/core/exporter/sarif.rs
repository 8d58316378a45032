//! SARIF 2.1.0 export: a typed `serde`-derived document, not an ad hoc
//! `serde_json::Value` tree.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::{EngineReport, Finding, Severity};
use crate::core::exporter::ExportMeta;

const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

#[derive(Serialize)]
struct SarifLog<'a> {
    #[serde(rename = "$schema")]
    schema: &'a str,
    version: &'a str,
    runs: Vec<SarifRun<'a>>,
}

#[derive(Serialize)]
struct SarifRun<'a> {
    tool: SarifTool<'a>,
    results: Vec<SarifResult<'a>>,
}

#[derive(Serialize)]
struct SarifTool<'a> {
    driver: SarifDriver<'a>,
}

#[derive(Serialize)]
struct SarifDriver<'a> {
    name: &'a str,
    version: &'a str,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
struct SarifRule {
    id: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifText,
}

#[derive(Serialize)]
struct SarifText {
    text: String,
}

#[derive(Serialize)]
struct SarifResult<'a> {
    #[serde(rename = "ruleId")]
    rule_id: &'a str,
    level: &'static str,
    message: SarifText,
    locations: Vec<SarifLocation<'a>>,
}

#[derive(Serialize)]
struct SarifLocation<'a> {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation<'a>,
}

#[derive(Serialize)]
struct SarifPhysicalLocation<'a> {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifactLocation<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<SarifRegion>,
}

#[derive(Serialize)]
struct SarifArtifactLocation<'a> {
    uri: &'a str,
}

#[derive(Serialize)]
struct SarifRegion {
    #[serde(rename = "byteOffset")]
    byte_offset: u32,
    #[serde(rename = "byteLength", skip_serializing_if = "Option::is_none")]
    byte_length: Option<u32>,
}

fn level_of(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

fn region_of(finding: &Finding) -> Option<SarifRegion> {
    let start = finding.start_offset?;
    let length = finding.end_offset.map(|end| end.saturating_sub(start));
    Some(SarifRegion { byte_offset: start, byte_length: length })
}

fn result_of(finding: &Finding) -> SarifResult<'_> {
    SarifResult {
        rule_id: &finding.rule_id,
        level: level_of(finding.severity),
        message: SarifText { text: finding.message.clone() },
        locations: vec![SarifLocation {
            physical_location: SarifPhysicalLocation {
                artifact_location: SarifArtifactLocation { uri: &finding.file_path },
                region: region_of(finding),
            },
        }],
    }
}

pub fn write(path: &Path, report: &EngineReport, meta: &ExportMeta) -> Result<(), EngineError> {
    let mut rule_ids: BTreeSet<&str> = BTreeSet::new();
    for f in &report.findings {
        rule_ids.insert(&f.rule_id);
    }
    let rules = rule_ids
        .into_iter()
        .map(|id| SarifRule { id: id.to_string(), short_description: SarifText { text: id.to_string() } })
        .collect();

    let log = SarifLog {
        schema: SARIF_SCHEMA,
        version: "2.1.0",
        runs: vec![SarifRun {
            tool: SarifTool { driver: SarifDriver { name: meta.tool_name, version: meta.tool_version, rules } },
            results: report.findings.iter().map(result_of).collect(),
        }],
    };

    let file = File::create(path).map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &log).map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))
}
