//! XML report export. Schema mirrors the JSON export's fields and stable
//! attribute order; emitted via `quick_xml::Writer` rather than
//! hand-interpolated strings, to guarantee well-formed escaping.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use quick_xml::events::BytesText;
use quick_xml::writer::Writer;
use quick_xml::Error as XmlError;

use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::{EngineReport, Finding};
use crate::core::exporter::ExportMeta;

fn write_finding(writer: &mut Writer<BufWriter<File>>, finding: &Finding) -> Result<(), XmlError> {
    let severity = finding.severity.to_string();
    let start_offset = finding.start_offset.map(|o| o.to_string()).unwrap_or_default();
    let end_offset = finding.end_offset.map(|o| o.to_string()).unwrap_or_default();

    writer
        .create_element("finding")
        .with_attribute(("ruleId", finding.rule_id.as_str()))
        .with_attribute(("severity", severity.as_str()))
        .with_attribute(("filePath", finding.file_path.as_str()))
        .with_attribute(("classFqn", finding.class_fqn.as_deref().unwrap_or("")))
        .with_attribute(("memberName", finding.member_name.as_deref().unwrap_or("")))
        .with_attribute(("startOffset", start_offset.as_str()))
        .with_attribute(("endOffset", end_offset.as_str()))
        .write_inner_content(|w| {
            w.create_element("message").write_text_content(BytesText::new(&finding.message))?;
            w.create_element("data").write_inner_content(|w| {
                for (key, value) in &finding.data {
                    w.create_element("entry").with_attribute(("key", key.as_str())).write_text_content(BytesText::new(value))?;
                }
                Ok(())
            })?;
            Ok(())
        })?;
    Ok(())
}

pub fn write(path: &Path, report: &EngineReport, meta: &ExportMeta) -> Result<(), EngineError> {
    let file = File::create(path).map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))?;
    write_inner(file, report, meta).map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))
}

fn write_inner(file: File, report: &EngineReport, meta: &ExportMeta) -> Result<(), XmlError> {
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);

    let schema_version = meta.schema_version.to_string();
    let generated_at = meta.generated_at_epoch_millis.to_string();

    writer
        .create_element("report")
        .with_attribute(("schemaId", meta.schema_id))
        .with_attribute(("schemaVersion", schema_version.as_str()))
        .with_attribute(("toolName", meta.tool_name))
        .with_attribute(("toolVersion", meta.tool_version))
        .with_attribute(("generatedAtEpochMillis", generated_at.as_str()))
        .with_attribute(("projectName", meta.project_name))
        .write_inner_content(|w| {
            w.create_element("findings").write_inner_content(|w| {
                for finding in &report.findings {
                    write_finding(w, finding)?;
                }
                Ok(())
            })?;
            Ok(())
        })?;

    Ok(())
}
