//! Streamable dependency-graph export: META/CLASS/EDGE records, either one
//! gzipped JSON object per line or a single JSON document.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::api::config::FactsFormat;
use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::{ClassFact, DependencyEdge};
use crate::core::exporter::ExportMeta;
use crate::core::fact_index::FactIndex;

/// One record in the FACTS stream. Unknown record types encountered while
/// reading back a stream must be ignored for forward-compatibility; this
/// exporter never emits anything but these three.
#[derive(Serialize)]
#[serde(tag = "recordType", rename_all = "SCREAMING_SNAKE_CASE")]
enum FactRecord<'a> {
    Meta {
        schema_id: &'a str,
        schema_version: u32,
        tool_name: &'a str,
        tool_version: &'a str,
        generated_at_epoch_millis: u64,
        project_name: &'a str,
    },
    Class {
        #[serde(flatten)]
        fact: &'a ClassFact,
        role: Option<&'a str>,
    },
    Edge {
        #[serde(flatten)]
        edge: &'a DependencyEdge,
    },
}

fn records<'a>(index: &'a FactIndex, meta: &'a ExportMeta) -> Vec<FactRecord<'a>> {
    let mut out = Vec::with_capacity(1 + index.classes.len() + index.edges.len());
    out.push(FactRecord::Meta {
        schema_id: meta.schema_id,
        schema_version: meta.schema_version,
        tool_name: meta.tool_name,
        tool_version: meta.tool_version,
        generated_at_epoch_millis: meta.generated_at_epoch_millis,
        project_name: meta.project_name,
    });
    for fact in &index.classes {
        out.push(FactRecord::Class { fact, role: index.role_of(&fact.fq_name) });
    }
    for edge in &index.edges {
        out.push(FactRecord::Edge { edge });
    }
    out
}

pub fn write(path: &Path, index: &FactIndex, format: FactsFormat, meta: &ExportMeta) -> Result<(), EngineError> {
    let err = |e: std::io::Error| EngineError::new(EngineErrorKind::ExportFailed, e.to_string());
    let records = records(index, meta);

    match format {
        FactsFormat::Json => {
            let file = File::create(path).map_err(err)?;
            serde_json::to_writer_pretty(BufWriter::new(file), &records)
                .map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))
        }
        FactsFormat::JsonlGz => {
            let file = File::create(path).map_err(err)?;
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            for record in &records {
                serde_json::to_writer(&mut encoder, record)
                    .map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))?;
                encoder.write_all(b"\n").map_err(err)?;
            }
            encoder.finish().map_err(err)?;
            Ok(())
        }
    }
}

/// Owned counterpart of [`FactRecord`], used when reading a stream back.
/// Unknown `recordType` values are ignored rather than rejected, for
/// forward-compatibility with future record kinds.
#[derive(Deserialize)]
#[serde(tag = "recordType", rename_all = "SCREAMING_SNAKE_CASE")]
enum OwnedFactRecord {
    Meta {
        schema_id: String,
        schema_version: u32,
        tool_name: String,
        tool_version: String,
        generated_at_epoch_millis: u64,
        project_name: String,
    },
    Class {
        #[serde(flatten)]
        fact: ClassFact,
        role: Option<String>,
    },
    Edge {
        #[serde(flatten)]
        edge: DependencyEdge,
    },
    #[serde(other)]
    Unknown,
}

/// Summary statistics read back from a previously exported facts stream,
/// for the `facts` CLI command.
#[derive(Debug, Clone)]
pub struct FactsSummary {
    pub schema_id: String,
    pub schema_version: u32,
    pub tool_name: String,
    pub tool_version: String,
    pub generated_at_epoch_millis: u64,
    pub project_name: String,
    pub class_count: usize,
    pub edge_count: usize,
    pub roles: BTreeMap<String, usize>,
}

impl Default for FactsSummary {
    fn default() -> Self {
        FactsSummary {
            schema_id: String::new(),
            schema_version: 0,
            tool_name: String::new(),
            tool_version: String::new(),
            generated_at_epoch_millis: 0,
            project_name: String::new(),
            class_count: 0,
            edge_count: 0,
            roles: BTreeMap::new(),
        }
    }
}

fn fold(summary: &mut FactsSummary, record: OwnedFactRecord) {
    match record {
        OwnedFactRecord::Meta { schema_id, schema_version, tool_name, tool_version, generated_at_epoch_millis, project_name } => {
            summary.schema_id = schema_id;
            summary.schema_version = schema_version;
            summary.tool_name = tool_name;
            summary.tool_version = tool_version;
            summary.generated_at_epoch_millis = generated_at_epoch_millis;
            summary.project_name = project_name;
        }
        OwnedFactRecord::Class { role, .. } => {
            summary.class_count += 1;
            if let Some(role) = role {
                *summary.roles.entry(role).or_insert(0) += 1;
            }
        }
        OwnedFactRecord::Edge { .. } => summary.edge_count += 1,
        OwnedFactRecord::Unknown => {}
    }
}

/// Read a facts stream (JSON array or gzipped JSONL) back into summary
/// counts, independent of which [`FactsFormat`] produced it: the two are
/// told apart by gzip's magic bytes, not the file extension.
pub fn read_summary(path: &Path) -> Result<FactsSummary, EngineError> {
    let err = |e: std::io::Error| EngineError::with_path(EngineErrorKind::ExportFailed, e.to_string(), path.display().to_string());
    let mut file = File::open(path).map_err(err)?;

    let mut magic = [0u8; 2];
    let peek = std::io::Read::read(&mut file, &mut magic).map_err(err)?;
    let mut reader = BufReader::new(file);
    reader.seek_relative(-(peek as i64)).map_err(err)?;

    let mut summary = FactsSummary::default();
    if peek == 2 && magic == [0x1f, 0x8b] {
        let decoder = BufReader::new(MultiGzDecoder::new(reader));
        for line in decoder.lines() {
            let line = line.map_err(err)?;
            if line.trim().is_empty() {
                continue;
            }
            let record: OwnedFactRecord = serde_json::from_str(&line)
                .map_err(|e| EngineError::with_path(EngineErrorKind::ExportFailed, e.to_string(), path.display().to_string()))?;
            fold(&mut summary, record);
        }
    } else {
        let records: Vec<OwnedFactRecord> = serde_json::from_reader(reader)
            .map_err(|e| EngineError::with_path(EngineErrorKind::ExportFailed, e.to_string(), path.display().to_string()))?;
        for record in records {
            fold(&mut summary, record);
        }
    }

    Ok(summary)
}
