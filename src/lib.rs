//! `shamash-asm`: an architecture-enforcement engine for compiled JVM
//! bytecode. Scans class files and archives, extracts structural facts
//! (classes, members, dependency edges), classifies classes into
//! architectural roles, evaluates a configured rule set against the
//! resulting graph, and exports findings as JSON, SARIF, XML, HTML, or a
//! raw facts stream.
//!
//! [`api`] is the stable surface: configuration, the data model, and the
//! error taxonomy. [`spi`] is the extension surface for authoring
//! additional [`spi::traits::Rule`] implementations. [`engine::Engine`]
//! drives the pipeline end to end.

pub mod api;
mod core;
pub mod engine;
pub mod spi;

/// Re-exported so callers outside this crate (the CLI binary, integration
/// tests) can name the indexed facts an [`engine::EngineOutcome`] carries
/// without reaching into the private `core` module.
pub use crate::core::fact_index::FactIndex;
/// Re-exported for callers that want to read back an exported facts stream.
pub use crate::core::exporter::ExportMeta;
/// Re-exported for the `facts` CLI command: read a previously exported
/// facts stream (JSON or gzipped JSONL, told apart by content not
/// extension) back into summary counts.
pub use crate::core::exporter::facts::{read_summary, FactsSummary};
/// Re-exported so callers can build a registry and list rule base ids
/// (the `registry list` CLI command) without reaching into `core`.
pub use crate::core::rule_registry::RuleRegistry;
