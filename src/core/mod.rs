//! Internal engine machinery: scanning, extraction, classification, rule
//! execution, graph analysis, suppression, baselining, and export.

pub mod analysis;
pub mod baseline;
pub mod cancellation;
pub mod classfile;
pub mod exception_suppressor;
pub mod exporter;
pub mod fact_extractor;
pub mod fact_index;
pub mod graph_util;
pub mod param_reader;
pub mod role_classifier;
pub mod rule_registry;
pub mod rules;
pub mod scanner;
