use serde::{Deserialize, Serialize};
use std::fmt;

/// The taxonomy of non-fatal (and one fatal) failures the engine can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    /// Scanner could not read a file, a size cap was exceeded, or a symlink cycle was found.
    ScannerWarning,
    /// A class file was malformed or its format version is unsupported.
    ExtractorWarning,
    /// Matcher compilation failed for a role definition.
    RoleClassificationFailed,
    /// A rule's base id has no registered implementation.
    RuleNotFound,
    /// A rule's params failed a runtime constraint check.
    RuleParamError,
    /// A rule raised an unexpected error while evaluating.
    RuleExecutionFailed,
    /// The baseline file is unreadable, has an unsupported version, or failed to write.
    BaselineFailed,
    /// A report or facts export failed to serialize or write.
    ExportFailed,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineErrorKind::ScannerWarning => "scanner_warning",
            EngineErrorKind::ExtractorWarning => "extractor_warning",
            EngineErrorKind::RoleClassificationFailed => "role_classification_failed",
            EngineErrorKind::RuleNotFound => "rule_not_found",
            EngineErrorKind::RuleParamError => "rule_param_error",
            EngineErrorKind::RuleExecutionFailed => "rule_execution_failed",
            EngineErrorKind::BaselineFailed => "baseline_failed",
            EngineErrorKind::ExportFailed => "export_failed",
        };
        write!(f, "{s}")
    }
}

/// A single collected engine error. Never aborts the run unless explicitly
/// noted (fatal baseline version mismatch).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    /// The taxonomy kind.
    pub kind: EngineErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// File path related to the error, if any, forward-slash normalized.
    pub path: Option<String>,
}

impl EngineError {
    /// Construct an error with no associated path.
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        EngineError { kind, message: message.into(), path: None }
    }

    /// Construct an error tagged with a file path.
    pub fn with_path(kind: EngineErrorKind, message: impl Into<String>, path: impl Into<String>) -> Self {
        EngineError { kind, message: message.into(), path: Some(path.into()) }
    }
}

/// Top-level error returned only for conditions that abort the whole run:
/// currently, only an unsupported baseline schema version.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    /// The baseline file's schema version is not `1`.
    #[error("unsupported baseline schema version: {0}")]
    UnsupportedBaselineVersion(u32),
    /// The project root path does not exist or is not a directory.
    #[error("project root '{0}' does not exist or is not a directory")]
    InvalidRoot(String),
    /// The configuration record failed to parse.
    #[error("configuration error: {0}")]
    Config(String),
    /// An I/O error that makes continuation impossible (e.g. cannot write baseline).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
