//! Baseline fingerprinting and suppression: GENERATE writes a snapshot of
//! current findings, VERIFY suppresses findings whose fingerprint is
//! already recorded.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::api::config::{BaselineConfig, BaselineMode};
use crate::api::error::FatalError;
use crate::api::types::Finding;

/// Current on-disk schema version. A baseline file with any other version
/// is a fatal error.
pub const BASELINE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct BaselineFile {
    version: u32,
    fingerprints: BTreeSet<String>,
}

/// SHA-256 fingerprint over a finding's identity, deliberately excluding its
/// message text so that wording changes don't invalidate a baseline entry.
pub fn fingerprint(finding: &Finding) -> String {
    let mut data_pairs: Vec<(&String, &String)> = finding.data.iter().collect();
    data_pairs.sort_by_key(|(k, _)| *k);
    let data_joined = data_pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",");

    let input = format!(
        "{}|{}|{}|{}|{}|{}|{}",
        finding.rule_id,
        finding.severity,
        finding.file_path,
        finding.class_fqn.as_deref().unwrap_or(""),
        finding.member_name.as_deref().unwrap_or(""),
        finding.start_offset.map(|o| o.to_string()).unwrap_or_default(),
        finding.end_offset.map(|o| o.to_string()).unwrap_or_default(),
    );
    let input = format!("{input}|{data_joined}");

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Drives baseline GENERATE/VERIFY behavior for one run.
pub struct BaselineCoordinator {
    config: BaselineConfig,
}

impl BaselineCoordinator {
    pub fn new(config: BaselineConfig) -> Self {
        BaselineCoordinator { config }
    }

    /// Apply the configured mode to `findings`, returning the subset that
    /// survives (unsuppressed) plus whether a baseline file was written.
    pub fn apply(&self, findings: Vec<Finding>) -> Result<(Vec<Finding>, bool), FatalError> {
        match self.config.mode {
            BaselineMode::None => Ok((findings, false)),
            BaselineMode::Generate => {
                let mut fingerprints: BTreeSet<String> = findings.iter().map(fingerprint).collect();
                if self.config.merge {
                    if let Some(existing) = self.read_existing()? {
                        fingerprints.extend(existing.fingerprints);
                    }
                }
                self.write(&fingerprints)?;
                Ok((findings, true))
            }
            BaselineMode::Verify => {
                let existing = self.read_existing()?.ok_or_else(|| {
                    FatalError::Config(format!("baseline file not found at {}", self.config.path.display()))
                })?;
                let survivors =
                    findings.into_iter().filter(|f| !existing.fingerprints.contains(&fingerprint(f))).collect();
                Ok((survivors, false))
            }
        }
    }

    fn read_existing(&self) -> Result<Option<BaselineFile>, FatalError> {
        if !self.config.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.config.path)?;
        let file: BaselineFile = serde_json::from_str(&raw).map_err(|e| FatalError::Config(e.to_string()))?;
        if file.version != BASELINE_SCHEMA_VERSION {
            return Err(FatalError::UnsupportedBaselineVersion(file.version));
        }
        Ok(Some(file))
    }

    fn write(&self, fingerprints: &BTreeSet<String>) -> Result<(), FatalError> {
        let file = BaselineFile { version: BASELINE_SCHEMA_VERSION, fingerprints: fingerprints.clone() };
        let json = serde_json::to_string_pretty(&file).map_err(|e| FatalError::Config(e.to_string()))?;
        atomic_write(&self.config.path, json.as_bytes())
    }
}

/// Write `contents` to `path` atomically: write a sibling temp file, then
/// rename over the destination. Falls back to copy+remove when rename
/// fails (e.g. cross-filesystem destinations).
fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), FatalError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)?;
    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(&tmp_path, path)?;
            fs::remove_file(&tmp_path)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn finding(rule_id: &str, message: &str) -> Finding {
        Finding {
            rule_id: rule_id.to_string(),
            message: message.to_string(),
            file_path: "a/Foo.class".to_string(),
            severity: crate::api::types::Severity::Error,
            class_fqn: Some("com.a.Foo".to_string()),
            member_name: None,
            start_offset: None,
            end_offset: None,
            data: BTreeMap::new(),
        }
    }

    #[test]
    fn fingerprint_ignores_message_text() {
        let a = finding("arch.forbiddenRoleDependencies", "message one");
        let b = finding("arch.forbiddenRoleDependencies", "a completely different message");
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn generate_then_verify_suppresses_unchanged_finding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline.json");

        let generate = BaselineCoordinator::new(BaselineConfig { mode: BaselineMode::Generate, path: path.clone(), merge: false });
        let (survivors, wrote) = generate.apply(vec![finding("arch.forbiddenRoleDependencies", "msg")]).unwrap();
        assert!(wrote);
        assert_eq!(survivors.len(), 1);

        let verify = BaselineCoordinator::new(BaselineConfig { mode: BaselineMode::Verify, path, merge: false });
        let (survivors, _) = verify.apply(vec![finding("arch.forbiddenRoleDependencies", "msg changed")]).unwrap();
        assert!(survivors.is_empty());
    }

    #[test]
    fn verify_rejects_unsupported_schema_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        fs::write(&path, r#"{"version": 2, "fingerprints": []}"#).unwrap();
        let verify = BaselineCoordinator::new(BaselineConfig { mode: BaselineMode::Verify, path, merge: false });
        let err = verify.apply(vec![]).unwrap_err();
        assert!(matches!(err, FatalError::UnsupportedBaselineVersion(2)));
    }
}
