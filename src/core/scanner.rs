use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::api::config::{BytecodeConfig, GlobSetConfig, ScanOptions};
use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::{OriginKind, SourceLocation};
use crate::core::cancellation::CancellationToken;

/// One discovered, unparsed class: its location and raw bytes.
pub struct ScannedClass {
    /// Where this class was found.
    pub location: SourceLocation,
    /// Raw `.class` bytes.
    pub bytes: Vec<u8>,
}

/// Result of a full scan: every discovered class plus non-fatal warnings.
pub struct ScanOutcome {
    /// Discovered classes, in no particular order (callers re-sort).
    pub classes: Vec<ScannedClass>,
    /// Collected scanner warnings.
    pub errors: Vec<EngineError>,
    /// Whether the scan was cut short by cancellation or `max_classes`.
    pub truncated: bool,
}

/// Normalize a glob/target path: backslashes to forward slashes, Windows
/// drive letter stripped, leading separator stripped.
fn normalize_for_match(raw: &str) -> String {
    let mut s = raw.replace('\\', "/");
    if s.len() >= 2 && s.as_bytes()[1] == b':' {
        s = s[2..].to_string();
    }
    while s.starts_with('/') {
        s.remove(0);
    }
    s
}

/// Evaluate one glob pattern against one path: `*` matches a run of
/// non-separator chars, `?` one non-separator char, `**` zero or more path
/// segments, and a pattern with no leading `/` matches anywhere in the path.
pub fn glob_matches(pattern: &str, path: &str) -> bool {
    let mut normalized_pattern = pattern.replace('\\', "/");
    let is_rooted = normalized_pattern.starts_with('/');
    if is_rooted {
        normalized_pattern.remove(0);
    }
    if !normalized_pattern.starts_with("**/") {
        normalized_pattern = format!("**/{normalized_pattern}");
    }
    let target = normalize_for_match(path);

    match GlobBuilder::new(&normalized_pattern).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher().is_match(&target),
        Err(_) => false,
    }
}

/// True if `path` passes the include/exclude glob set (include empty = allow
/// all; exclude always wins).
fn passes_glob_set(globs: &GlobSetConfig, path: &str) -> bool {
    if globs.exclude.iter().any(|g| glob_matches(g, path)) {
        return false;
    }
    globs.include.is_empty() || globs.include.iter().any(|g| glob_matches(g, path))
}

/// Enumerate candidate `.class` files under configured bytecode roots,
/// honoring include/exclude globs for directories and jars.
pub fn scan(bytecode: &BytecodeConfig, options: &ScanOptions, cancel: &CancellationToken) -> ScanOutcome {
    let mut errors = Vec::new();
    let mut seen_real_paths: HashSet<PathBuf> = HashSet::new();
    let mut candidate_paths: Vec<PathBuf> = Vec::new();
    let mut truncated = false;

    for root in &bytecode.roots {
        if cancel.is_cancelled() {
            truncated = true;
            break;
        }
        let mut walker = walkdir::WalkDir::new(root).follow_links(options.follow_symlinks).into_iter();
        loop {
            if cancel.is_cancelled() {
                truncated = true;
                break;
            }
            let entry = match walker.next() {
                Some(e) => e,
                None => break,
            };
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    errors.push(EngineError::new(
                        EngineErrorKind::ScannerWarning,
                        format!("cannot read directory entry: {e}"),
                    ));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if options.follow_symlinks {
                if let Ok(canon) = entry.path().canonicalize() {
                    if !seen_real_paths.insert(canon) {
                        warn!(path = %entry.path().display(), "symlink cycle detected, skipping");
                        errors.push(EngineError::with_path(
                            EngineErrorKind::ScannerWarning,
                            "symlink cycle detected",
                            entry.path().to_string_lossy(),
                        ));
                        continue;
                    }
                }
            }

            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let rel_str = rel.to_string_lossy().replace('\\', "/");

            if rel_str.ends_with(".class") {
                if passes_glob_set(&bytecode.outputs_globs, &rel_str) {
                    candidate_paths.push(entry.path().to_path_buf());
                    if candidate_paths.len() >= options.max_classes {
                        errors.push(EngineError::new(
                            EngineErrorKind::ScannerWarning,
                            format!("max_classes limit ({}) reached; scan stopped early", options.max_classes),
                        ));
                        truncated = true;
                        break;
                    }
                }
            } else if rel_str.ends_with(".jar") && passes_glob_set(&bytecode.jar_globs, &rel_str) {
                candidate_paths.push(entry.path().to_path_buf());
            }
        }
        if truncated {
            break;
        }
    }

    let max_classes = options.max_classes;
    let max_jar_bytes = options.max_jar_bytes;
    let max_class_bytes = options.max_class_bytes;

    let results: Vec<(Vec<ScannedClass>, Vec<EngineError>)> = candidate_paths
        .par_iter()
        .map(|path| {
            if cancel.is_cancelled() {
                return (Vec::new(), Vec::new());
            }
            if path.extension().and_then(|e| e.to_str()) == Some("jar") {
                scan_jar(path, max_jar_bytes, max_class_bytes, cancel)
            } else {
                match scan_loose_class(path, max_class_bytes) {
                    Ok(c) => (vec![c], Vec::new()),
                    Err(e) => (Vec::new(), vec![e]),
                }
            }
        })
        .collect();

    let mut classes = Vec::new();
    for (cs, es) in results {
        classes.extend(cs);
        errors.extend(es);
    }

    if classes.len() > max_classes {
        classes.truncate(max_classes);
        truncated = true;
    }

    debug!(count = classes.len(), errors = errors.len(), "scan complete");
    ScanOutcome { classes, errors, truncated }
}

fn scan_loose_class(path: &Path, max_class_bytes: u64) -> Result<ScannedClass, EngineError> {
    let meta = fs::metadata(path)
        .map_err(|e| EngineError::with_path(EngineErrorKind::ScannerWarning, e.to_string(), path.to_string_lossy()))?;
    if meta.len() > max_class_bytes {
        return Err(EngineError::with_path(
            EngineErrorKind::ScannerWarning,
            format!("class file exceeds max_class_bytes ({max_class_bytes})"),
            path.to_string_lossy(),
        ));
    }
    let bytes = fs::read(path)
        .map_err(|e| EngineError::with_path(EngineErrorKind::ScannerWarning, e.to_string(), path.to_string_lossy()))?;
    let location = SourceLocation {
        origin_kind: OriginKind::DirClass,
        origin_path: normalize_for_match(&path.to_string_lossy()),
        container_path: None,
        entry_path: None,
        source_file: None,
        line: None,
    };
    Ok(ScannedClass { location, bytes })
}

fn scan_jar(
    path: &Path,
    max_jar_bytes: u64,
    max_class_bytes: u64,
    cancel: &CancellationToken,
) -> (Vec<ScannedClass>, Vec<EngineError>) {
    let mut errors = Vec::new();
    let mut classes = Vec::new();

    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            errors.push(EngineError::with_path(EngineErrorKind::ScannerWarning, e.to_string(), path.to_string_lossy()));
            return (classes, errors);
        }
    };
    if meta.len() > max_jar_bytes {
        errors.push(EngineError::with_path(
            EngineErrorKind::ScannerWarning,
            format!("archive exceeds max_jar_bytes ({max_jar_bytes})"),
            path.to_string_lossy(),
        ));
        return (classes, errors);
    }

    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            errors.push(EngineError::with_path(EngineErrorKind::ScannerWarning, e.to_string(), path.to_string_lossy()));
            return (classes, errors);
        }
    };
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(a) => a,
        Err(e) => {
            errors.push(EngineError::with_path(
                EngineErrorKind::ScannerWarning,
                format!("cannot open archive: {e}"),
                path.to_string_lossy(),
            ));
            return (classes, errors);
        }
    };

    let container_path = normalize_for_match(&path.to_string_lossy());
    for i in 0..archive.len() {
        if cancel.is_cancelled() {
            break;
        }
        let mut entry = match archive.by_index(i) {
            Ok(e) => e,
            Err(e) => {
                errors.push(EngineError::with_path(EngineErrorKind::ScannerWarning, e.to_string(), container_path.clone()));
                continue;
            }
        };
        if !entry.name().ends_with(".class") || entry.is_dir() {
            continue;
        }
        if entry.size() > max_class_bytes {
            errors.push(EngineError::with_path(
                EngineErrorKind::ScannerWarning,
                format!("jar entry exceeds max_class_bytes ({max_class_bytes})"),
                format!("{container_path}!/{}", entry.name()),
            ));
            continue;
        }
        let entry_path = entry.name().replace('\\', "/");
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = std::io::Read::read_to_end(&mut entry, &mut bytes) {
            errors.push(EngineError::with_path(
                EngineErrorKind::ScannerWarning,
                e.to_string(),
                format!("{container_path}!/{entry_path}"),
            ));
            continue;
        }
        let location = SourceLocation {
            origin_kind: OriginKind::JarEntry,
            origin_path: container_path.clone(),
            container_path: Some(container_path.clone()),
            entry_path: Some(entry_path),
            source_file: None,
            line: None,
        };
        classes.push(ScannedClass { location, bytes });
    }

    (classes, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_relative_anywhere_with_drive_letter_and_backslashes() {
        assert!(glob_matches("proj/src/*.kt", r"C:\proj\src\Main.kt"));
        assert!(!glob_matches("proj/src/*.kt", r"C:\proj\src\Main.java"));
    }

    #[test]
    fn glob_star_does_not_cross_separators() {
        assert!(!glob_matches("src/*.class", "src/a/b/Foo.class"));
        assert!(glob_matches("src/**/*.class", "src/a/b/Foo.class"));
    }

    #[test]
    fn glob_question_mark_matches_single_char() {
        assert!(glob_matches("Foo?.class", "Foo1.class"));
        assert!(!glob_matches("Foo?.class", "Foo12.class"));
    }
}
