use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A fully-qualified binary type reference, e.g. `com.a.web.UserController`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// Dotted fully-qualified name.
    pub fq_name: String,
    /// Dotted package name (empty string for the default package).
    pub package_name: String,
    /// Slash-separated internal (JVM) name.
    pub internal_name: String,
}

impl TypeRef {
    /// Build a `TypeRef` from a JVM internal name (slash-separated, no `L`/`;`).
    pub fn from_internal_name(internal: &str) -> Self {
        let fq_name = internal.replace('/', ".");
        let package_name = match fq_name.rfind('.') {
            Some(idx) => fq_name[..idx].to_string(),
            None => String::new(),
        };
        TypeRef { fq_name, package_name, internal_name: internal.to_string() }
    }

    /// The simple (unqualified) class name.
    pub fn simple_name(&self) -> &str {
        match self.fq_name.rfind('.') {
            Some(idx) => &self.fq_name[idx + 1..],
            None => &self.fq_name,
        }
    }
}

/// Origin of a scanned class: a loose `.class` file under a directory root,
/// or an entry inside a jar archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginKind {
    /// A `.class` file discovered directly under a bytecode root directory.
    DirClass,
    /// An entry read from inside a jar (or other zip-based) archive.
    JarEntry,
}

/// Normalized, immutable location a fact or finding was derived from.
///
/// Paths are always forward-slash normalized; drive letters are stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Whether this originated from a loose class file or a jar entry.
    pub origin_kind: OriginKind,
    /// Path to the originating root: the directory (DirClass) or jar (JarEntry).
    pub origin_path: String,
    /// Path to the containing jar, duplicated from `origin_path` for JarEntry
    /// for call-site convenience.
    pub container_path: Option<String>,
    /// Path of the entry inside the jar, forward-slash normalized.
    pub entry_path: Option<String>,
    /// The class file's `SourceFile` attribute, if present.
    pub source_file: Option<String>,
    /// Best-effort line number, when known (bytecode line-number tables).
    pub line: Option<u32>,
}

impl SourceLocation {
    /// Render the external, human-facing path: `dir/Foo.class` or
    /// `path/to.jar!/com/a/Foo.class`.
    pub fn display_path(&self) -> String {
        match self.origin_kind {
            OriginKind::DirClass => self.origin_path.clone(),
            OriginKind::JarEntry => format!(
                "{}!/{}",
                self.container_path.as_deref().unwrap_or(&self.origin_path),
                self.entry_path.as_deref().unwrap_or("")
            ),
        }
    }
}

/// A decoded fact about one scanned class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassFact {
    /// Fully-qualified binary name.
    pub fq_name: String,
    /// Dotted package name.
    pub package_name: String,
    /// Unqualified simple name.
    pub simple_name: String,
    /// Public / package-private / protected / private, as inferred from access flags.
    pub visibility: Visibility,
    /// `ACC_INTERFACE` set.
    pub is_interface: bool,
    /// `ACC_ABSTRACT` set (and not an interface).
    pub is_abstract: bool,
    /// `ACC_ENUM` set.
    pub is_enum: bool,
    /// Declares `public static void main(String[])`.
    pub has_main_method: bool,
    /// Fully-qualified names of every annotation applied at the class level.
    pub annotation_fqns: Vec<String>,
    /// Fully-qualified name of the superclass (`None` only for `java.lang.Object`).
    pub super_fqn: Option<String>,
    /// Fully-qualified names of directly implemented interfaces.
    pub interface_fqns: Vec<String>,
    /// Number of declared methods (including constructors).
    pub method_count: u32,
    /// Number of declared fields.
    pub field_count: u32,
    /// Class file format version, `(major, minor)`.
    pub class_file_version: (u16, u16),
    /// Where this class was read from.
    pub location: SourceLocation,
}

/// Visibility of a class, method, or field, derived from JVM access flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// `ACC_PUBLIC`.
    Public,
    /// `ACC_PROTECTED`.
    Protected,
    /// `ACC_PRIVATE`.
    Private,
    /// None of the above (package-private).
    Package,
}

/// A method reference: the owner, name, and descriptor uniquely identify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    /// Fully-qualified name of the declaring class.
    pub owner_fqn: String,
    /// Method name (`<init>` for constructors).
    pub name: String,
    /// JVM method descriptor, e.g. `(Ljava/lang/String;I)V`.
    pub descriptor: String,
    /// Raw JVM access flags.
    pub access_flags: u16,
}

/// A field reference: the owner, name, and descriptor uniquely identify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Fully-qualified name of the declaring class.
    pub owner_fqn: String,
    /// Field name.
    pub name: String,
    /// JVM field descriptor, e.g. `Ljava/lang/String;`.
    pub descriptor: String,
    /// Raw JVM access flags.
    pub access_flags: u16,
}

/// The syntactic origin of a [`DependencyEdge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// An invoked method (any `invoke*` instruction).
    MethodCall,
    /// A read or write of a field (`get/putfield`, `get/putstatic`).
    FieldAccess,
    /// A field's declared type.
    FieldType,
    /// A method parameter's type.
    ParameterType,
    /// A method's return type.
    ReturnType,
    /// A class's superclass.
    Extends,
    /// A class's directly implemented interface.
    Implements,
    /// An annotation usage (class, method, field, or parameter level).
    AnnotationType,
    /// An exception type caught or declared in an exception table entry.
    Catch,
    /// An `instanceof` check.
    Instanceof,
    /// A `new`/`anewarray` object allocation.
    New,
}

/// A directed, deduplicated fact linking two types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The referencing type.
    pub from: TypeRef,
    /// The referenced type.
    pub to: TypeRef,
    /// How `from` references `to`.
    pub kind: EdgeKind,
    /// Extra detail (e.g. `"name:descriptor"` for method calls).
    pub detail: Option<String>,
    /// Where in `from` this reference occurs.
    pub location: SourceLocation,
}

/// Severity level assigned to a rule, carried through to its findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational; no compliance impact.
    Info,
    /// Should be addressed but does not block.
    Warning,
    /// Blocking violation.
    Error,
}

impl Severity {
    /// Rank used for finding ordering: higher severity sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Error => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A single, deterministic, ordered rule-violation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Canonical id: `type.name` or `type.name.role`.
    pub rule_id: String,
    /// Human-readable message.
    pub message: String,
    /// Forward-slash normalized file path.
    pub file_path: String,
    /// Severity of the violated rule.
    pub severity: Severity,
    /// Fully-qualified class this finding is anchored to, if any.
    pub class_fqn: Option<String>,
    /// Member (method/field) name, if any.
    pub member_name: Option<String>,
    /// Start byte/char offset within the source, if known.
    pub start_offset: Option<u32>,
    /// End byte/char offset within the source, if known.
    pub end_offset: Option<u32>,
    /// Ordered, string-keyed extra data (role names, paths, examples, …).
    pub data: BTreeMap<String, String>,
}

impl Finding {
    /// The identity key findings are deduplicated and deterministically
    /// ordered by.
    pub fn identity_key(&self) -> (u8, String, String, String, String, String) {
        (
            self.severity.rank(),
            self.file_path.clone(),
            self.class_fqn.clone().unwrap_or_default(),
            self.member_name.clone().unwrap_or_default(),
            self.rule_id.clone(),
            self.message.clone(),
        )
    }

    /// The role scoped into this finding's canonical id, if the id has
    /// exactly 3 dot-separated segments.
    pub fn scoped_role(&self) -> Option<&str> {
        let mut parts = self.rule_id.splitn(3, '.');
        let _type = parts.next()?;
        let _name = parts.next()?;
        parts.next()
    }
}

/// Outcome of a full engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineReport {
    /// Deterministically ordered findings.
    pub findings: Vec<Finding>,
    /// Deduplicated, sorted engine errors.
    pub errors: Vec<crate::api::error::EngineError>,
    /// Per-granularity graph snapshots, hotspots, and scores, when enabled.
    pub analysis: Option<crate::core::analysis::AnalysisReport>,
    /// Whether the run was cancelled before completion.
    pub cancelled: bool,
}

/// Newtype around a project-relative, forward-slash path used as a map key
/// and baseline-fingerprint input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NormalizedPath(pub String);

impl NormalizedPath {
    /// Normalize a possibly Windows-style, possibly absolute path: forward
    /// slashes, drive letter stripped.
    pub fn normalize(raw: &str) -> Self {
        let mut s = raw.replace('\\', "/");
        if s.len() >= 2 && s.as_bytes()[1] == b':' {
            s = s[2..].to_string();
        }
        NormalizedPath(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        NormalizedPath::normalize(&p.to_string_lossy())
    }
}
