use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use shamash_asm::api::config::{EngineConfig, ExportFormat, FactsFormat, ScanScope};
use shamash_asm::api::types::Severity;
use shamash_asm::engine::{Engine, EngineOutcome};
use shamash_asm::RuleRegistry;

#[derive(Parser)]
#[command(name = "shamash-asm", version, about = "Architecture-enforcement engine for compiled JVM bytecode")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a reference configuration file to the given path
    Init {
        /// Destination path for the generated configuration
        #[arg(long, default_value = "shamash.toml")]
        out: PathBuf,
    },
    /// Parse and sanity-check a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long)]
        config: PathBuf,
    },
    /// Run the engine against a project
    Scan {
        /// Project root (overrides `project.bytecode.project_base` if set)
        #[arg(long)]
        project: Option<PathBuf>,

        /// Path to the configuration file
        #[arg(long)]
        config: PathBuf,

        /// Minimum severity that causes a non-zero exit
        #[arg(long, value_name = "LEVEL", default_value = "error")]
        fail_on: FailOn,

        /// Print every finding to stdout
        #[arg(long)]
        print_findings: bool,

        /// Export the facts stream in addition to whatever `export` is configured
        #[arg(long)]
        export_facts: bool,

        /// Facts stream encoding, when `--export-facts` is set
        #[arg(long, value_name = "FORMAT", default_value = "jsonl-gz")]
        facts_format: FactsFormatArg,

        /// Override `project.scan.scope`
        #[arg(long, value_name = "SCOPE")]
        scope: Option<ScopeArg>,

        /// Override `project.scan.follow_symlinks`
        #[arg(long)]
        follow_symlinks: bool,

        /// Override `project.scan.max_classes`
        #[arg(long)]
        max_classes: Option<usize>,

        /// Override `project.scan.max_jar_bytes`
        #[arg(long)]
        max_jar_bytes: Option<u64>,

        /// Override `project.scan.max_class_bytes`
        #[arg(long)]
        max_class_bytes: Option<u64>,
    },
    /// Read a previously exported facts file and print summary counts
    Facts {
        /// Path to `facts.json` or `facts.jsonl.gz`
        path: PathBuf,
    },
    /// Rule registry introspection
    Registry {
        #[command(subcommand)]
        command: RegistryCommands,
    },
}

#[derive(Subcommand)]
enum RegistryCommands {
    /// List every shipped rule's base id and display name
    List,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum FailOn {
    None,
    Info,
    Warning,
    Error,
}

impl FailOn {
    fn threshold(self) -> Option<Severity> {
        match self {
            FailOn::None => None,
            FailOn::Info => Some(Severity::Info),
            FailOn::Warning => Some(Severity::Warning),
            FailOn::Error => Some(Severity::Error),
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum FactsFormatArg {
    Json,
    JsonlGz,
}

impl From<FactsFormatArg> for FactsFormat {
    fn from(a: FactsFormatArg) -> Self {
        match a {
            FactsFormatArg::Json => FactsFormat::Json,
            FactsFormatArg::JsonlGz => FactsFormat::JsonlGz,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ScopeArg {
    ProjectOnly,
    AllSources,
    ProjectWithExternalBuckets,
}

impl From<ScopeArg> for ScanScope {
    fn from(a: ScopeArg) -> Self {
        match a {
            ScopeArg::ProjectOnly => ScanScope::ProjectOnly,
            ScopeArg::AllSources => ScanScope::AllSources,
            ScopeArg::ProjectWithExternalBuckets => ScanScope::ProjectWithExternalBuckets,
        }
    }
}

const REFERENCE_CONFIG: &str = include_str!("../../config/reference.toml");

fn load_config(path: &PathBuf) -> EngineConfig {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: cannot read config '{}': {e}", path.display());
            process::exit(2);
        }
    };
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => EngineConfig::from_json_str(&text),
        _ => EngineConfig::from_toml_str(&text),
    };
    match parsed {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(2);
        }
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { out } => {
            if let Err(e) = fs::write(&out, REFERENCE_CONFIG) {
                eprintln!("error: cannot write '{}': {e}", out.display());
                process::exit(2);
            }
            println!("wrote reference configuration to {}", out.display());
            process::exit(0);
        }

        Commands::Validate { config } => {
            let _ = load_config(&config);
            println!("{} is a well-formed configuration", config.display());
            process::exit(0);
        }

        Commands::Scan {
            project,
            config,
            fail_on,
            print_findings,
            export_facts,
            facts_format,
            scope,
            follow_symlinks,
            max_classes,
            max_jar_bytes,
            max_class_bytes,
        } => {
            let mut engine_config = load_config(&config);

            if let Some(project) = project {
                let root = match project.canonicalize() {
                    Ok(p) => p,
                    Err(e) => {
                        eprintln!("error: cannot resolve project root '{}': {e}", project.display());
                        process::exit(2);
                    }
                };
                engine_config.project.bytecode.project_base = root;
            }
            if let Some(scope) = scope {
                engine_config.project.scan.scope = scope.into();
            }
            if follow_symlinks {
                engine_config.project.scan.follow_symlinks = true;
            }
            if let Some(v) = max_classes {
                engine_config.project.scan.max_classes = v;
            }
            if let Some(v) = max_jar_bytes {
                engine_config.project.scan.max_jar_bytes = v;
            }
            if let Some(v) = max_class_bytes {
                engine_config.project.scan.max_class_bytes = v;
            }
            if export_facts {
                engine_config.export.enabled = true;
                if !engine_config.export.formats.contains(&ExportFormat::Facts) {
                    engine_config.export.formats.push(ExportFormat::Facts);
                }
                engine_config.export.facts_format = facts_format.into();
            }

            let engine = Engine::new(engine_config);
            let outcome = engine.run();

            let report = match outcome {
                EngineOutcome::Completed { report, .. } => report,
                EngineOutcome::Cancelled { partial, .. } => partial,
                EngineOutcome::Fatal(e) => {
                    eprintln!("error: {e}");
                    process::exit(2);
                }
            };

            if print_findings {
                for finding in &report.findings {
                    println!("[{}] {} {} — {}", finding.severity, finding.rule_id, finding.file_path, finding.message);
                }
            }
            for error in &report.errors {
                eprintln!("warning: {error}");
            }

            println!(
                "{} finding(s), {} error(s){}",
                report.findings.len(),
                report.errors.len(),
                if report.cancelled { " (cancelled)" } else { "" }
            );

            if !report.errors.is_empty() {
                process::exit(3);
            }
            if let Some(threshold) = fail_on.threshold() {
                if report.findings.iter().any(|f| f.severity >= threshold) {
                    process::exit(4);
                }
            }
            process::exit(0);
        }

        Commands::Facts { path } => match shamash_asm::read_summary(&path) {
            Ok(summary) => {
                println!("schema: {} v{}", summary.schema_id, summary.schema_version);
                println!("tool: {} {}", summary.tool_name, summary.tool_version);
                println!("project: {}", summary.project_name);
                println!("generated: {} (epoch ms)", summary.generated_at_epoch_millis);
                println!("classes: {}", summary.class_count);
                println!("edges: {}", summary.edge_count);
                for (role, count) in &summary.roles {
                    println!("  role {role}: {count}");
                }
                process::exit(0);
            }
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(3);
            }
        },

        Commands::Registry { command } => match command {
            RegistryCommands::List => {
                for (id, name) in RuleRegistry::standard().list() {
                    println!("{id}\t{name}");
                }
                process::exit(0);
            }
        },
    }
}
