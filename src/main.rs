//! Audit Sentinel CLI - Command-line interface for corpus validation
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to domain operations
//! - Handles external concerns like file I/O, process exit codes, and terminal output
//! - Provides clean separation between user interface and business logic

use anyhow::Result;
use audit_sentinel::{
    AnalysisOptions, DimensionReport, OutputFormat, ReportFormatter, ReportOptions,
    SentinelConfig, SentinelValidator, Severity, ValidationOptions,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;

/// Audit Sentinel - validation and readiness scoring for audit corpora
#[derive(Parser)]
#[command(name = "audit-sentinel")]
#[command(version = "0.1.0")]
#[command(about = "Validates audit specification documents and scores agent readiness")]
#[command(
    long_about = "Audit Sentinel checks every embedded pattern, glob, script, command, and \
                  closeout verification in an audit specification corpus, scores how \
                  machine-executable each document is, and produces an aggregate findings report."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a corpus and report findings plus readiness scores
    Check {
        /// Corpus root directory
        corpus: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Minimum severity level to report
        #[arg(short, long, value_enum)]
        severity: Option<SeverityArg>,

        /// Maximum number of issues to report
        #[arg(long)]
        max_issues: Option<usize>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable parallel processing
        #[arg(long)]
        no_parallel: bool,

        /// Maximum number of documents to analyze
        #[arg(long)]
        max_documents: Option<usize>,
    },

    /// Validate a configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Preflight: corpus readability, document count, checker availability
    Doctor {
        /// Corpus root directory
        corpus: PathBuf,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
    Yaml,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Yaml => OutputFormat::Yaml,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

async fn run_command(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Check {
            corpus,
            format,
            severity,
            max_issues,
            output,
            no_parallel,
            max_documents,
        } => {
            run_check(
                cli.config,
                corpus,
                format,
                severity,
                max_issues,
                output,
                no_parallel,
                max_documents,
                !cli.no_color,
            )
            .await
        }
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
        Commands::Doctor { corpus } => run_doctor(cli.config, corpus),
    }
}

async fn run_check(
    config_path: Option<PathBuf>,
    corpus: PathBuf,
    format: OutputFormatArg,
    severity: Option<SeverityArg>,
    max_issues: Option<usize>,
    output: Option<PathBuf>,
    no_parallel: bool,
    max_documents: Option<usize>,
    use_colors: bool,
) -> Result<i32> {
    let config = load_config(config_path)?;

    let validator = SentinelValidator::new_with_config(config)?.with_report_formatter(
        ReportFormatter::new(ReportOptions {
            use_colors: use_colors && output.is_none(),
            max_issues,
            min_severity: severity.map(Into::into),
            ..Default::default()
        }),
    );

    let options = ValidationOptions {
        analysis_options: AnalysisOptions {
            parallel: !no_parallel,
            max_documents,
        },
        ..Default::default()
    };

    let report = validator.validate_with_options(&corpus, &options).await?;
    let formatted = validator.format_report(&report, format.into())?;

    match output {
        Some(path) => {
            std::fs::write(&path, formatted)?;
            println!("Report written to {}", path.display());
        }
        None => println!("{formatted}"),
    }

    Ok(exit_code_for(&report))
}

fn exit_code_for(report: &DimensionReport) -> i32 {
    if report.has_critical() {
        1
    } else {
        0
    }
}

fn load_config(config_path: Option<PathBuf>) -> Result<SentinelConfig> {
    if let Some(path) = config_path {
        return Ok(SentinelConfig::load_from_file(path)?);
    }

    let default_configs = ["audit_sentinel.yaml", "audit_sentinel.yml", ".audit_sentinel.yaml"];
    for config_name in &default_configs {
        if Path::new(config_name).exists() {
            return Ok(SentinelConfig::load_from_file(config_name)?);
        }
    }

    Ok(SentinelConfig::default())
}

fn run_validate_config(config_path: Option<PathBuf>) -> Result<i32> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from("audit_sentinel.yaml"));

    println!("Validating configuration: {}", config_path.display());

    match SentinelConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("✅ Configuration is valid");
            println!("📊 Configuration summary:");
            println!("  Allowed commands: {}", config.tables.allowed_commands.len());
            println!("  Dangerous signatures: {}", config.tables.dangerous_signatures.len());
            println!("  Manual-blocker phrases: {}", config.tables.manual_blocker_phrases.len());
            println!("  Degenerate regexes: {}", config.tables.degenerate_regexes.len());
            println!("  Broad globs: {}", config.tables.broad_globs.len());
            println!("  Report issue cap: {}", config.limits.max_report_issues);
            Ok(0)
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {e}");
            Ok(1)
        }
    }
}

fn run_doctor(config_path: Option<PathBuf>, corpus: PathBuf) -> Result<i32> {
    let config = load_config(config_path)?;

    println!("🔎 Audit Sentinel preflight");

    // Corpus root must be enumerable; this is the one fatal condition
    let readable = std::fs::read_dir(&corpus).is_ok();
    if !readable {
        eprintln!("❌ Corpus root is not readable: {}", corpus.display());
        return Ok(1);
    }
    println!("✅ Corpus root readable: {}", corpus.display());

    let document_count = walkdir::WalkDir::new(&corpus)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| config.corpus.extensions.iter().any(|e| e == ext))
                .unwrap_or(false)
        })
        .count();
    println!("📄 Documents found: {document_count}");

    let shellcheck = std::process::Command::new("shellcheck")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if shellcheck {
        println!("✅ shellcheck available: scripts get external syntax checking");
    } else {
        println!("⚠️  shellcheck not found: falling back to the minimal syntax checker");
    }

    Ok(0)
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_check_command_reports_critical() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("broken.yaml"), "audit: [unclosed\n").unwrap();

        let result = run_check(
            None,
            temp_dir.path().to_path_buf(),
            OutputFormatArg::Json,
            None,
            None,
            None,
            true,
            None,
            false,
        )
        .await;

        // Parse errors are critical, so the check exits 1
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_check_command_clean_corpus() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("ok.yaml"),
            "audit:\n  id: a.b.c\nexecution:\n  automatable: full\n",
        )
        .unwrap();

        let result = run_check(
            None,
            temp_dir.path().to_path_buf(),
            OutputFormatArg::Json,
            None,
            None,
            None,
            true,
            None,
            false,
        )
        .await;

        assert_eq!(result.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_check_writes_report_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("ok.yaml"),
            "audit:\n  id: a.b.c\nexecution:\n  automatable: full\n",
        )
        .unwrap();
        let report_path = temp_dir.path().join("report.yaml");

        run_check(
            None,
            temp_dir.path().to_path_buf(),
            OutputFormatArg::Yaml,
            None,
            None,
            Some(report_path.clone()),
            true,
            None,
            false,
        )
        .await
        .unwrap();

        let written = fs::read_to_string(&report_path).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&written).unwrap();
        assert_eq!(
            parsed.get("dimension").and_then(serde_yaml::Value::as_str),
            Some("actionability")
        );
    }

    #[test]
    fn test_validate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("test_config.yaml");

        let config = SentinelConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        fs::write(&config_file, yaml).unwrap();

        let result = run_validate_config(Some(config_file));
        assert_eq!(result.unwrap(), 0);
    }

    #[test]
    fn test_validate_config_rejects_bad_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("bad_config.yaml");
        fs::write(&config_file, "version: \"9.9\"\n").unwrap();

        let result = run_validate_config(Some(config_file));
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn test_doctor_command() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.yaml"), "audit:\n  id: a\n").unwrap();

        let result = run_doctor(None, temp_dir.path().to_path_buf());
        assert_eq!(result.unwrap(), 0);

        let result = run_doctor(None, PathBuf::from("/definitely/not/here"));
        assert_eq!(result.unwrap(), 1);
    }
}
