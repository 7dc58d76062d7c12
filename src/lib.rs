//! Audit Sentinel - Validation and readiness scoring for audit specification corpora
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain logic separated from infrastructure concerns
//! - Grammar validators and the readiness scorer never reach past their inputs
//! - The facade wires configuration, analysis, and report formatting together

pub mod analyzer;
pub mod config;
pub mod document;
pub mod domain;
pub mod report;
pub mod scoring;
pub mod validators;

// Re-export main types for convenient access
pub use domain::{
    FieldPath, Finding, FindingCounts, GrammarKind, IssueKind, SentinelError, SentinelResult,
    Severity, ValidationStats,
};

pub use config::{ConfigBuilder, SentinelConfig};

pub use analyzer::{AnalysisOptions, Analyzer};

pub use document::{AuditDocument, ExtractedField, FieldKind};

pub use report::{DimensionReport, OutputFormat, ReportFormatter, ReportOptions};

pub use scoring::{AutomationLevel, ReadinessCategory};

use std::path::Path;

/// Main sentinel validator providing high-level validation operations
pub struct SentinelValidator {
    analyzer: Analyzer,
    report_formatter: ReportFormatter,
}

/// Options for a full validation run
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Output format for rendered results
    pub output_format: OutputFormat,
    /// Report rendering options
    pub report_options: ReportOptions,
    /// Analysis options
    pub analysis_options: AnalysisOptions,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Human,
            report_options: ReportOptions::default(),
            analysis_options: AnalysisOptions::default(),
        }
    }
}

impl SentinelValidator {
    /// Create a new validator with the given configuration
    pub fn new_with_config(config: SentinelConfig) -> SentinelResult<Self> {
        let analyzer = Analyzer::new(config)?;
        Ok(Self { analyzer, report_formatter: ReportFormatter::default() })
    }

    /// Create a validator with default configuration
    pub fn new() -> SentinelResult<Self> {
        Self::new_with_config(SentinelConfig::default())
    }

    /// Create a validator loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> SentinelResult<Self> {
        let config = SentinelConfig::load_from_file(path)?;
        Self::new_with_config(config)
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    /// Which syntax checker the startup probe selected
    pub fn checker_name(&self) -> &'static str {
        self.analyzer.checker_name()
    }

    /// Run both passes over a corpus with default options
    pub async fn validate_corpus<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> SentinelResult<DimensionReport> {
        self.analyzer.analyze_corpus(root.as_ref(), &AnalysisOptions::default()).await
    }

    /// Run both passes with custom options
    pub async fn validate_with_options<P: AsRef<Path>>(
        &self,
        root: P,
        options: &ValidationOptions,
    ) -> SentinelResult<DimensionReport> {
        self.analyzer.analyze_corpus(root.as_ref(), &options.analysis_options).await
    }

    /// Validate a single document and return its findings
    pub async fn validate_file<P: AsRef<Path>>(&self, path: P) -> Vec<Finding> {
        self.analyzer.analyze_file(path.as_ref()).await
    }

    /// Format a report for output
    pub fn format_report(
        &self,
        report: &DimensionReport,
        format: OutputFormat,
    ) -> SentinelResult<String> {
        self.report_formatter.format_report(report, format)
    }
}

/// Convenience function to create a validator with default settings
pub fn create_validator() -> SentinelResult<SentinelValidator> {
    SentinelValidator::new()
}

/// Convenience function to validate a corpus with default settings
pub async fn validate_corpus<P: AsRef<Path>>(root: P) -> SentinelResult<DimensionReport> {
    let validator = SentinelValidator::new()?;
    validator.validate_corpus(root).await
}

/// Pipeline integration utilities
pub mod gate {
    use super::*;

    /// Corpus quality gate for documentation pipelines
    ///
    /// Runs the full validation and fails when any critical finding is
    /// present (unparseable documents, dangerous scripts, destructive audits).
    pub async fn require_clean<P: AsRef<Path>>(root: P) -> SentinelResult<DimensionReport> {
        let validator = SentinelValidator::new()?;
        let report = validator.validate_corpus(root).await?;

        if report.has_critical() {
            return Err(SentinelError::report(format!(
                "Corpus gate failed: {} critical finding{}",
                report.findings.critical,
                if report.findings.critical == 1 { "" } else { "s" }
            )));
        }

        Ok(report)
    }
}
