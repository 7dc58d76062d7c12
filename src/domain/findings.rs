//! Core domain models for audit specification findings and validation results
//!
//! Architecture: Rich Domain Models - Findings are entities with behavior, not just data
//! - Issue kinds carry their own fixed severity so classification lives in one table
//! - ValidationStats acts as the per-run counter aggregate for the five grammars
//! - Everything grammar-scoped becomes a Finding; only corpus-level failures are errors

use crate::domain::field_path::FieldPath;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity levels for audit specification findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or advisory concerns
    Low,
    /// Should be fixed but does not block agent execution
    Medium,
    /// Breaks automated execution of the affected field
    High,
    /// File-scoped failures and dangerous content
    Critical,
}

impl Severity {
    /// Whether this severity level should fail a corpus check
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Critical)
    }

    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// The five embedded sub-languages checked by the grammar validators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GrammarKind {
    Regex,
    Glob,
    Script,
    Command,
    Verification,
}

impl GrammarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Glob => "glob",
            Self::Script => "script",
            Self::Command => "command",
            Self::Verification => "verification",
        }
    }
}

/// Classification of a finding. Each kind maps to exactly one severity so
/// severity assignment is a constant table rather than message inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Document failed to load or lacks its identifying section
    ParseError,
    /// Empty or whitespace-only field value
    EmptyValue,
    /// Degenerate regex that matches virtually every line
    OverlyBroad,
    /// Glob that matches the entire corpus
    TooBroad,
    /// Mismatched brace or bracket counts in a glob
    UnbalancedDelimiters,
    /// The value does not compile or parse under its grammar
    InvalidSyntax,
    /// Destructive command signature detected in a script
    Dangerous,
    /// Automation level is not declared
    AutomationUnspecified,
    /// Audit is declared manual-only
    ManualAudit,
    /// Closeout checklist item requires manual verification
    ManualCloseout,
    /// Audit is flagged destructive
    DestructiveAudit,
    /// Fully-automatable audit has steps with no executable commands
    StepsWithoutCommands,
}

impl IssueKind {
    /// Fixed severity per failure kind
    pub fn severity(self) -> Severity {
        match self {
            Self::ParseError | Self::Dangerous | Self::DestructiveAudit => Severity::Critical,
            Self::InvalidSyntax | Self::ManualCloseout => Severity::High,
            Self::EmptyValue
            | Self::OverlyBroad
            | Self::TooBroad
            | Self::UnbalancedDelimiters
            | Self::AutomationUnspecified
            | Self::StepsWithoutCommands => Severity::Medium,
            Self::ManualAudit => Severity::Low,
        }
    }
}

/// A validation finding detected in one audit specification document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Logical identifier of the audit (category.subcategory.name)
    pub audit_id: String,
    /// Corpus-relative path of the source document
    pub source_path: PathBuf,
    /// Severity, derived from the issue kind
    pub severity: Severity,
    /// Classification of the failure
    pub kind: IssueKind,
    /// Human-readable description of the failure
    pub message: String,
    /// Structural location of the offending value within the document
    pub field_path: FieldPath,
    /// The offending value, truncated for report size
    pub current_value: String,
    /// Suggested remediation
    pub recommended_action: String,
}

impl Finding {
    /// Create a new finding; severity comes from the kind's fixed table
    pub fn new(
        kind: IssueKind,
        audit_id: impl Into<String>,
        source_path: PathBuf,
        message: impl Into<String>,
    ) -> Self {
        Self {
            audit_id: audit_id.into(),
            source_path,
            severity: kind.severity(),
            kind,
            message: message.into(),
            field_path: FieldPath::root(),
            current_value: String::new(),
            recommended_action: String::new(),
        }
    }

    /// Set the structural location of the offending value
    pub fn with_field(mut self, field_path: FieldPath) -> Self {
        self.field_path = field_path;
        self
    }

    /// Attach the offending value (already truncated by the caller)
    pub fn with_current(mut self, value: impl Into<String>) -> Self {
        self.current_value = value.into();
        self
    }

    /// Attach a remediation hint
    pub fn with_recommendation(mut self, action: impl Into<String>) -> Self {
        self.recommended_action = action.into();
        self
    }

    /// Whether this finding is blocking (fails a corpus check)
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }

    /// Format finding for display
    pub fn format_display(&self) -> String {
        format!(
            "{} [{}] {} ({})",
            self.audit_id,
            self.severity.as_str(),
            self.message,
            self.field_path.to_locator()
        )
    }
}

/// Bounded single-line snippet of a field value for inclusion in findings
pub fn snippet(value: &str, max_chars: usize) -> String {
    let flat = value.replace('\n', "\\n");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        flat.chars().take(max_chars).collect()
    }
}

/// Count of findings by severity level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FindingCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl FindingCounts {
    /// Total number of findings across all severities
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }

    /// Whether there are any blocking findings
    pub fn has_blocking(&self) -> bool {
        self.critical > 0
    }

    /// Add a finding to the counts
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

/// Checked/invalid counters for one grammar
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GrammarStats {
    pub checked: usize,
    pub invalid: usize,
}

impl GrammarStats {
    fn merge(&mut self, other: GrammarStats) {
        self.checked += other.checked;
        self.invalid += other.invalid;
    }
}

/// Per-run counters for the five grammar validators
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ValidationStats {
    pub patterns: GrammarStats,
    pub globs: GrammarStats,
    pub scripts: GrammarStats,
    pub commands: GrammarStats,
    pub verifications: GrammarStats,
}

impl ValidationStats {
    fn slot(&mut self, grammar: GrammarKind) -> &mut GrammarStats {
        match grammar {
            GrammarKind::Regex => &mut self.patterns,
            GrammarKind::Glob => &mut self.globs,
            GrammarKind::Script => &mut self.scripts,
            GrammarKind::Command => &mut self.commands,
            GrammarKind::Verification => &mut self.verifications,
        }
    }

    /// Record one value routed to a grammar validator
    pub fn note_checked(&mut self, grammar: GrammarKind) {
        self.slot(grammar).checked += 1;
    }

    /// Record one invalid outcome for a grammar
    pub fn note_invalid(&mut self, grammar: GrammarKind) {
        self.slot(grammar).invalid += 1;
    }

    /// Merge another run's counters into this one
    pub fn merge(&mut self, other: ValidationStats) {
        self.patterns.merge(other.patterns);
        self.globs.merge(other.globs);
        self.scripts.merge(other.scripts);
        self.commands.merge(other.commands);
        self.verifications.merge(other.verifications);
    }

    /// Total values checked across all grammars
    pub fn total_checked(&self) -> usize {
        self.patterns.checked
            + self.globs.checked
            + self.scripts.checked
            + self.commands.checked
            + self.verifications.checked
    }

    /// Total invalid outcomes across all grammars
    pub fn total_invalid(&self) -> usize {
        self.patterns.invalid
            + self.globs.invalid
            + self.scripts.invalid
            + self.commands.invalid
            + self.verifications.invalid
    }

    /// `1 − invalid/checked`, defined as 1.0 when nothing was checked
    pub fn pass_rate(&self) -> f64 {
        let checked = self.total_checked();
        if checked == 0 {
            1.0
        } else {
            1.0 - (self.total_invalid() as f64 / checked as f64)
        }
    }
}

/// Error types that can occur during a sentinel run
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// The corpus root could not be enumerated - the only fatal condition
    #[error("Corpus error at {path}: {message}")]
    Corpus { path: PathBuf, message: String },

    /// Configuration file could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Report serialization or output failed
    #[error("Report error: {message}")]
    Report { message: String },
}

impl SentinelError {
    /// Create a corpus error
    pub fn corpus(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corpus { path: path.into(), message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a report error
    pub fn report(message: impl Into<String>) -> Self {
        Self::Report { message: message.into() }
    }
}

/// Result type for sentinel operations
pub type SentinelResult<T> = Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field_path::FieldPath;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Critical.is_blocking());
        assert!(!Severity::High.is_blocking());
    }

    #[test]
    fn test_issue_kind_severity_table() {
        assert_eq!(IssueKind::ParseError.severity(), Severity::Critical);
        assert_eq!(IssueKind::Dangerous.severity(), Severity::Critical);
        assert_eq!(IssueKind::InvalidSyntax.severity(), Severity::High);
        assert_eq!(IssueKind::OverlyBroad.severity(), Severity::Medium);
        assert_eq!(IssueKind::TooBroad.severity(), Severity::Medium);
        assert_eq!(IssueKind::EmptyValue.severity(), Severity::Medium);
        assert_eq!(IssueKind::ManualAudit.severity(), Severity::Low);
    }

    #[test]
    fn test_finding_creation() {
        let finding = Finding::new(
            IssueKind::OverlyBroad,
            "security.auth.session",
            PathBuf::from("security/auth/session.yaml"),
            "Pattern '.*' matches everything - too broad",
        )
        .with_field(FieldPath::parse("discovery.code_patterns[0].pattern").unwrap())
        .with_current(".*")
        .with_recommendation("Narrow the pattern to the code being discovered");

        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.audit_id, "security.auth.session");
        assert_eq!(finding.field_path.to_locator(), "discovery.code_patterns[0].pattern");
        assert!(!finding.is_blocking());
        assert!(finding.format_display().contains("[medium]"));
    }

    #[test]
    fn test_finding_counts() {
        let mut counts = FindingCounts::default();
        counts.add(Severity::Critical);
        counts.add(Severity::Medium);
        counts.add(Severity::Medium);

        assert_eq!(counts.total(), 3);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.medium, 2);
        assert!(counts.has_blocking());
    }

    #[test]
    fn test_stats_pass_rate() {
        let mut stats = ValidationStats::default();
        assert_eq!(stats.pass_rate(), 1.0);

        stats.note_checked(GrammarKind::Regex);
        stats.note_checked(GrammarKind::Regex);
        stats.note_checked(GrammarKind::Glob);
        stats.note_invalid(GrammarKind::Regex);

        assert_eq!(stats.total_checked(), 3);
        assert_eq!(stats.total_invalid(), 1);
        assert!((stats.pass_rate() - (1.0 - 1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = ValidationStats::default();
        a.note_checked(GrammarKind::Script);
        a.note_invalid(GrammarKind::Script);

        let mut b = ValidationStats::default();
        b.note_checked(GrammarKind::Script);
        b.note_checked(GrammarKind::Verification);

        a.merge(b);
        assert_eq!(a.scripts.checked, 2);
        assert_eq!(a.scripts.invalid, 1);
        assert_eq!(a.verifications.checked, 1);
    }

    #[test]
    fn test_snippet_truncation() {
        assert_eq!(snippet("echo hi\necho bye", 100), "echo hi\\necho bye");
        let long = "x".repeat(200);
        assert_eq!(snippet(&long, 100).len(), 100);
    }
}
