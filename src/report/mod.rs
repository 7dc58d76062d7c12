//! Report assembly and rendering with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - DimensionReport (domain) is converted to various external representations
//! - Assembly happens once at the aggregation barrier: severity sort, counts,
//!   explicit top-N truncation
//! - Domain logic remains pure while supporting multiple presentation needs

use crate::domain::{Finding, FindingCounts, SentinelError, SentinelResult, Severity, ValidationStats};
use crate::scoring::{AutomationDistribution, ReadinessDistribution};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::io::Write;

/// The terminal artifact of one validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionReport {
    /// Analysis dimension this report covers
    pub dimension: String,
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// Documents discovered in the corpus
    pub audits_analyzed: usize,
    /// Documents that failed to load or lacked their identifying section
    pub parse_errors: usize,
    /// Finding counts by severity, over the full (untruncated) issue list
    pub findings: FindingCounts,
    /// Issues ordered by severity (critical first, discovery order within ties),
    /// truncated to the configured cap
    pub issues: Vec<Finding>,
    /// Readiness aggregates from the scoring pass
    pub readiness: ReadinessReport,
    /// Run summary
    pub summary: ReportSummary,
}

/// Corpus-wide readiness aggregates
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub scores: ReadinessDistribution,
    pub automation_distribution: AutomationDistribution,
    /// Fraction of documents fully or mostly automatable
    pub ready_rate: f64,
}

/// Run summary: pass rate, truncation accounting, grammar counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    /// `1 − Σinvalid/Σchecked` across the five grammars; 1.0 when no checks ran
    pub pass_rate: f64,
    /// Total issues found, before truncation
    pub needs_remediation: usize,
    /// Issues actually present in the report
    pub issues_listed: usize,
    /// Whether the issue list was truncated to the cap
    pub issues_truncated: bool,
    /// Which syntax checker the startup probe selected
    pub syntax_checker: String,
    /// Per-grammar checked/invalid counters
    pub grammars: ValidationStats,
}

impl DimensionReport {
    /// Whether the report contains any issues
    pub fn has_issues(&self) -> bool {
        self.findings.total() > 0
    }

    /// Whether the report contains blocking (critical) findings
    pub fn has_critical(&self) -> bool {
        self.findings.has_blocking()
    }
}

/// Assembles per-run results into the final report
pub struct ReportBuilder {
    dimension: String,
    max_issues: usize,
    syntax_checker: String,
}

impl ReportBuilder {
    pub fn new(max_issues: usize, syntax_checker: impl Into<String>) -> Self {
        Self {
            dimension: "actionability".to_string(),
            max_issues,
            syntax_checker: syntax_checker.into(),
        }
    }

    /// Merge both passes into the terminal artifact. Sorting is stable, so
    /// ties within a severity preserve discovery order.
    pub fn build(
        self,
        audits_analyzed: usize,
        parse_errors: usize,
        mut issues: Vec<Finding>,
        stats: ValidationStats,
        scores: ReadinessDistribution,
        automation: AutomationDistribution,
    ) -> DimensionReport {
        issues.sort_by_key(|finding| Reverse(finding.severity));

        let mut findings = FindingCounts::default();
        for issue in &issues {
            findings.add(issue.severity);
        }

        let total = issues.len();
        let truncated = total > self.max_issues;
        if truncated {
            issues.truncate(self.max_issues);
        }

        DimensionReport {
            dimension: self.dimension,
            generated_at: Utc::now(),
            audits_analyzed,
            parse_errors,
            findings,
            summary: ReportSummary {
                pass_rate: stats.pass_rate(),
                needs_remediation: total,
                issues_listed: issues.len(),
                issues_truncated: truncated,
                syntax_checker: self.syntax_checker,
                grammars: stats,
            },
            issues,
            readiness: ReadinessReport {
                ready_rate: scores.ready_rate(),
                scores,
                automation_distribution: automation,
            },
        }
    }
}

/// Supported output formats for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with colors and grouping
    Human,
    /// JSON format for programmatic consumption
    Json,
    /// YAML format matching the corpus's own serialization
    Yaml,
}

impl OutputFormat {
    /// Parse format from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "yaml"]
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Whether to show recommendations under each issue
    pub show_recommendations: bool,
    /// Maximum number of issues to render
    pub max_issues: Option<usize>,
    /// Minimum severity level to include
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_recommendations: true,
            max_issues: None,
            min_severity: None,
        }
    }
}

/// Main report formatter that dispatches to specific formatters
pub struct ReportFormatter {
    options: ReportOptions,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(ReportOptions::default())
    }
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Format a report in the specified format
    pub fn format_report(
        &self,
        report: &DimensionReport,
        format: OutputFormat,
    ) -> SentinelResult<String> {
        let filtered = self.filter_issues(&report.issues);

        match format {
            OutputFormat::Human => self.format_human(report, &filtered),
            OutputFormat::Json => self.format_json(report, &filtered),
            OutputFormat::Yaml => self.format_yaml(report, &filtered),
        }
    }

    /// Write a formatted report to a writer
    pub fn write_report<W: Write>(
        &self,
        report: &DimensionReport,
        format: OutputFormat,
        mut writer: W,
    ) -> SentinelResult<()> {
        let formatted = self.format_report(report, format)?;
        writer
            .write_all(formatted.as_bytes())
            .map_err(|e| SentinelError::Io { source: e })?;
        Ok(())
    }

    /// Filter issues based on report options
    fn filter_issues<'a>(&self, issues: &'a [Finding]) -> Vec<&'a Finding> {
        let mut filtered: Vec<&Finding> = issues
            .iter()
            .filter(|issue| match self.options.min_severity {
                Some(min) => issue.severity >= min,
                None => true,
            })
            .collect();

        if let Some(max) = self.options.max_issues {
            filtered.truncate(max);
        }

        filtered
    }

    /// Format report in human-readable form
    fn format_human(
        &self,
        report: &DimensionReport,
        issues: &[&Finding],
    ) -> SentinelResult<String> {
        let mut output = String::new();

        if issues.is_empty() {
            if self.options.use_colors {
                output.push_str("✅ \x1b[32mNo actionability issues found\x1b[0m\n");
            } else {
                output.push_str("✅ No actionability issues found\n");
            }
        } else {
            let icon = if report.has_critical() { "❌" } else { "⚠️" };
            if self.options.use_colors {
                let color = if report.has_critical() { "31" } else { "33" };
                output.push_str(&format!(
                    "{icon} \x1b[{color}mActionability Issues Found\x1b[0m\n\n"
                ));
            } else {
                output.push_str(&format!("{icon} Actionability Issues Found\n\n"));
            }

            // Group issues by source document
            let mut by_file: std::collections::BTreeMap<&std::path::Path, Vec<&Finding>> =
                std::collections::BTreeMap::new();
            for issue in issues {
                by_file.entry(&issue.source_path).or_default().push(issue);
            }

            for (file_path, file_issues) in by_file {
                output.push_str(&format!("📁 {}\n", file_path.display()));

                for issue in file_issues {
                    let severity_color = match issue.severity {
                        Severity::Critical => "31", // Red
                        Severity::High => "33",     // Yellow
                        Severity::Medium => "36",   // Cyan
                        Severity::Low => "37",      // White
                    };

                    if self.options.use_colors {
                        output.push_str(&format!(
                            "  \x1b[2m{}\x1b[0m [\x1b[{}m{}\x1b[0m] {}\n",
                            issue.field_path.to_locator(),
                            severity_color,
                            issue.severity.as_str(),
                            issue.message
                        ));
                    } else {
                        output.push_str(&format!(
                            "  {} [{}] {}\n",
                            issue.field_path.to_locator(),
                            issue.severity.as_str(),
                            issue.message
                        ));
                    }

                    if !issue.current_value.is_empty() {
                        if self.options.use_colors {
                            output.push_str(&format!(
                                "    \x1b[2m│ {}\x1b[0m\n",
                                issue.current_value
                            ));
                        } else {
                            output.push_str(&format!("    │ {}\n", issue.current_value));
                        }
                    }

                    if self.options.show_recommendations && !issue.recommended_action.is_empty() {
                        if self.options.use_colors {
                            output.push_str(&format!(
                                "    \x1b[32m💡 {}\x1b[0m\n",
                                issue.recommended_action
                            ));
                        } else {
                            output.push_str(&format!("    💡 {}\n", issue.recommended_action));
                        }
                    }
                }
                output.push('\n');
            }
        }

        output.push_str(&self.format_summary(report));
        Ok(output)
    }

    /// Format report as JSON
    fn format_json(
        &self,
        report: &DimensionReport,
        issues: &[&Finding],
    ) -> SentinelResult<String> {
        let rendered = self.with_filtered_issues(report, issues);
        serde_json::to_string_pretty(&rendered)
            .map_err(|e| SentinelError::report(format!("JSON serialization failed: {e}")))
    }

    /// Format report as YAML
    fn format_yaml(
        &self,
        report: &DimensionReport,
        issues: &[&Finding],
    ) -> SentinelResult<String> {
        let rendered = self.with_filtered_issues(report, issues);
        serde_yaml::to_string(&rendered)
            .map_err(|e| SentinelError::report(format!("YAML serialization failed: {e}")))
    }

    fn with_filtered_issues(
        &self,
        report: &DimensionReport,
        issues: &[&Finding],
    ) -> DimensionReport {
        let mut rendered = report.clone();
        rendered.issues = issues.iter().map(|issue| (*issue).clone()).collect();
        rendered.summary.issues_listed = rendered.issues.len();
        rendered
    }

    /// Format the summary section for human output
    fn format_summary(&self, report: &DimensionReport) -> String {
        let mut summary = String::new();

        if self.options.use_colors {
            summary.push_str("📊 \x1b[1mSummary:\x1b[0m ");
        } else {
            summary.push_str("📊 Summary: ");
        }

        let counts = &report.findings;
        if counts.total() == 0 {
            summary.push_str(&format!(
                "0 issues in {} audits, pass rate {:.2}%\n",
                report.audits_analyzed,
                report.summary.pass_rate * 100.0
            ));
        } else {
            let mut parts = Vec::new();
            for (count, label, color) in [
                (counts.critical, "critical", "31"),
                (counts.high, "high", "33"),
                (counts.medium, "medium", "36"),
                (counts.low, "low", "37"),
            ] {
                if count > 0 {
                    if self.options.use_colors {
                        parts.push(format!("\x1b[{color}m{count} {label}\x1b[0m"));
                    } else {
                        parts.push(format!("{count} {label}"));
                    }
                }
            }

            summary.push_str(&format!(
                "{} in {} audits, pass rate {:.2}%\n",
                parts.join(", "),
                report.audits_analyzed,
                report.summary.pass_rate * 100.0
            ));

            if report.summary.issues_truncated {
                summary.push_str(&format!(
                    "   (showing {} of {} issues)\n",
                    report.summary.issues_listed, report.summary.needs_remediation
                ));
            }
        }

        let scores = &report.readiness.scores;
        summary.push_str(&format!(
            "🤖 Readiness: {} fully, {} mostly, {} partially, {} require human ({:.1}% ready)\n",
            scores.fully_automatable,
            scores.mostly_automatable,
            scores.partially_automatable,
            scores.requires_human,
            report.readiness.ready_rate * 100.0
        ));
        summary.push_str(&format!(
            "🔍 Syntax checker: {}\n",
            report.summary.syntax_checker
        ));

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldPath, IssueKind};
    use std::path::PathBuf;

    fn finding(kind: IssueKind, audit: &str, message: &str) -> Finding {
        Finding::new(kind, audit, PathBuf::from(format!("{audit}.yaml")), message)
            .with_field(FieldPath::root().key("discovery").key("code_patterns").index(0).key("pattern"))
            .with_current(".*")
            .with_recommendation("Fix the pattern")
    }

    fn build_report(issues: Vec<Finding>, max_issues: usize) -> DimensionReport {
        let mut stats = ValidationStats::default();
        stats.note_checked(crate::domain::GrammarKind::Regex);

        ReportBuilder::new(max_issues, "minimal").build(
            3,
            0,
            issues,
            stats,
            ReadinessDistribution::default(),
            AutomationDistribution::default(),
        )
    }

    #[test]
    fn test_severity_sort_is_stable() {
        let issues = vec![
            finding(IssueKind::OverlyBroad, "first.medium", "m1"),
            finding(IssueKind::InvalidSyntax, "a.high", "h1"),
            finding(IssueKind::TooBroad, "second.medium", "m2"),
            finding(IssueKind::ParseError, "z.critical", "c1"),
        ];

        let report = build_report(issues, 100);
        let order: Vec<&str> = report.issues.iter().map(|f| f.audit_id.as_str()).collect();
        assert_eq!(order, vec!["z.critical", "a.high", "first.medium", "second.medium"]);

        assert_eq!(report.findings.critical, 1);
        assert_eq!(report.findings.high, 1);
        assert_eq!(report.findings.medium, 2);
    }

    #[test]
    fn test_truncation_is_explicit() {
        let issues = (0..5)
            .map(|i| finding(IssueKind::OverlyBroad, &format!("audit{i}"), "broad"))
            .collect();

        let report = build_report(issues, 2);
        assert_eq!(report.issues.len(), 2);
        assert!(report.summary.issues_truncated);
        assert_eq!(report.summary.needs_remediation, 5);
        assert_eq!(report.summary.issues_listed, 2);
        // Counts are over the full list, not the truncated one
        assert_eq!(report.findings.medium, 5);
    }

    #[test]
    fn test_empty_report_has_pass_rate_one() {
        let report = ReportBuilder::new(100, "minimal").build(
            0,
            0,
            Vec::new(),
            ValidationStats::default(),
            ReadinessDistribution::default(),
            AutomationDistribution::default(),
        );

        assert_eq!(report.summary.pass_rate, 1.0);
        assert_eq!(report.audits_analyzed, 0);
        assert!(!report.has_issues());
        assert!(!report.summary.issues_truncated);
    }

    #[test]
    fn test_json_round_trip() {
        let report = build_report(
            vec![finding(IssueKind::InvalidSyntax, "a.b.c", "Invalid regex syntax: oops")],
            100,
        );

        let formatter = ReportFormatter::default();
        let json = formatter.format_report(&report, OutputFormat::Json).unwrap();
        let parsed: DimensionReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.dimension, "actionability");
        assert_eq!(parsed.issues.len(), 1);
        assert_eq!(
            parsed.issues[0].field_path.to_locator(),
            "discovery.code_patterns[0].pattern"
        );
    }

    #[test]
    fn test_yaml_format_parses() {
        let report = build_report(vec![finding(IssueKind::TooBroad, "a.b.c", "too broad")], 100);
        let formatter = ReportFormatter::default();
        let yaml = formatter.format_report(&report, OutputFormat::Yaml).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed.get("dimension").and_then(serde_yaml::Value::as_str),
            Some("actionability")
        );
    }

    #[test]
    fn test_human_format() {
        let formatter = ReportFormatter::new(ReportOptions {
            use_colors: false,
            ..Default::default()
        });

        let report = build_report(
            vec![finding(IssueKind::OverlyBroad, "sec.auth.session", "matches everything")],
            100,
        );
        let output = formatter.format_report(&report, OutputFormat::Human).unwrap();

        assert!(output.contains("Actionability Issues Found"));
        assert!(output.contains("sec.auth.session.yaml"));
        assert!(output.contains("matches everything"));
        assert!(output.contains("Summary:"));
        assert!(output.contains("Syntax checker: minimal"));
    }

    #[test]
    fn test_min_severity_filter() {
        let formatter = ReportFormatter::new(ReportOptions {
            min_severity: Some(Severity::High),
            ..Default::default()
        });

        let report = build_report(
            vec![
                finding(IssueKind::OverlyBroad, "med.audit", "medium issue"),
                finding(IssueKind::InvalidSyntax, "high.audit", "high issue"),
            ],
            100,
        );

        let json = formatter.format_report(&report, OutputFormat::Json).unwrap();
        let parsed: DimensionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.issues.len(), 1);
        assert_eq!(parsed.issues[0].audit_id, "high.audit");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("Human"), Some(OutputFormat::Human));
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("yaml"), Some(OutputFormat::Yaml));
        assert_eq!(OutputFormat::from_str("sarif"), None);
    }
}
