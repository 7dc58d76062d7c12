//! Grammar validators for the five embedded sub-languages
//!
//! CDD Principle: Domain Services - Each validator checks one grammar and nothing else
//! - Every outcome is a Verdict value; nothing panics or propagates past the field
//! - Counters and findings accumulate in an explicit RunContext, merged once at
//!   the aggregation barrier - there is no ambient global state
//! - All allow/block tables come from configuration

pub mod shell;

use crate::config::SentinelConfig;
use crate::domain::{Finding, GrammarKind, IssueKind, ValidationStats};
use crate::validators::shell::{CheckOutcome, SyntaxChecker};
use regex::{Regex, RegexBuilder};
use serde_yaml::Value;
use std::collections::HashSet;

/// Per-worker accumulator for findings and grammar counters
#[derive(Debug, Default)]
pub struct RunContext {
    pub issues: Vec<Finding>,
    pub stats: ValidationStats,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finding
    pub fn record(&mut self, finding: Finding) {
        self.issues.push(finding);
    }

    /// Merge another context into this one, preserving discovery order
    pub fn merge(&mut self, other: RunContext) {
        self.issues.extend(other.issues);
        self.stats.merge(other.stats);
    }
}

/// Outcome of one validator invocation
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Failure classification; `None` means the value passed
    pub kind: Option<IssueKind>,
    /// Human-readable failure reason, empty on pass
    pub reason: String,
}

impl Verdict {
    pub fn pass() -> Self {
        Self { kind: None, reason: String::new() }
    }

    pub fn fail(kind: IssueKind, reason: impl Into<String>) -> Self {
        Self { kind: Some(kind), reason: reason.into() }
    }

    pub fn is_valid(&self) -> bool {
        self.kind.is_none()
    }
}

/// The five stateless grammar checkers, compiled once per run from the
/// configuration tables plus the probed syntax checker.
pub struct GrammarValidators {
    degenerate_regexes: HashSet<String>,
    broad_globs: HashSet<String>,
    allowed_commands: HashSet<String>,
    danger_signatures: Vec<Regex>,
    checker: Box<dyn SyntaxChecker>,
    reason_snippet_chars: usize,
}

impl GrammarValidators {
    /// Compile the configuration tables. Signature compilation cannot fail
    /// for a validated config, but the error is propagated for direct callers.
    pub fn new(
        config: &SentinelConfig,
        checker: Box<dyn SyntaxChecker>,
    ) -> crate::domain::SentinelResult<Self> {
        let danger_signatures = config
            .tables
            .dangerous_signatures
            .iter()
            .map(|sig| {
                RegexBuilder::new(sig).multi_line(true).build().map_err(|e| {
                    crate::domain::SentinelError::config(format!(
                        "Invalid dangerous signature '{sig}': {e}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            degenerate_regexes: config
                .tables
                .degenerate_regexes
                .iter()
                .map(|p| p.trim().to_string())
                .collect(),
            broad_globs: config.tables.broad_globs.iter().cloned().collect(),
            allowed_commands: config.tables.allowed_commands.iter().cloned().collect(),
            danger_signatures,
            checker,
            reason_snippet_chars: config.limits.value_snippet_chars,
        })
    }

    /// Name of the active syntax checker, recorded in the report
    pub fn checker_name(&self) -> &'static str {
        self.checker.name()
    }

    /// Validate a regex pattern for correctness and usefulness. `intent` is
    /// the pattern's declared purpose, used for logging only.
    pub fn validate_regex(&self, pattern: &str, intent: &str, ctx: &mut RunContext) -> Verdict {
        ctx.stats.note_checked(GrammarKind::Regex);
        let verdict = self.regex_verdict(pattern);
        if !verdict.is_valid() {
            ctx.stats.note_invalid(GrammarKind::Regex);
            tracing::debug!("invalid regex for {intent}: {}", verdict.reason);
        }
        verdict
    }

    fn regex_verdict(&self, pattern: &str) -> Verdict {
        if pattern.trim().is_empty() {
            return Verdict::fail(IssueKind::EmptyValue, "Empty pattern");
        }

        let trimmed = pattern.trim();
        if self.degenerate_regexes.contains(trimmed) {
            return Verdict::fail(
                IssueKind::OverlyBroad,
                format!("Pattern '{trimmed}' matches everything - too broad"),
            );
        }

        match Regex::new(pattern) {
            Ok(_) => Verdict::pass(),
            Err(e) => Verdict::fail(
                IssueKind::InvalidSyntax,
                format!(
                    "Invalid regex syntax: {}",
                    crate::domain::snippet(&e.to_string(), self.reason_snippet_chars)
                ),
            ),
        }
    }

    /// Validate a filesystem glob pattern
    pub fn validate_glob(&self, glob_pattern: &str, ctx: &mut RunContext) -> Verdict {
        ctx.stats.note_checked(GrammarKind::Glob);
        let verdict = self.glob_verdict(glob_pattern);
        if !verdict.is_valid() {
            ctx.stats.note_invalid(GrammarKind::Glob);
        }
        verdict
    }

    fn glob_verdict(&self, glob_pattern: &str) -> Verdict {
        if glob_pattern.trim().is_empty() {
            return Verdict::fail(IssueKind::EmptyValue, "Empty glob pattern");
        }

        if self.broad_globs.contains(glob_pattern) {
            return Verdict::fail(
                IssueKind::TooBroad,
                format!("Glob '{glob_pattern}' is too broad - will match all files"),
            );
        }

        if glob_pattern.matches('{').count() != glob_pattern.matches('}').count() {
            return Verdict::fail(
                IssueKind::UnbalancedDelimiters,
                "Unbalanced braces in glob pattern",
            );
        }
        if glob_pattern.matches('[').count() != glob_pattern.matches(']').count() {
            return Verdict::fail(
                IssueKind::UnbalancedDelimiters,
                "Unbalanced brackets in glob pattern",
            );
        }

        match glob::Pattern::new(glob_pattern) {
            Ok(_) => Verdict::pass(),
            Err(e) => Verdict::fail(
                IssueKind::InvalidSyntax,
                format!(
                    "Invalid glob syntax: {}",
                    crate::domain::snippet(&e.to_string(), self.reason_snippet_chars)
                ),
            ),
        }
    }

    /// Validate a shell script body
    pub async fn validate_script(&self, code: &str, ctx: &mut RunContext) -> Verdict {
        ctx.stats.note_checked(GrammarKind::Script);
        let verdict = self.script_verdict(code).await;
        if !verdict.is_valid() {
            ctx.stats.note_invalid(GrammarKind::Script);
        }
        verdict
    }

    /// Shared script body check: empty, then danger scan, then syntax. The
    /// danger scan is unconditional and takes precedence over syntax validity.
    async fn script_verdict(&self, code: &str) -> Verdict {
        if code.trim().is_empty() {
            return Verdict::fail(IssueKind::EmptyValue, "Empty script");
        }

        for signature in &self.danger_signatures {
            if signature.is_match(code) {
                return Verdict::fail(
                    IssueKind::Dangerous,
                    "DANGEROUS: rm -rf / or similar detected",
                );
            }
        }

        match self.checker.check(code).await {
            CheckOutcome::Valid => Verdict::pass(),
            CheckOutcome::Invalid(reason) => Verdict::fail(
                IssueKind::InvalidSyntax,
                crate::domain::snippet(&reason, self.reason_snippet_chars),
            ),
        }
    }

    /// Validate a single shell command line. Deliberately permissive:
    /// availability cannot be verified offline, so only clearly malformed or
    /// empty command fields fail.
    pub fn validate_command(&self, command: &str, ctx: &mut RunContext) -> Verdict {
        ctx.stats.note_checked(GrammarKind::Command);
        let verdict = self.command_verdict(command);
        if !verdict.is_valid() {
            ctx.stats.note_invalid(GrammarKind::Command);
        }
        verdict
    }

    fn command_verdict(&self, command: &str) -> Verdict {
        let mut cleaned = command.trim();
        if cleaned.is_empty() {
            return Verdict::fail(IssueKind::EmptyValue, "Empty command");
        }

        // Peel leading shell punctuation before taking the first token
        for prefix in ['(', '$', '{'] {
            if let Some(rest) = cleaned.strip_prefix(prefix) {
                cleaned = rest;
            }
        }

        let first_word = cleaned.split_whitespace().next().unwrap_or("");
        let mut token = first_word.trim_start_matches(['|', '&', ';', '!']);

        // Unwrap command substitution markers
        if let Some(rest) = token.strip_prefix("$(") {
            token = rest.split_whitespace().next().unwrap_or("");
        }
        if let Some(rest) = token.strip_prefix('`') {
            token = rest.split_whitespace().next().unwrap_or("");
        }

        let token = token.trim_matches(['(', ')', '{', '}', '[', ']', '`', '$']);

        if token.is_empty() {
            // Pure shell construct, assume valid
            return Verdict::pass();
        }

        if self.allowed_commands.contains(token) {
            return Verdict::pass();
        }

        // Paths to executables and sourced files
        if token.starts_with('/') || token.starts_with("./") {
            return Verdict::pass();
        }
        if token.starts_with('.') || token == "source" {
            return Verdict::pass();
        }

        // Environment variable assignments
        if token.contains('=') && !token.starts_with('=') {
            return Verdict::pass();
        }

        // Unknown but not obviously wrong, assume valid
        Verdict::pass()
    }

    /// Validate a closeout-checklist verification entry
    pub async fn validate_verification(&self, value: &Value, ctx: &mut RunContext) -> Verdict {
        ctx.stats.note_checked(GrammarKind::Verification);
        let verdict = self.verification_verdict(value).await;
        if !verdict.is_valid() {
            ctx.stats.note_invalid(GrammarKind::Verification);
        }
        verdict
    }

    async fn verification_verdict(&self, value: &Value) -> Verdict {
        match value.as_str() {
            Some("manual") | Some("automated") => Verdict::pass(),
            Some(body) => match self.script_verdict(body).await {
                verdict if verdict.is_valid() => Verdict::pass(),
                verdict => Verdict::fail(
                    verdict.kind.unwrap_or(IssueKind::InvalidSyntax),
                    format!("Verification: {}", verdict.reason),
                ),
            },
            // Correctness of non-string values is out of scope for this checker
            None => Verdict::pass(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::shell::MinimalChecker;
    use async_trait::async_trait;
    use rstest::rstest;

    /// Checker that fails everything, for precedence tests
    struct RejectingChecker;

    #[async_trait]
    impl SyntaxChecker for RejectingChecker {
        fn name(&self) -> &'static str {
            "rejecting"
        }

        async fn check(&self, _script: &str) -> CheckOutcome {
            CheckOutcome::Invalid("rejected by test checker".to_string())
        }
    }

    fn validators() -> GrammarValidators {
        GrammarValidators::new(&SentinelConfig::default(), Box::new(MinimalChecker)).unwrap()
    }

    fn rejecting_validators() -> GrammarValidators {
        GrammarValidators::new(&SentinelConfig::default(), Box::new(RejectingChecker)).unwrap()
    }

    #[rstest]
    #[case(".")]
    #[case(".*")]
    #[case(".+")]
    #[case("  .*  ")]
    fn test_degenerate_regexes_are_overly_broad(#[case] pattern: &str) {
        let mut ctx = RunContext::new();
        let verdict = validators().validate_regex(pattern, "code_patterns[0]", &mut ctx);
        assert_eq!(verdict.kind, Some(IssueKind::OverlyBroad));
        assert_eq!(ctx.stats.patterns.checked, 1);
        assert_eq!(ctx.stats.patterns.invalid, 1);
    }

    #[test]
    fn test_regex_empty_and_invalid() {
        let validators = validators();
        let mut ctx = RunContext::new();

        let verdict = validators.validate_regex("   ", "p", &mut ctx);
        assert_eq!(verdict.kind, Some(IssueKind::EmptyValue));

        let verdict = validators.validate_regex("(unclosed", "p", &mut ctx);
        assert_eq!(verdict.kind, Some(IssueKind::InvalidSyntax));
        assert!(verdict.reason.starts_with("Invalid regex syntax:"));

        let verdict = validators.validate_regex(r"session\.create\(", "p", &mut ctx);
        assert!(verdict.is_valid());

        assert_eq!(ctx.stats.patterns.checked, 3);
        assert_eq!(ctx.stats.patterns.invalid, 2);
    }

    #[rstest]
    #[case("*")]
    #[case("**")]
    #[case("**/*")]
    fn test_broad_globs(#[case] pattern: &str) {
        let mut ctx = RunContext::new();
        let verdict = validators().validate_glob(pattern, &mut ctx);
        assert_eq!(verdict.kind, Some(IssueKind::TooBroad));
    }

    #[test]
    fn test_glob_verdicts() {
        let validators = validators();
        let mut ctx = RunContext::new();

        assert!(validators.validate_glob("**/*.py", &mut ctx).is_valid());
        assert!(validators.validate_glob("src/[!t]*/*.rs", &mut ctx).is_valid());

        let verdict = validators.validate_glob("src/{a,b", &mut ctx);
        assert_eq!(verdict.kind, Some(IssueKind::UnbalancedDelimiters));

        let verdict = validators.validate_glob("src/[ab", &mut ctx);
        assert_eq!(verdict.kind, Some(IssueKind::UnbalancedDelimiters));

        let verdict = validators.validate_glob("", &mut ctx);
        assert_eq!(verdict.kind, Some(IssueKind::EmptyValue));

        assert_eq!(ctx.stats.globs.checked, 5);
        assert_eq!(ctx.stats.globs.invalid, 3);
    }

    #[tokio::test]
    async fn test_script_danger_scan() {
        let validators = validators();
        let mut ctx = RunContext::new();

        let verdict = validators.validate_script("rm -rf /", &mut ctx).await;
        assert_eq!(verdict.kind, Some(IssueKind::Dangerous));

        let verdict = validators
            .validate_script("cleanup() {\n  rm -rf /\n}\ncleanup", &mut ctx)
            .await;
        assert_eq!(verdict.kind, Some(IssueKind::Dangerous));

        // Scoped deletion is not flagged
        let verdict = validators.validate_script("rm -rf /tmp/scratch", &mut ctx).await;
        assert!(verdict.is_valid());
    }

    #[tokio::test]
    async fn test_danger_takes_precedence_over_syntax() {
        let validators = rejecting_validators();
        let mut ctx = RunContext::new();

        let verdict = validators.validate_script("rm -rf / ; echo '", &mut ctx).await;
        assert_eq!(verdict.kind, Some(IssueKind::Dangerous));
    }

    #[tokio::test]
    async fn test_script_empty_and_syntax() {
        let validators = rejecting_validators();
        let mut ctx = RunContext::new();

        let verdict = validators.validate_script("", &mut ctx).await;
        assert_eq!(verdict.kind, Some(IssueKind::EmptyValue));

        let verdict = validators.validate_script("echo ok", &mut ctx).await;
        assert_eq!(verdict.kind, Some(IssueKind::InvalidSyntax));
        assert_eq!(verdict.reason, "rejected by test checker");

        assert_eq!(ctx.stats.scripts.checked, 2);
        assert_eq!(ctx.stats.scripts.invalid, 2);
    }

    #[rstest]
    #[case("grep -rn pattern src/")]
    #[case("$(date +%s)")]
    #[case("`hostname`")]
    #[case("FOO=bar run-something")]
    #[case("./scripts/check.sh")]
    #[case("/usr/local/bin/custom-tool")]
    #[case("source env.sh")]
    #[case("| sort | uniq -c")]
    #[case("some-unknown-tool --flag")]
    fn test_commands_pass(#[case] command: &str) {
        let mut ctx = RunContext::new();
        assert!(validators().validate_command(command, &mut ctx).is_valid());
    }

    #[test]
    fn test_empty_command_fails() {
        let mut ctx = RunContext::new();
        let verdict = validators().validate_command("   ", &mut ctx);
        assert_eq!(verdict.kind, Some(IssueKind::EmptyValue));
        assert_eq!(ctx.stats.commands.invalid, 1);
    }

    #[tokio::test]
    async fn test_verification_sentinels_always_pass() {
        // Even a checker that rejects everything cannot fail the sentinels
        let validators = rejecting_validators();
        let mut ctx = RunContext::new();

        let manual = Value::String("manual".to_string());
        let automated = Value::String("automated".to_string());
        assert!(validators.validate_verification(&manual, &mut ctx).await.is_valid());
        assert!(validators.validate_verification(&automated, &mut ctx).await.is_valid());

        assert_eq!(ctx.stats.verifications.checked, 2);
        assert_eq!(ctx.stats.verifications.invalid, 0);
    }

    #[tokio::test]
    async fn test_verification_delegates_to_script_check() {
        let validators = validators();
        let mut ctx = RunContext::new();

        let command = Value::String("grep -q rotate src/session.py".to_string());
        assert!(validators.validate_verification(&command, &mut ctx).await.is_valid());

        let broken = Value::String("echo 'unterminated".to_string());
        let verdict = validators.validate_verification(&broken, &mut ctx).await;
        assert_eq!(verdict.kind, Some(IssueKind::InvalidSyntax));
        assert!(verdict.reason.starts_with("Verification:"));

        // Script counters are untouched; these count against verifications
        assert_eq!(ctx.stats.scripts.checked, 0);
        assert_eq!(ctx.stats.verifications.checked, 2);
        assert_eq!(ctx.stats.verifications.invalid, 1);
    }

    #[tokio::test]
    async fn test_verification_non_string_passes() {
        let validators = validators();
        let mut ctx = RunContext::new();
        let value = Value::Bool(true);
        assert!(validators.validate_verification(&value, &mut ctx).await.is_valid());
    }

    #[test]
    fn test_context_merge_preserves_order() {
        let mut a = RunContext::new();
        a.record(
            Finding::new(
                IssueKind::OverlyBroad,
                "first.audit",
                "a.yaml".into(),
                "broad",
            ),
        );

        let mut b = RunContext::new();
        b.record(
            Finding::new(
                IssueKind::TooBroad,
                "second.audit",
                "b.yaml".into(),
                "broad glob",
            ),
        );
        b.stats.note_checked(GrammarKind::Glob);

        a.merge(b);
        assert_eq!(a.issues.len(), 2);
        assert_eq!(a.issues[0].audit_id, "first.audit");
        assert_eq!(a.issues[1].audit_id, "second.audit");
        assert_eq!(a.stats.globs.checked, 1);
    }
}
