//! Main analysis orchestrator for Audit Sentinel
//!
//! CDD Principle: Domain Services - Analyzer orchestrates the batch validation workflow
//! - Coordinates corpus discovery, field extraction, grammar routing, and scoring
//! - Fans out per-document work over a bounded pool; contexts merge at one barrier
//! - A failure in one field never aborts its document; a failure in one document
//!   never aborts the batch - only an unreadable corpus root is fatal

use crate::config::SentinelConfig;
use crate::document::{AuditDocument, FieldKind};
use crate::domain::{snippet, Finding, IssueKind, SentinelError, SentinelResult};
use crate::report::{DimensionReport, ReportBuilder};
use crate::scoring::{self, AutomationDistribution, AutomationLevel, ReadinessCategory, ReadinessDistribution};
use crate::validators::shell::{probe_checker, SyntaxChecker};
use crate::validators::{GrammarValidators, RunContext, Verdict};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

/// Main analyzer that orchestrates the entire validation run
#[derive(Clone)]
pub struct Analyzer {
    config: Arc<SentinelConfig>,
    validators: Arc<GrammarValidators>,
}

/// Options for customizing analysis behavior
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Whether to fan documents out over the worker pool
    pub parallel: bool,
    /// Maximum number of documents to analyze
    pub max_documents: Option<usize>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { parallel: true, max_documents: None }
    }
}

/// Everything one document contributes to the aggregation barrier
struct DocumentOutcome {
    ctx: RunContext,
    parse_failed: bool,
    readiness: Option<(ReadinessCategory, AutomationLevel)>,
}

impl Analyzer {
    /// Create an analyzer, probing for the external syntax checker once
    pub fn new(config: SentinelConfig) -> SentinelResult<Self> {
        let checker = probe_checker(
            config.limits.checker_timeout_secs,
            config.limits.max_checker_diagnostics,
        );
        Self::with_checker(config, checker)
    }

    /// Create an analyzer with an explicit syntax checker (skips the probe)
    pub fn with_checker(
        config: SentinelConfig,
        checker: Box<dyn SyntaxChecker>,
    ) -> SentinelResult<Self> {
        let validators = GrammarValidators::new(&config, checker)?;
        Ok(Self { config: Arc::new(config), validators: Arc::new(validators) })
    }

    /// Create an analyzer with default configuration
    pub fn with_defaults() -> SentinelResult<Self> {
        Self::new(SentinelConfig::default())
    }

    /// Name of the syntax checker selected at startup
    pub fn checker_name(&self) -> &'static str {
        self.validators.checker_name()
    }

    /// Run both passes over every document under the corpus root and build
    /// the aggregate report.
    pub async fn analyze_corpus(
        &self,
        root: &Path,
        options: &AnalysisOptions,
    ) -> SentinelResult<DimensionReport> {
        let mut files = self.discover_documents(root)?;
        if let Some(max) = options.max_documents {
            files.truncate(max);
        }

        tracing::info!("Analyzing {} documents under {}", files.len(), root.display());

        let outcomes = if options.parallel && files.len() > 1 {
            self.analyze_parallel(&files).await
        } else {
            self.analyze_sequential(&files).await
        };

        // Aggregation barrier: the only place run state is combined
        let mut merged = RunContext::new();
        let mut scores = ReadinessDistribution::default();
        let mut automation = AutomationDistribution::default();
        let mut parse_errors = 0usize;

        for outcome in outcomes {
            if outcome.parse_failed {
                parse_errors += 1;
            }
            if let Some((category, level)) = outcome.readiness {
                scores.add(category);
                automation.add(level);
            }
            merged.merge(outcome.ctx);
        }

        let report = ReportBuilder::new(
            self.config.limits.max_report_issues,
            self.validators.checker_name(),
        )
        .build(files.len(), parse_errors, merged.issues, merged.stats, scores, automation);

        Ok(report)
    }

    /// Validate a single document and return its findings
    pub async fn analyze_file(&self, path: &Path) -> Vec<Finding> {
        self.process_document(&path.to_path_buf()).await.ctx.issues
    }

    /// Enumerate documents under the corpus root in deterministic order
    fn discover_documents(&self, root: &Path) -> SentinelResult<Vec<PathBuf>> {
        // An unreadable root aborts the whole run
        std::fs::read_dir(root).map_err(|e| {
            SentinelError::corpus(root, format!("Cannot enumerate corpus root: {e}"))
        })?;

        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable corpus entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| self.config.corpus.extensions.iter().any(|e| e == ext))
                    .unwrap_or(false)
            })
            .collect();

        files.sort();
        Ok(files)
    }

    /// Sequential per-document processing
    async fn analyze_sequential(&self, files: &[PathBuf]) -> Vec<DocumentOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for path in files {
            outcomes.push(self.process_document(path).await);
        }
        outcomes
    }

    /// Bounded parallel fan-out. Results are reassembled in discovery order
    /// so repeat runs over an unchanged corpus are byte-identical.
    async fn analyze_parallel(&self, files: &[PathBuf]) -> Vec<DocumentOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.worker_count()));
        let mut join_set = JoinSet::new();

        for (index, path) in files.iter().enumerate() {
            let analyzer = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let path = path.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, analyzer.process_document(&path).await)
            });
        }

        let mut slots: Vec<Option<DocumentOutcome>> =
            std::iter::repeat_with(|| None).take(files.len()).collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => tracing::warn!("Worker task failed: {e}"),
            }
        }

        slots.into_iter().flatten().collect()
    }

    fn worker_count(&self) -> usize {
        if self.config.limits.worker_count > 0 {
            self.config.limits.worker_count
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        }
    }

    /// Load, extract, validate, and score one document
    async fn process_document(&self, path: &PathBuf) -> DocumentOutcome {
        let mut ctx = RunContext::new();
        let limits = self.config.limits;

        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) => {
                ctx.record(
                    Finding::new(
                        IssueKind::ParseError,
                        path.display().to_string(),
                        path.clone(),
                        format!("Failed to read file: {}", snippet(&e.to_string(), 100)),
                    )
                    .with_recommendation("Fix file permissions or encoding"),
                );
                return DocumentOutcome { ctx, parse_failed: true, readiness: None };
            }
        };

        let doc = match AuditDocument::parse(path.clone(), raw) {
            Ok(doc) => doc,
            Err(failure) => {
                ctx.record(
                    Finding::new(
                        IssueKind::ParseError,
                        path.display().to_string(),
                        path.clone(),
                        failure.message,
                    )
                    .with_current("Invalid document")
                    .with_recommendation("Fix document structure"),
                );
                return DocumentOutcome { ctx, parse_failed: true, readiness: None };
            }
        };

        // Validation pass: route every extracted field to its grammar
        for field in doc.extract_fields(&self.config.tables.shell_languages) {
            let locator = field.path.to_locator();
            let verdict = match field.kind {
                FieldKind::CodePattern | FieldKind::EvidencePattern => {
                    let pattern = field.value.as_str().unwrap_or_default();
                    self.validators.validate_regex(pattern, &locator, &mut ctx)
                }
                FieldKind::FilePattern => {
                    let glob = field.value.as_str().unwrap_or_default();
                    self.validators.validate_glob(glob, &mut ctx)
                }
                FieldKind::Script => {
                    let code = field.value.as_str().unwrap_or_default();
                    self.validators.validate_script(code, &mut ctx).await
                }
                FieldKind::Command => {
                    let command = field.value.as_str().unwrap_or_default();
                    self.validators.validate_command(command, &mut ctx)
                }
                FieldKind::Verification => {
                    self.validators.validate_verification(&field.value, &mut ctx).await
                }
            };

            if let Some(kind) = verdict.kind {
                ctx.record(self.field_finding(&doc, field.kind, kind, &verdict, field, limits));
            }
        }

        // Scoring pass over the same document
        let assessment = scoring::assess(&doc, &self.config.tables);
        ctx.issues.extend(assessment.issues);

        DocumentOutcome {
            ctx,
            parse_failed: false,
            readiness: Some((assessment.category, assessment.automation)),
        }
    }

    fn field_finding(
        &self,
        doc: &AuditDocument,
        field_kind: FieldKind,
        kind: IssueKind,
        verdict: &Verdict,
        field: crate::document::ExtractedField,
        limits: crate::config::RunLimits,
    ) -> Finding {
        let message = match field_kind {
            FieldKind::EvidencePattern => format!("Signal evidence pattern: {}", verdict.reason),
            _ => verdict.reason.clone(),
        };

        let current = field
            .value
            .as_str()
            .map(|s| snippet(s, limits.value_snippet_chars))
            .unwrap_or_default();

        Finding::new(kind, doc.id(), doc.source_path().to_path_buf(), message)
            .with_field(field.path)
            .with_current(current)
            .with_recommendation(recommendation(field_kind))
    }
}

/// Fixed remediation hint per field kind
fn recommendation(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::CodePattern => "Fix regex pattern syntax",
        FieldKind::EvidencePattern => "Fix regex pattern",
        FieldKind::FilePattern => "Fix glob pattern",
        FieldKind::Script => "Fix script syntax",
        FieldKind::Command => "Fix command",
        FieldKind::Verification => "Fix verification command",
    }
}
