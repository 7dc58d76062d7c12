//! Agent-readiness scoring for audit specification documents
//!
//! Architecture: Domain Services - Scoring is a pure, total function per document
//! - Base score from the declared automation level, fixed penalties per blocker,
//!   a bonus for executable commands, then descending threshold mapping
//! - Never fails: missing or out-of-range inputs default to the
//!   unspecified/no-blocker case
//! - Also emits readiness findings so both passes share severity semantics

use crate::config::ValidationTables;
use crate::document::AuditDocument;
use crate::domain::{FieldPath, Finding, IssueKind};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Closeout items quoted per document in manual-verification findings
const MANUAL_CLOSEOUT_FINDING_CAP: usize = 3;

/// Declared automation level, normalized from the `execution.automatable` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AutomationLevel {
    Full,
    Partial,
    Manual,
    Unspecified,
}

impl AutomationLevel {
    /// Normalize the raw field value; anything unrecognized is unspecified
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => Self::Full,
            Some(Value::Bool(false)) => Self::Manual,
            Some(Value::String(s)) => match s.as_str() {
                "yes" | "full" | "true" => Self::Full,
                "partial" | "hybrid" => Self::Partial,
                "no" | "manual" | "false" => Self::Manual,
                _ => Self::Unspecified,
            },
            _ => Self::Unspecified,
        }
    }

    /// Base numeric score for readiness computation
    fn base_score(self) -> f64 {
        match self {
            Self::Full => 4.0,
            Self::Partial => 3.0,
            Self::Unspecified => 2.0,
            Self::Manual => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
            Self::Manual => "manual",
            Self::Unspecified => "unspecified",
        }
    }
}

/// The four-level readiness classification, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessCategory {
    RequiresHuman,
    PartiallyAutomatable,
    MostlyAutomatable,
    FullyAutomatable,
}

impl ReadinessCategory {
    /// Map a numeric score to a category. Thresholds are evaluated from the
    /// highest down with `>=`, so ties resolve to the higher category.
    fn from_score(score: f64) -> Self {
        if score >= 4.0 {
            Self::FullyAutomatable
        } else if score >= 3.0 {
            Self::MostlyAutomatable
        } else if score >= 2.0 {
            Self::PartiallyAutomatable
        } else {
            Self::RequiresHuman
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequiresHuman => "requires_human",
            Self::PartiallyAutomatable => "partially_automatable",
            Self::MostlyAutomatable => "mostly_automatable",
            Self::FullyAutomatable => "fully_automatable",
        }
    }
}

/// Boolean facts that block full automation of a document
#[derive(Debug, Clone, Default)]
pub struct ManualBlockers {
    /// Closeout items with `verification: manual`, as (index, item label)
    pub manual_verification: Vec<(usize, String)>,
    /// Manual-blocker phrases found in the document text
    pub human_language: Vec<String>,
    /// The audit declares it needs a runtime environment
    pub requires_runtime: bool,
    /// The audit declares itself destructive
    pub destructive: bool,
}

/// Compute the readiness category. Pure and total; base score, fixed
/// penalties, command bonus, threshold mapping - nothing else.
pub fn score(
    automation: AutomationLevel,
    blockers: &ManualBlockers,
    has_commands: bool,
) -> ReadinessCategory {
    let mut score = automation.base_score();

    if !blockers.manual_verification.is_empty() {
        score -= 1.0;
    }
    if !blockers.human_language.is_empty() {
        score -= 0.5;
    }
    if blockers.requires_runtime {
        score -= 0.5;
    }
    if blockers.destructive {
        score -= 0.5;
    }
    if has_commands {
        score += 0.5;
    }

    ReadinessCategory::from_score(score)
}

/// Full readiness result for one document
#[derive(Debug, Clone)]
pub struct ReadinessAssessment {
    pub category: ReadinessCategory,
    pub automation: AutomationLevel,
    pub has_commands: bool,
    pub issues: Vec<Finding>,
}

/// Assess one document: detect blockers, score it, and emit readiness findings
pub fn assess(doc: &AuditDocument, tables: &ValidationTables) -> ReadinessAssessment {
    let automation =
        AutomationLevel::from_value(doc.tree().get("execution").and_then(|e| e.get("automatable")));
    let blockers = detect_blockers(doc, tables);
    let has_commands = has_step_commands(doc);
    let category = score(automation, &blockers, has_commands);
    let issues = readiness_issues(doc, automation, &blockers);

    tracing::debug!(
        "Scored '{}' as {} (automation level {})",
        doc.id(),
        category.as_str(),
        automation.as_str()
    );

    ReadinessAssessment { category, automation, has_commands, issues }
}

/// Detect the manual-blocker facts for one document
fn detect_blockers(doc: &AuditDocument, tables: &ValidationTables) -> ManualBlockers {
    let mut blockers = ManualBlockers::default();

    if let Some(items) = doc.tree().get("closeout_checklist").and_then(Value::as_sequence) {
        for (i, item) in items.iter().enumerate() {
            let Some(mapping) = item.as_mapping() else { continue };
            if mapping.get("verification").and_then(Value::as_str) == Some("manual") {
                let label = mapping
                    .get("item")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown checklist item")
                    .to_string();
                blockers.manual_verification.push((i, label));
            }
        }
    }

    let text = doc.raw().to_lowercase();
    for phrase in &tables.manual_blocker_phrases {
        if text.contains(phrase.as_str()) {
            blockers.human_language.push(phrase.clone());
        }
    }

    if let Some(audit) = doc.tree().get("audit") {
        blockers.requires_runtime =
            audit.get("requires_runtime").and_then(Value::as_bool).unwrap_or(false);
        blockers.destructive = audit.get("destructive").and_then(Value::as_bool).unwrap_or(false);
    }

    blockers
}

/// Whether at least one procedure step carries an executable command
fn has_step_commands(doc: &AuditDocument) -> bool {
    let Some(steps) = doc
        .tree()
        .get("procedure")
        .and_then(|p| p.get("steps"))
        .and_then(Value::as_sequence)
    else {
        return false;
    };

    steps.iter().any(|step| {
        step.get("commands")
            .and_then(Value::as_sequence)
            .map(|commands| !commands.is_empty())
            .unwrap_or(false)
    })
}

/// Steps that carry neither commands nor a verification hook
fn steps_without_automation(doc: &AuditDocument) -> usize {
    let Some(steps) = doc
        .tree()
        .get("procedure")
        .and_then(|p| p.get("steps"))
        .and_then(Value::as_sequence)
    else {
        return 0;
    };

    steps
        .iter()
        .filter(|step| step.as_mapping().is_some())
        .filter(|step| {
            let has_commands = step
                .get("commands")
                .and_then(Value::as_sequence)
                .map(|c| !c.is_empty())
                .unwrap_or(false);
            let has_verification = step.get("verification").is_some();
            !has_commands && !has_verification
        })
        .count()
}

/// Emit findings for automation problems the scorer observed
fn readiness_issues(
    doc: &AuditDocument,
    automation: AutomationLevel,
    blockers: &ManualBlockers,
) -> Vec<Finding> {
    let mut issues = Vec::new();
    let source = doc.source_path().to_path_buf();

    match automation {
        AutomationLevel::Unspecified => {
            issues.push(
                Finding::new(
                    IssueKind::AutomationUnspecified,
                    doc.id(),
                    source.clone(),
                    "Automation level not specified",
                )
                .with_field(FieldPath::root().key("execution").key("automatable"))
                .with_recommendation(
                    "Add execution.automatable field with value: full, partial, or manual",
                ),
            );
        }
        AutomationLevel::Manual => {
            issues.push(
                Finding::new(
                    IssueKind::ManualAudit,
                    doc.id(),
                    source.clone(),
                    "Audit marked as manual",
                )
                .with_field(FieldPath::root().key("execution").key("automatable"))
                .with_recommendation("Review if any steps can be automated"),
            );
        }
        _ => {}
    }

    for (index, label) in blockers.manual_verification.iter().take(MANUAL_CLOSEOUT_FINDING_CAP) {
        issues.push(
            Finding::new(
                IssueKind::ManualCloseout,
                doc.id(),
                source.clone(),
                "Closeout checklist requires manual verification",
            )
            .with_field(FieldPath::root().key("closeout_checklist").index(*index).key("verification"))
            .with_current(label.clone())
            .with_recommendation("Add automated verification command or script"),
        );
    }

    if blockers.destructive {
        issues.push(
            Finding::new(
                IssueKind::DestructiveAudit,
                doc.id(),
                source.clone(),
                "Audit marked as destructive",
            )
            .with_field(FieldPath::root().key("audit").key("destructive"))
            .with_recommendation(
                "Add safeguards or convert to dry-run mode with optional execution",
            ),
        );
    }

    if automation == AutomationLevel::Full {
        let bare_steps = steps_without_automation(doc);
        if bare_steps > 0 {
            issues.push(
                Finding::new(
                    IssueKind::StepsWithoutCommands,
                    doc.id(),
                    source,
                    format!("{bare_steps} procedure steps lack executable commands"),
                )
                .with_field(FieldPath::root().key("procedure").key("steps"))
                .with_recommendation("Add command templates for each step"),
            );
        }
    }

    issues
}

/// Corpus-wide readiness aggregates
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReadinessDistribution {
    pub fully_automatable: usize,
    pub mostly_automatable: usize,
    pub partially_automatable: usize,
    pub requires_human: usize,
}

impl ReadinessDistribution {
    pub fn add(&mut self, category: ReadinessCategory) {
        match category {
            ReadinessCategory::FullyAutomatable => self.fully_automatable += 1,
            ReadinessCategory::MostlyAutomatable => self.mostly_automatable += 1,
            ReadinessCategory::PartiallyAutomatable => self.partially_automatable += 1,
            ReadinessCategory::RequiresHuman => self.requires_human += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.fully_automatable
            + self.mostly_automatable
            + self.partially_automatable
            + self.requires_human
    }

    /// Fraction of documents fully or mostly automatable; 0.0 for an empty corpus
    pub fn ready_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.fully_automatable + self.mostly_automatable) as f64 / total as f64
        }
    }
}

/// Corpus-wide declared automation levels
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AutomationDistribution {
    pub full: usize,
    pub partial: usize,
    pub manual: usize,
    pub unspecified: usize,
}

impl AutomationDistribution {
    pub fn add(&mut self, level: AutomationLevel) {
        match level {
            AutomationLevel::Full => self.full += 1,
            AutomationLevel::Partial => self.partial += 1,
            AutomationLevel::Manual => self.manual += 1,
            AutomationLevel::Unspecified => self.unspecified += 1,
        }
    }
}
