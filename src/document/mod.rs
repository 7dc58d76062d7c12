//! Audit specification document model and field extraction
//!
//! Architecture: Anti-Corruption Layer - Raw YAML trees are translated into
//! typed extraction tuples at this boundary
//! - AuditDocument owns the parsed tree plus the raw text needed for phrase scans
//! - The extractor walks a fixed substructure order and yields (value, path, kind)
//! - Entries that are not well-formed mappings at the expected nesting are skipped;
//!   their absence is a completeness concern outside this crate's scope

use crate::domain::{FieldPath, GrammarKind};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Severity buckets under `signals`, walked in this order
const SIGNAL_LEVELS: [&str; 4] = ["critical", "high", "medium", "low"];

/// One parsed audit specification document
#[derive(Debug, Clone)]
pub struct AuditDocument {
    /// Corpus-relative path of the source file
    source_path: PathBuf,
    /// Logical identifier (`category.subcategory.name`), or the file stem
    id: String,
    /// Top-level category, `unknown` when absent
    category: String,
    /// Parsed document tree
    tree: Value,
    /// Raw source text, kept for manual-blocker phrase scanning
    raw: String,
}

/// Why a document could not be admitted to the validation pass
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub message: String,
}

/// The kind of field an extraction tuple came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `discovery.code_patterns[i].pattern`
    CodePattern,
    /// `discovery.file_patterns[i].glob`
    FilePattern,
    /// `tooling.scripts[i].code` with a shell language
    Script,
    /// `procedure.steps[i].commands[j].command`
    Command,
    /// `closeout_checklist[i].verification`
    Verification,
    /// `signals.<level>[i].evidence_pattern`
    EvidencePattern,
}

impl FieldKind {
    /// The grammar this field kind is validated against
    pub fn grammar(self) -> GrammarKind {
        match self {
            Self::CodePattern | Self::EvidencePattern => GrammarKind::Regex,
            Self::FilePattern => GrammarKind::Glob,
            Self::Script => GrammarKind::Script,
            Self::Command => GrammarKind::Command,
            Self::Verification => GrammarKind::Verification,
        }
    }
}

/// One value pulled out of a document, tagged with its structural location
#[derive(Debug, Clone)]
pub struct ExtractedField {
    pub path: FieldPath,
    pub kind: FieldKind,
    pub value: Value,
}

impl AuditDocument {
    /// Parse raw YAML into a document. Parse failures and documents missing
    /// their identifying `audit` section are rejected; the caller turns the
    /// rejection into a file-scoped critical finding.
    pub fn parse(source_path: PathBuf, raw: String) -> Result<Self, ParseFailure> {
        let tree: Value = serde_yaml::from_str(&raw).map_err(|e| ParseFailure {
            message: format!("YAML parse error: {}", truncate(&e.to_string(), 100)),
        })?;

        let audit = tree.get("audit").and_then(Value::as_mapping).ok_or(ParseFailure {
            message: "Missing identifying 'audit' section".to_string(),
        })?;

        let stem = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.display().to_string());

        let id = audit
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(stem);

        let category = audit
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        Ok(Self { source_path, id, category, tree, raw })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Walk the document's substructures in fixed order and yield every
    /// occurrence of the five checked field kinds.
    pub fn extract_fields(&self, shell_languages: &[String]) -> Vec<ExtractedField> {
        let mut fields = Vec::new();

        self.extract_code_patterns(&mut fields);
        self.extract_file_patterns(&mut fields);
        self.extract_scripts(shell_languages, &mut fields);
        self.extract_step_commands(&mut fields);
        self.extract_verifications(&mut fields);
        self.extract_evidence_patterns(&mut fields);

        fields
    }

    fn extract_code_patterns(&self, out: &mut Vec<ExtractedField>) {
        let Some(patterns) = self
            .tree
            .get("discovery")
            .and_then(|d| d.get("code_patterns"))
            .and_then(Value::as_sequence)
        else {
            return;
        };

        for (i, entry) in patterns.iter().enumerate() {
            let Some(mapping) = entry.as_mapping() else { continue };
            let declared = mapping.get("type").and_then(Value::as_str).unwrap_or("regex");
            if declared != "regex" {
                continue;
            }
            if let Some(pattern) = mapping.get("pattern") {
                if pattern.is_string() {
                    out.push(ExtractedField {
                        path: FieldPath::root()
                            .key("discovery")
                            .key("code_patterns")
                            .index(i)
                            .key("pattern"),
                        kind: FieldKind::CodePattern,
                        value: pattern.clone(),
                    });
                }
            }
        }
    }

    fn extract_file_patterns(&self, out: &mut Vec<ExtractedField>) {
        let Some(patterns) = self
            .tree
            .get("discovery")
            .and_then(|d| d.get("file_patterns"))
            .and_then(Value::as_sequence)
        else {
            return;
        };

        for (i, entry) in patterns.iter().enumerate() {
            let Some(mapping) = entry.as_mapping() else { continue };
            if let Some(glob) = mapping.get("glob") {
                if glob.is_string() {
                    out.push(ExtractedField {
                        path: FieldPath::root()
                            .key("discovery")
                            .key("file_patterns")
                            .index(i)
                            .key("glob"),
                        kind: FieldKind::FilePattern,
                        value: glob.clone(),
                    });
                }
            }
        }
    }

    fn extract_scripts(&self, shell_languages: &[String], out: &mut Vec<ExtractedField>) {
        let Some(scripts) = self
            .tree
            .get("tooling")
            .and_then(|t| t.get("scripts"))
            .and_then(Value::as_sequence)
        else {
            return;
        };

        for (i, entry) in scripts.iter().enumerate() {
            let Some(mapping) = entry.as_mapping() else { continue };
            let language = mapping.get("language").and_then(Value::as_str).unwrap_or("bash");
            if !shell_languages.iter().any(|l| l == language) {
                continue;
            }
            if let Some(code) = mapping.get("code") {
                if code.is_string() {
                    out.push(ExtractedField {
                        path: FieldPath::root().key("tooling").key("scripts").index(i).key("code"),
                        kind: FieldKind::Script,
                        value: code.clone(),
                    });
                }
            }
        }
    }

    fn extract_step_commands(&self, out: &mut Vec<ExtractedField>) {
        let Some(steps) = self
            .tree
            .get("procedure")
            .and_then(|p| p.get("steps"))
            .and_then(Value::as_sequence)
        else {
            return;
        };

        for (i, step) in steps.iter().enumerate() {
            let Some(commands) = step.get("commands").and_then(Value::as_sequence) else {
                continue;
            };
            for (j, entry) in commands.iter().enumerate() {
                let Some(mapping) = entry.as_mapping() else { continue };
                if let Some(command) = mapping.get("command") {
                    if command.is_string() {
                        out.push(ExtractedField {
                            path: FieldPath::root()
                                .key("procedure")
                                .key("steps")
                                .index(i)
                                .key("commands")
                                .index(j)
                                .key("command"),
                            kind: FieldKind::Command,
                            value: command.clone(),
                        });
                    }
                }
            }
        }
    }

    fn extract_verifications(&self, out: &mut Vec<ExtractedField>) {
        let Some(items) = self.tree.get("closeout_checklist").and_then(Value::as_sequence) else {
            return;
        };

        for (i, item) in items.iter().enumerate() {
            let Some(mapping) = item.as_mapping() else { continue };
            if let Some(verification) = mapping.get("verification") {
                // Non-string values are yielded too; the validator passes them
                out.push(ExtractedField {
                    path: FieldPath::root().key("closeout_checklist").index(i).key("verification"),
                    kind: FieldKind::Verification,
                    value: verification.clone(),
                });
            }
        }
    }

    fn extract_evidence_patterns(&self, out: &mut Vec<ExtractedField>) {
        let Some(signals) = self.tree.get("signals") else { return };

        for level in SIGNAL_LEVELS {
            let Some(entries) = signals.get(level).and_then(Value::as_sequence) else {
                continue;
            };
            for (i, entry) in entries.iter().enumerate() {
                let Some(mapping) = entry.as_mapping() else { continue };
                if let Some(pattern) = mapping.get("evidence_pattern") {
                    if pattern.is_string() {
                        out.push(ExtractedField {
                            path: FieldPath::root()
                                .key("signals")
                                .key(level)
                                .index(i)
                                .key("evidence_pattern"),
                            kind: FieldKind::EvidencePattern,
                            value: pattern.clone(),
                        });
                    }
                }
            }
        }
    }
}

fn truncate(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        message.to_string()
    } else {
        message.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_langs() -> Vec<String> {
        vec!["bash".to_string(), "sh".to_string(), "shell".to_string()]
    }

    const SAMPLE: &str = r#"
audit:
  id: security.auth.session
  category: security
discovery:
  code_patterns:
    - pattern: "session\\.create"
      type: regex
    - pattern: "literal-search"
      type: literal
  file_patterns:
    - glob: "**/*.py"
tooling:
  scripts:
    - id: find_sessions
      language: bash
      code: "grep -rn 'session' src/"
    - id: helper
      language: python
      code: "print('skip me')"
procedure:
  steps:
    - name: enumerate
      commands:
        - command: "grep -c session src/app.py"
    - name: review
closeout_checklist:
  - item: sessions rotated
    verification: manual
  - item: automated scan ran
    verification: "grep -q rotate src/session.py"
signals:
  critical:
    - evidence_pattern: "session_secret\\s*="
  low:
    - evidence_pattern: "debug_session"
"#;

    #[test]
    fn test_parse_reads_identity() {
        let doc =
            AuditDocument::parse(PathBuf::from("security/session.yaml"), SAMPLE.to_string())
                .unwrap();
        assert_eq!(doc.id(), "security.auth.session");
        assert_eq!(doc.category(), "security");
    }

    #[test]
    fn test_parse_falls_back_to_stem() {
        let raw = "audit:\n  category: ops\n";
        let doc = AuditDocument::parse(PathBuf::from("ops/rotation.yaml"), raw.to_string()).unwrap();
        assert_eq!(doc.id(), "rotation");
        assert_eq!(doc.category(), "ops");
    }

    #[test]
    fn test_parse_rejects_invalid_yaml() {
        let failure =
            AuditDocument::parse(PathBuf::from("bad.yaml"), "foo: [unclosed".to_string())
                .unwrap_err();
        assert!(failure.message.contains("YAML parse error"));
    }

    #[test]
    fn test_parse_rejects_missing_audit_section() {
        let failure =
            AuditDocument::parse(PathBuf::from("bad.yaml"), "discovery: {}".to_string())
                .unwrap_err();
        assert!(failure.message.contains("audit"));
    }

    #[test]
    fn test_extraction_order_and_kinds() {
        let doc = AuditDocument::parse(PathBuf::from("sample.yaml"), SAMPLE.to_string()).unwrap();
        let fields = doc.extract_fields(&shell_langs());

        let kinds: Vec<FieldKind> = fields.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::CodePattern,
                FieldKind::FilePattern,
                FieldKind::Script,
                FieldKind::Command,
                FieldKind::Verification,
                FieldKind::Verification,
                FieldKind::EvidencePattern,
                FieldKind::EvidencePattern,
            ]
        );

        // Non-regex code patterns and non-shell scripts are skipped
        assert_eq!(fields[0].value.as_str(), Some("session\\.create"));
        assert_eq!(fields[2].value.as_str(), Some("grep -rn 'session' src/"));
    }

    #[test]
    fn test_extracted_paths_resolve_to_their_values() {
        let doc = AuditDocument::parse(PathBuf::from("sample.yaml"), SAMPLE.to_string()).unwrap();

        for field in doc.extract_fields(&shell_langs()) {
            let resolved = field.path.resolve(doc.tree()).unwrap_or_else(|| {
                panic!("path {} did not resolve", field.path.to_locator())
            });
            assert_eq!(resolved, &field.value, "path {}", field.path.to_locator());

            // Locator strings parse back to the same path
            let reparsed = FieldPath::parse(&field.path.to_locator()).unwrap();
            assert_eq!(reparsed, field.path);
        }
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let raw = r#"
audit:
  id: a.b.c
discovery:
  code_patterns:
    - "bare string, not a mapping"
    - pattern: "ok"
closeout_checklist: "not a sequence"
"#;
        let doc = AuditDocument::parse(PathBuf::from("odd.yaml"), raw.to_string()).unwrap();
        let fields = doc.extract_fields(&shell_langs());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].path.to_locator(), "discovery.code_patterns[1].pattern");
    }
}
