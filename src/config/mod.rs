//! Configuration loading and management for Audit Sentinel
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Allow-lists, blocklists, and blocker phrases are data tables, not control flow
//! - Default tables are embedded in the domain, not infrastructure
//! - Validators receive the tables by reference and never hard-code a literal

use crate::domain::{SentinelError, SentinelResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration structure for Audit Sentinel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,
    /// Corpus discovery settings
    #[serde(default)]
    pub corpus: CorpusConfig,
    /// Named validation tables, extensible without touching validator logic
    #[serde(default)]
    pub tables: ValidationTables,
    /// Bounds applied during a run
    #[serde(default)]
    pub limits: RunLimits,
}

/// Corpus discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// File extensions treated as audit specification documents
    pub extensions: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self { extensions: vec!["yaml".to_string(), "yml".to_string()] }
    }
}

/// The fixed allow/block tables used by the grammar validators and the scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationTables {
    /// Command names accepted by the command validator
    pub allowed_commands: Vec<String>,
    /// Regex signatures of destructive shell commands; any match fails a script
    pub dangerous_signatures: Vec<String>,
    /// Phrases whose presence marks a document as needing human judgment
    pub manual_blocker_phrases: Vec<String>,
    /// Regex patterns rejected as matching virtually everything
    pub degenerate_regexes: Vec<String>,
    /// Globs rejected as matching the entire corpus
    pub broad_globs: Vec<String>,
    /// Script languages routed to the shell-script validator
    pub shell_languages: Vec<String>,
}

impl Default for ValidationTables {
    fn default() -> Self {
        Self {
            allowed_commands: default_allowed_commands(),
            dangerous_signatures: default_dangerous_signatures(),
            manual_blocker_phrases: default_manual_blocker_phrases(),
            degenerate_regexes: vec![
                ".".to_string(),
                ".*".to_string(),
                ".+".to_string(),
                "^.*$".to_string(),
                "^.+$".to_string(),
            ],
            broad_globs: vec!["*".to_string(), "**".to_string(), "**/*".to_string()],
            shell_languages: vec!["bash".to_string(), "sh".to_string(), "shell".to_string()],
        }
    }
}

/// Bounds applied during a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunLimits {
    /// Wall-clock bound for one external checker invocation, in seconds
    pub checker_timeout_secs: u64,
    /// Maximum characters of a field value quoted in a finding
    pub value_snippet_chars: usize,
    /// Maximum checker diagnostics joined into one failure reason
    pub max_checker_diagnostics: usize,
    /// Issue list cap in the final report; truncation is flagged, never silent
    pub max_report_issues: usize,
    /// Worker pool size; 0 means one worker per available core
    pub worker_count: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            checker_timeout_secs: 10,
            value_snippet_chars: 100,
            max_checker_diagnostics: 3,
            max_report_issues: 100,
            worker_count: 0,
        }
    }
}

impl SentinelConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SentinelResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            SentinelError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            SentinelError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> SentinelResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| SentinelError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Get default configuration with built-in tables
    pub fn with_defaults() -> Self {
        Self {
            version: default_version(),
            corpus: CorpusConfig::default(),
            tables: ValidationTables::default(),
            limits: RunLimits::default(),
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> SentinelResult<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            return Err(SentinelError::config(format!(
                "Unsupported configuration version: {}. Supported versions: 1.0",
                self.version
            )));
        }

        if self.corpus.extensions.is_empty() {
            return Err(SentinelError::config(
                "corpus.extensions must name at least one document extension".to_string(),
            ));
        }

        for (name, table) in [
            ("tables.dangerous_signatures", &self.tables.dangerous_signatures),
            ("tables.degenerate_regexes", &self.tables.degenerate_regexes),
            ("tables.broad_globs", &self.tables.broad_globs),
            ("tables.shell_languages", &self.tables.shell_languages),
        ] {
            if table.is_empty() {
                return Err(SentinelError::config(format!("{name} must not be empty")));
            }
        }

        // Dangerous signatures are applied as regexes; reject ones that cannot compile
        for signature in &self.tables.dangerous_signatures {
            regex::Regex::new(signature).map_err(|e| {
                SentinelError::config(format!("Invalid dangerous signature '{signature}': {e}"))
            })?;
        }

        if self.limits.checker_timeout_secs == 0 {
            return Err(SentinelError::config(
                "limits.checker_timeout_secs must be positive".to_string(),
            ));
        }

        if self.limits.max_report_issues == 0 {
            return Err(SentinelError::config(
                "limits.max_report_issues must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Convert to JSON for serialization
    pub fn to_json(&self) -> SentinelResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SentinelError::config(format!("Failed to serialize config: {e}")))
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Common CLI tool names accepted without further checking. Command
/// availability cannot be verified offline, so this table only lets
/// well-known commands pass without noise.
fn default_allowed_commands() -> Vec<String> {
    [
        "grep", "find", "ls", "cat", "head", "tail", "wc", "echo", "printf",
        "bash", "sh", "python", "python3", "node", "npm", "npx", "yarn", "pnpm",
        "git", "curl", "wget", "jq", "sed", "awk", "sort", "uniq", "cut",
        "docker", "docker-compose", "kubectl", "terraform", "helm",
        "pip", "pip3", "poetry", "pipenv",
        "cargo", "rustc", "go", "java", "javac", "mvn", "gradle",
        "semgrep", "bandit", "eslint", "prettier", "jest", "pytest",
        "make", "cmake", "gcc", "g++", "clang",
        "aws", "gcloud", "az", "gh", "hub",
        "openssl", "ssh", "scp", "rsync",
        "if", "then", "else", "fi", "for", "do", "done", "while", "case", "esac",
        "test", "[", "[[", "true", "false", "exit", "return",
        "mkdir", "rm", "cp", "mv", "touch", "chmod", "chown",
        "tar", "gzip", "gunzip", "zip", "unzip",
        "nc", "netstat", "ss", "nmap", "dig", "nslookup",
        "ps", "top", "htop", "free", "df", "du",
        "xargs", "tee", "tr", "comm", "diff", "patch",
        "rg", "fd", "fzf", "bat", "exa", "tree",
        "yq", "csvkit", "miller",
        "trivy", "snyk", "grype", "syft", "cosign",
        "k9s", "kubectx", "kubens", "kustomize", "skaffold",
        "ansible", "ansible-playbook", "vault", "consul",
        "redis-cli", "mongo", "psql", "mysql", "sqlite3",
        "coverage", "nyc", "istanbul", "jacoco",
        "hadolint", "shellcheck", "yamllint", "markdownlint",
        "dbt", "feast", "mlflow", "dvc",
        "ncu", "npm-check", "depcheck", "audit-ci",
        "opa", "conftest", "kubeval", "kubesec",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Signatures of commands destructive enough to fail a script outright.
/// Deliberately narrow: `rm -rf /tmp/...` is not flagged, only root deletion.
fn default_dangerous_signatures() -> Vec<String> {
    [
        r"rm\s+-rf\s+/\s*$",
        r"rm\s+-rf\s+/\s*;",
        r"rm\s+-rf\s+/\*\s",
        r"rm\s+-rf\s+/\*$",
        r"rm\s+-rf\s+--no-preserve-root",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Language that marks a document as requiring human involvement
fn default_manual_blocker_phrases() -> Vec<String> {
    [
        "human judgment required",
        "manual review",
        "manual verification",
        "manual inspection",
        "requires expert",
        "visual inspection",
        "subjective assessment",
        "interview",
        "meeting",
        "discussion",
        "stakeholder",
        "approval required",
        "sign-off",
        "physical access",
        "in-person",
        "human-in-the-loop",
        "cannot be automated",
        "not automatable",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: SentinelConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self { config: SentinelConfig::default() }
    }

    /// Add a command name to the allow-list
    pub fn allow_command(mut self, command: impl Into<String>) -> Self {
        self.config.tables.allowed_commands.push(command.into());
        self
    }

    /// Add a dangerous-command signature
    pub fn dangerous_signature(mut self, signature: impl Into<String>) -> Self {
        self.config.tables.dangerous_signatures.push(signature.into());
        self
    }

    /// Add a manual-blocker phrase
    pub fn blocker_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.config.tables.manual_blocker_phrases.push(phrase.into());
        self
    }

    /// Override the external checker timeout
    pub fn checker_timeout_secs(mut self, secs: u64) -> Self {
        self.config.limits.checker_timeout_secs = secs;
        self
    }

    /// Override the report issue cap
    pub fn max_report_issues(mut self, cap: usize) -> Self {
        self.config.limits.max_report_issues = cap;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SentinelResult<SentinelConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = SentinelConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.tables.allowed_commands.is_empty());
        assert!(!config.tables.manual_blocker_phrases.is_empty());
        assert_eq!(config.tables.broad_globs, vec!["*", "**", "**/*"]);
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let config = SentinelConfig::load_from_str("version: \"1.0\"\n").unwrap();
        assert_eq!(config.limits.max_report_issues, 100);
        assert!(config.tables.degenerate_regexes.contains(&".*".to_string()));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let result = SentinelConfig::load_from_str("version: \"2.0\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bad_dangerous_signature() {
        let mut config = SentinelConfig::default();
        config.tables.dangerous_signatures.push("(unclosed".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = SentinelConfig::default();
        config.limits.checker_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_extends_tables() {
        let config = ConfigBuilder::new()
            .allow_command("internal-scanner")
            .blocker_phrase("pair with operator")
            .checker_timeout_secs(3)
            .build()
            .unwrap();

        assert!(config.tables.allowed_commands.contains(&"internal-scanner".to_string()));
        assert!(config
            .tables
            .manual_blocker_phrases
            .contains(&"pair with operator".to_string()));
        assert_eq!(config.limits.checker_timeout_secs, 3);
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = SentinelConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let rehydrated = SentinelConfig::load_from_str(&yaml).unwrap();
        assert_eq!(config.version, rehydrated.version);
        assert_eq!(
            config.tables.allowed_commands.len(),
            rehydrated.tables.allowed_commands.len()
        );
    }
}
