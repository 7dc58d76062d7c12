//! Shell syntax checking capability
//!
//! Architecture: Capability Interface - The fail-open contract is encoded in the type
//! - `SyntaxChecker` has two implementations selected once at startup by a probe
//! - `ExternalChecker` shells out to shellcheck with a bounded timeout
//! - `MinimalChecker` is an in-process parser-level scan used when shellcheck
//!   is absent; neither implementation ever surfaces a checker failure

use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Outcome of one syntax check. Checker errors and timeouts never appear
/// here; they collapse to `Valid` inside the implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Valid,
    /// Joined diagnostics describing why the script does not parse
    Invalid(String),
}

/// A shell syntax checking strategy
#[async_trait]
pub trait SyntaxChecker: Send + Sync {
    /// Stable name recorded in the report summary
    fn name(&self) -> &'static str;

    /// Check one script body. Must be fail-open: any inability to decide
    /// (missing binary, timeout, undecodable output) returns `Valid`.
    async fn check(&self, script: &str) -> CheckOutcome;
}

/// Probe for shellcheck once at startup and select the checker implementation
pub fn probe_checker(timeout_secs: u64, max_diagnostics: usize) -> Box<dyn SyntaxChecker> {
    let available = std::process::Command::new("shellcheck")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);

    if available {
        tracing::info!("shellcheck found on PATH, using external syntax checker");
        Box::new(ExternalChecker::new(timeout_secs, max_diagnostics))
    } else {
        tracing::info!("shellcheck not found, falling back to minimal syntax checker");
        Box::new(MinimalChecker)
    }
}

/// Syntax checking via a shellcheck subprocess on a temporary script file
pub struct ExternalChecker {
    program: String,
    timeout: Duration,
    max_diagnostics: usize,
}

impl ExternalChecker {
    pub fn new(timeout_secs: u64, max_diagnostics: usize) -> Self {
        Self {
            program: "shellcheck".to_string(),
            timeout: Duration::from_secs(timeout_secs),
            max_diagnostics,
        }
    }

    /// Override the checker binary; used by tests to exercise fail-open paths
    #[cfg(test)]
    fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Extract up to `max_diagnostics` error-level messages from shellcheck's
    /// JSON output. Undecodable output yields nothing (fail-open).
    fn error_messages(&self, stdout: &[u8]) -> Vec<String> {
        let Ok(parsed) = serde_json::from_slice::<serde_json::Value>(stdout) else {
            return Vec::new();
        };
        let Some(entries) = parsed.as_array() else { return Vec::new() };

        entries
            .iter()
            .filter(|e| e.get("level").and_then(|l| l.as_str()) == Some("error"))
            .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
            .take(self.max_diagnostics)
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl SyntaxChecker for ExternalChecker {
    fn name(&self) -> &'static str {
        "external"
    }

    async fn check(&self, script: &str) -> CheckOutcome {
        // The temp file is removed on drop, on every exit path
        let mut file = match tempfile::Builder::new().suffix(".sh").tempfile() {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!("failed to create temp script, assuming valid: {e}");
                return CheckOutcome::Valid;
            }
        };
        if let Err(e) = file.write_all(script.as_bytes()) {
            tracing::debug!("failed to write temp script, assuming valid: {e}");
            return CheckOutcome::Valid;
        }

        let invocation = Command::new(&self.program)
            .args(["-s", "bash", "-f", "json"])
            .arg(file.path())
            .kill_on_drop(true)
            .output();

        match timeout(self.timeout, invocation).await {
            Ok(Ok(output)) => {
                if output.status.success() {
                    return CheckOutcome::Valid;
                }
                let messages = self.error_messages(&output.stdout);
                if messages.is_empty() {
                    CheckOutcome::Valid
                } else {
                    CheckOutcome::Invalid(messages.join("; "))
                }
            }
            Ok(Err(e)) => {
                tracing::debug!("syntax checker failed to run, assuming valid: {e}");
                CheckOutcome::Valid
            }
            Err(_) => {
                tracing::debug!("syntax checker timed out, assuming valid");
                CheckOutcome::Valid
            }
        }
    }
}

/// In-process parser-level scan used when shellcheck is unavailable.
///
/// Flags only what a line-oriented scan can decide with confidence:
/// unterminated quoting, block keywords opened but never closed, and a
/// script ending in a pipe or boolean operator. Stray closers and anything
/// subtler are left to the external checker.
pub struct MinimalChecker;

#[async_trait]
impl SyntaxChecker for MinimalChecker {
    fn name(&self) -> &'static str {
        "minimal"
    }

    async fn check(&self, script: &str) -> CheckOutcome {
        match scan_script(script) {
            Some(reason) => CheckOutcome::Invalid(reason),
            None => CheckOutcome::Valid,
        }
    }
}

#[derive(PartialEq)]
enum ScanState {
    Normal,
    SingleQuote,
    DoubleQuote,
    Comment,
}

fn scan_script(script: &str) -> Option<String> {
    let mut state = ScanState::Normal;
    let mut escaped = false;
    let mut backticks = 0usize;
    let mut word = String::new();
    let mut words: Vec<String> = Vec::new();

    for ch in script.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match state {
            ScanState::Normal => match ch {
                '\\' => escaped = true,
                '\'' => state = ScanState::SingleQuote,
                '"' => state = ScanState::DoubleQuote,
                '#' => state = ScanState::Comment,
                '`' => backticks += 1,
                c if c.is_whitespace() || c == ';' || c == '|' || c == '&' || c == '(' || c == ')' => {
                    if !word.is_empty() {
                        words.push(std::mem::take(&mut word));
                    }
                }
                c => word.push(c),
            },
            ScanState::SingleQuote => {
                if ch == '\'' {
                    state = ScanState::Normal;
                }
            }
            ScanState::DoubleQuote => match ch {
                '\\' => escaped = true,
                '"' => state = ScanState::Normal,
                _ => {}
            },
            ScanState::Comment => {
                if ch == '\n' {
                    state = ScanState::Normal;
                }
            }
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    match state {
        ScanState::SingleQuote => return Some("unterminated single quote".to_string()),
        ScanState::DoubleQuote => return Some("unterminated double quote".to_string()),
        _ => {}
    }

    if backticks % 2 != 0 {
        return Some("unterminated command substitution".to_string());
    }

    let count = |needle: &str| words.iter().filter(|w| w == &needle).count();
    // Only unclosed blocks are flagged; excess closers are undecidable here
    if count("if") > count("fi") {
        return Some("'if' without matching 'fi'".to_string());
    }
    let openers = count("for") + count("while") + count("until");
    if openers > 0 && count("do") > count("done") {
        return Some("'do' without matching 'done'".to_string());
    }
    if count("case") > count("esac") {
        return Some("'case' without matching 'esac'".to_string());
    }

    let tail = script.trim_end();
    if tail.ends_with("&&") || tail.ends_with("||") || tail.ends_with('|') {
        return Some("script ends with a dangling operator".to_string());
    }

    None
}
