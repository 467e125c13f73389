/*!
 * Review passes over a generated script.
 *
 * - `ensure_valid_syntax`: bounded check-and-repair loop, one service call
 *   per failed check
 * - `review_latex`: optional single pass asking the service to fix LaTeX
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use std::fmt::Debug;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::errors::PipelineError;
use crate::pipeline::prompts::{self, PromptTemplate};
use crate::providers::{GenerationRequest, Provider};
use crate::scene::repair::strip_code_fence;

const PARSE_ONLY_SNIPPET: &str = "import ast, sys; ast.parse(sys.stdin.read(), '<generated scene>')";

/// Outcome of a syntax check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxVerdict {
    Valid,
    /// Parser message for the first error
    Invalid(String),
}

/// Something that can tell whether a script parses
#[async_trait]
pub trait SyntaxChecker: Send + Sync + Debug {
    async fn check(&self, source: &str) -> Result<SyntaxVerdict, PipelineError>;
}

/// Parses with the Python interpreter's own `ast` module, never executing the script
#[derive(Debug, Clone)]
pub struct PythonSyntaxChecker {
    python: String,
    timeout: Duration,
}

impl PythonSyntaxChecker {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl SyntaxChecker for PythonSyntaxChecker {
    async fn check(&self, source: &str) -> Result<SyntaxVerdict, PipelineError> {
        let mut child = Command::new(&self.python)
            .args(["-c", PARSE_ONLY_SNIPPET])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::Io(format!("Failed to start {}: {}", self.python, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).await?;
            // Dropping closes the pipe so the parser sees EOF
        }

        let output = tokio::select! {
            result = child.wait_with_output() => result?,
            _ = tokio::time::sleep(self.timeout) => {
                return Err(PipelineError::Io(format!(
                    "Syntax check timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        if output.status.success() {
            return Ok(SyntaxVerdict::Valid);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(SyntaxVerdict::Invalid(summarize_parser_error(&stderr)))
    }
}

/// Keep the traceback's location line and final error line.
fn summarize_parser_error(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim_end).filter(|l| !l.is_empty()).collect();

    let location = lines.iter().rev().find(|l| l.trim_start().starts_with("File ")).copied();
    match (location, lines.last()) {
        (Some(location), Some(last)) => format!("{} ({})", last.trim(), location.trim()),
        (None, Some(last)) => last.trim().to_string(),
        _ => "unknown syntax error".to_string(),
    }
}

/// Check the script and ask the service for corrections until it parses.
///
/// Each failed check costs one service call; after `max_attempts` calls the
/// last correction gets one final check before giving up.
pub async fn ensure_valid_syntax(
    source: String,
    checker: &dyn SyntaxChecker,
    provider: &dyn Provider,
    model: &str,
    max_attempts: u32,
) -> Result<String, PipelineError> {
    let mut source = source;

    for attempt in 1..=max_attempts {
        let error = match checker.check(&source).await? {
            SyntaxVerdict::Valid => {
                debug!("Script syntax check passed");
                return Ok(source);
            }
            SyntaxVerdict::Invalid(error) => error,
        };

        warn!("Attempt {}/{}: script syntax error: {}", attempt, max_attempts, error);

        let request = GenerationRequest::new(model).text(prompts::syntax_repair_prompt(&source, &error));
        let response = provider.complete(request).await?;
        source = strip_code_fence(&response.text);
    }

    match checker.check(&source).await? {
        SyntaxVerdict::Valid => Ok(source),
        SyntaxVerdict::Invalid(_) => Err(PipelineError::SyntaxRepairExhausted { attempts: max_attempts }),
    }
}

/// Ask the service to fix LaTeX mistakes; keeps the script unless a correction comes back.
pub async fn review_latex(source: String, provider: &dyn Provider, model: &str) -> Result<String, PipelineError> {
    let request = GenerationRequest::new(model).text(prompts::latex_review_prompt(&source));
    let response = provider.complete(request).await?;

    if response.text.contains(PromptTemplate::NO_ERRORS_MARKER) {
        info!("LaTeX review found no errors");
        return Ok(source);
    }

    let corrected = strip_code_fence(&response.text);
    if corrected.is_empty() {
        warn!("LaTeX review returned nothing usable, keeping the generated script");
        return Ok(source);
    }

    info!("LaTeX review replaced the generated script");
    Ok(corrected)
}
