//! Converter invocation: the opaque subprocess boundary that turns a
//! document file into Markdown text.
//!
//! This module knows nothing about document formats. It maintains an ordered
//! list of candidate commands, tries each once with a wall-clock timeout,
//! and aggregates a single actionable error when every strategy fails. The
//! [`DocumentConverter`] trait is the seam: the coordinator only ever sees
//! the trait, so tests inject a fake and never spawn a process.
//!
//! ## Output protocol
//!
//! A converter must write Markdown to stdout and, on fatal error, diagnostic
//! text to stderr with empty stdout. A zero exit code with empty stdout and
//! non-empty stderr is still a failure — some converter wrappers exit 0
//! unconditionally.

use crate::config::ConversionConfig;
use crate::error::Office2MdError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Name of the bundled converter executable (`.bat` wrapper on Windows).
pub const CONVERTER_BINARY: &str = if cfg!(windows) {
    "office2md-cli.bat"
} else {
    "office2md-cli"
};

/// Opaque boundary: a file path in, Markdown text out.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `input` to Markdown, or fail once all strategies are exhausted.
    async fn convert(&self, input: &Path) -> Result<String, Office2MdError>;
}

/// How a candidate command is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    /// Native executable: `<program> "<input>"`.
    Binary,
    /// Python script variant: `python "<program>" "<input>" <extract-images>`.
    /// The script handles image extraction itself, signalled by the extra
    /// positional argument.
    Script,
}

/// One candidate invocation strategy.
#[derive(Debug, Clone)]
struct ConverterCommand {
    program: PathBuf,
    kind: CommandKind,
}

impl ConverterCommand {
    fn new(program: PathBuf) -> Self {
        let kind = match program.extension().and_then(|e| e.to_str()) {
            Some("py") => CommandKind::Script,
            _ => CommandKind::Binary,
        };
        Self { program, kind }
    }
}

/// Production converter: tries each candidate command once, in order.
pub struct CommandConverter {
    commands: Vec<ConverterCommand>,
    timeout_secs: u64,
    extract_images: bool,
    /// Whether an embedded binary was found during discovery — drives the
    /// installation hint when everything fails.
    embedded_present: bool,
}

impl CommandConverter {
    /// Build the strategy list from the configuration snapshot.
    ///
    /// Order of preference:
    /// 1. the explicitly configured command, if any;
    /// 2. the embedded platform binary under `<install_root>/bin/<os>/`;
    /// 3. `office2md-cli` found on PATH.
    pub fn discover(config: &ConversionConfig, install_root: Option<&Path>) -> Self {
        let mut commands = Vec::new();
        let mut embedded_present = false;

        if let Some(ref cmd) = config.converter_command {
            commands.push(ConverterCommand::new(cmd.clone()));
        }

        if let Some(root) = install_root {
            let embedded = root
                .join("bin")
                .join(std::env::consts::OS)
                .join(CONVERTER_BINARY);
            if embedded.exists() {
                embedded_present = true;
                commands.push(ConverterCommand::new(embedded));
            }
        }

        if let Ok(on_path) = which::which(CONVERTER_BINARY) {
            commands.push(ConverterCommand::new(on_path));
        }

        Self {
            commands,
            timeout_secs: config.subprocess_timeout_secs,
            extract_images: config.extract_images,
            embedded_present,
        }
    }

    /// Run one candidate command against `input`.
    async fn run_attempt(
        &self,
        command: &ConverterCommand,
        input: &Path,
    ) -> Result<String, Office2MdError> {
        let mut cmd = match command.kind {
            CommandKind::Binary => tokio::process::Command::new(&command.program),
            CommandKind::Script => {
                let mut c = tokio::process::Command::new(python_program());
                c.arg(&command.program);
                c
            }
        };
        cmd.arg(input);
        if command.kind == CommandKind::Script {
            cmd.arg(if self.extract_images { "true" } else { "false" });
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program = %command.program.display(),
            input = %input.display(),
            "invoking converter"
        );

        let output = timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| Office2MdError::ConverterTimeout {
                path: input.to_path_buf(),
                secs: self.timeout_secs,
            })?
            .map_err(|e| Office2MdError::Internal(format!("failed to spawn converter: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(Office2MdError::Internal(format!(
                "converter exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        // Some wrappers exit 0 even on fatal errors; an empty payload with
        // diagnostics on stderr is a failure regardless of the exit code.
        if stdout.is_empty() && !stderr.trim().is_empty() {
            return Err(Office2MdError::Internal(format!(
                "converter error: {}",
                stderr.trim()
            )));
        }

        Ok(stdout)
    }

    fn exhaustion_hint(&self) -> String {
        if self.embedded_present {
            "The embedded converter binary failed to execute. This might be due to \
             missing system libraries, an architecture mismatch, or permission issues."
                .to_string()
        } else {
            "No converter is available. Check the office2md installation, or point \
             the configuration at a converter command explicitly."
                .to_string()
        }
    }
}

#[async_trait]
impl DocumentConverter for CommandConverter {
    async fn convert(&self, input: &Path) -> Result<String, Office2MdError> {
        let mut last_error: Option<Office2MdError> = None;

        for command in &self.commands {
            match self.run_attempt(command, input).await {
                Ok(markdown) => return Ok(markdown),
                Err(e) => {
                    // One attempt per strategy, never retried; move on.
                    warn!(
                        program = %command.program.display(),
                        error = %e,
                        "converter strategy failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(Office2MdError::ConversionFailed {
            path: input.to_path_buf(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no converter strategies configured".to_string()),
            hint: self.exhaustion_hint(),
        })
    }
}

/// `python3` where available, `python` otherwise (Windows installers ship
/// only the unversioned name).
fn python_program() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}
