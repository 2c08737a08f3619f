//! Print mechanisms backed by external commands

use crate::config::{PrintCommandConfig, PrintConfig};
use crate::error::DeliveryError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Placeholder replaced by the absolute document path in command arguments
pub const FILE_PLACEHOLDER: &str = "{file}";

/// One way of handing a file to an external program (a printer, or a viewer)
#[async_trait]
pub trait PrintMechanism: Send + Sync {
    /// Name used in logs and results
    fn name(&self) -> &str;

    /// Try to print `document`
    async fn attempt(&self, document: &Path) -> Result<(), DeliveryError>;
}

/// Runs an external program with the document path in its arguments
///
/// A missing program is reported as [`DeliveryError::ProgramNotFound`] without
/// spawning anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPrinter {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandPrinter {
    /// Create a printer; if no argument contains `{file}`, the path is appended
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Build from a configured command
    pub fn from_config(command: &PrintCommandConfig, timeout: Duration) -> Self {
        Self::new(
            command
                .name
                .clone()
                .unwrap_or_else(|| command.program.clone()),
            command.program.clone(),
            command.args.clone(),
            timeout,
        )
    }

    fn resolve(&self) -> Result<PathBuf, DeliveryError> {
        which::which(&self.program).map_err(|_| DeliveryError::ProgramNotFound {
            program: self.program.clone(),
        })
    }

    fn expand_args(&self, document: &Path) -> Vec<String> {
        let file = document.to_string_lossy();
        if self.args.iter().any(|a| a.contains(FILE_PLACEHOLDER)) {
            self.args
                .iter()
                .map(|a| a.replace(FILE_PLACEHOLDER, &file))
                .collect()
        } else {
            let mut args = self.args.clone();
            args.push(file.into_owned());
            args
        }
    }
}

#[async_trait]
impl PrintMechanism for CommandPrinter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, document: &Path) -> Result<(), DeliveryError> {
        let binary = self.resolve()?;
        let document = std::path::absolute(document).unwrap_or_else(|_| document.to_path_buf());
        let args = self.expand_args(&document);

        tracing::debug!(mechanism = %self.name, program = ?binary, "running print command");
        let result = tokio::time::timeout(
            self.timeout,
            Command::new(&binary)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::warn!(
                    mechanism = %self.name,
                    code = ?output.status.code(),
                    stderr = %stderr.trim(),
                    "print command failed"
                );
                Err(DeliveryError::CommandFailed {
                    program: self.program.clone(),
                    code: output.status.code(),
                })
            }
            Ok(Err(e)) => Err(DeliveryError::LaunchFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DeliveryError::TimedOut {
                program: self.program.clone(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

/// Default print commands for the current platform, in attempt order
pub fn platform_defaults(timeout: Duration) -> Vec<CommandPrinter> {
    if cfg!(target_os = "windows") {
        vec![
            CommandPrinter::new(
                "shell-print",
                "cmd",
                args(&["/c", "start", "/wait", "/min", "", "/print", FILE_PLACEHOLDER]),
                timeout,
            ),
            CommandPrinter::new(
                "powershell-print",
                "powershell.exe",
                args(&[
                    "-WindowStyle",
                    "Hidden",
                    "-Command",
                    "Start-Process -FilePath \"{file}\" -Verb Print -WindowStyle Hidden -Wait",
                ]),
                timeout,
            ),
            CommandPrinter::new("print", "print", args(&[FILE_PLACEHOLDER]), timeout),
        ]
    } else if cfg!(target_os = "macos") {
        vec![CommandPrinter::new("lp", "lp", args(&[FILE_PLACEHOLDER]), timeout)]
    } else if cfg!(unix) {
        vec![
            CommandPrinter::new("lp", "lp", args(&[FILE_PLACEHOLDER]), timeout),
            CommandPrinter::new("lpr", "lpr", args(&[FILE_PLACEHOLDER]), timeout),
        ]
    } else {
        Vec::new()
    }
}

/// Configured print commands, or the platform defaults when none are configured
pub fn mechanisms_from_config(config: &PrintConfig) -> Vec<Arc<dyn PrintMechanism>> {
    let printers = if config.commands.is_empty() {
        platform_defaults(config.timeout)
    } else {
        config
            .commands
            .iter()
            .map(|c| CommandPrinter::from_config(c, config.timeout))
            .collect()
    };

    printers
        .into_iter()
        .map(|p| Arc::new(p) as Arc<dyn PrintMechanism>)
        .collect()
}

/// Command that opens a document in the desktop's default viewer
pub fn platform_viewer(timeout: Duration) -> Option<CommandPrinter> {
    if cfg!(target_os = "windows") {
        Some(CommandPrinter::new(
            "viewer",
            "cmd",
            args(&["/c", "start", "", FILE_PLACEHOLDER]),
            timeout,
        ))
    } else if cfg!(target_os = "macos") {
        Some(CommandPrinter::new(
            "viewer",
            "open",
            args(&[FILE_PLACEHOLDER]),
            timeout,
        ))
    } else if cfg!(unix) {
        Some(CommandPrinter::new(
            "viewer",
            "xdg-open",
            args(&[FILE_PLACEHOLDER]),
            timeout,
        ))
    } else {
        None
    }
}

/// The configured viewer, or the platform default when none is configured
pub fn viewer_from_config(config: &PrintConfig) -> Option<Arc<dyn PrintMechanism>> {
    let viewer = match &config.viewer {
        Some(command) => Some(CommandPrinter::from_config(command, config.timeout)),
        None => platform_viewer(config.timeout),
    };
    viewer.map(|v| Arc::new(v) as Arc<dyn PrintMechanism>)
}
