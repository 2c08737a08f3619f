//! Document delivery
//!
//! [`Dispatcher::deliver`] either saves a document to the output directory or prints
//! it through an ordered list of [`PrintMechanism`]s. The first mechanism that
//! succeeds ends the sequence. When every mechanism fails the document is moved to
//! the output directory and its path is reported, so a failed print never loses it.

mod printer;

pub use printer::{
    CommandPrinter, FILE_PLACEHOLDER, PrintMechanism, mechanisms_from_config, platform_defaults,
    platform_viewer, viewer_from_config,
};

use crate::config::Config;
use crate::error::DeliveryError;
use crate::types::{DeliveryResult, RenderedDocument};
use crate::utils::{move_into, write_unique};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// What the caller wants done with a document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Send to the printer instead of only saving
    pub print_requested: bool,
    /// After a successful print, also keep a permanent copy in the output directory
    pub save_copy: bool,
}

/// Saves or prints rendered documents
#[derive(Clone)]
pub struct Dispatcher {
    mechanisms: Vec<Arc<dyn PrintMechanism>>,
    viewer: Option<Arc<dyn PrintMechanism>>,
    temp_dir: PathBuf,
    output_dir: PathBuf,
    spool_grace: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with explicit mechanisms and directories
    pub fn new(
        mechanisms: Vec<Arc<dyn PrintMechanism>>,
        temp_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        spool_grace: Duration,
    ) -> Self {
        Self {
            mechanisms,
            viewer: None,
            temp_dir: temp_dir.into(),
            output_dir: output_dir.into(),
            spool_grace,
        }
    }

    /// Create a dispatcher from configuration
    pub fn from_config(config: &Config) -> Self {
        let dispatcher = Self::new(
            mechanisms_from_config(&config.print),
            config.output.temp_dir.clone(),
            config.output.output_dir.clone(),
            config.print.spool_grace,
        );
        match viewer_from_config(&config.print) {
            Some(viewer) => dispatcher.with_viewer(viewer),
            None => dispatcher,
        }
    }

    /// Use `viewer` to open documents
    pub fn with_viewer(mut self, viewer: Arc<dyn PrintMechanism>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    /// Directory saved and retained documents are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `document` to the output directory without printing
    pub async fn save(&self, document: &RenderedDocument) -> Result<PathBuf, DeliveryError> {
        let path = persist(&self.output_dir, &document.file_name(), &document.content).await?;
        tracing::info!(path = %path.display(), "document saved");
        Ok(path)
    }

    /// Open a document on disk in the viewer
    pub async fn open(&self, path: &Path) -> Result<(), DeliveryError> {
        let viewer = self.viewer.as_ref().ok_or(DeliveryError::NoMechanism)?;
        viewer.attempt(path).await?;
        tracing::info!(viewer = viewer.name(), path = %path.display(), "document opened");
        Ok(())
    }

    /// Deliver `document`
    ///
    /// Returns an error only when the document could not be written to disk at all.
    pub async fn deliver(
        &self,
        document: &RenderedDocument,
        options: DeliveryOptions,
    ) -> Result<DeliveryResult, DeliveryError> {
        let file_name = document.file_name();

        if !options.print_requested {
            let path = self.save(document).await?;
            return Ok(DeliveryResult::Saved { path });
        }

        let (temp_path, staged_in_output) = self.stage(&file_name, document).await?;

        let mut attempts = Vec::new();
        if self.mechanisms.is_empty() {
            attempts.push(DeliveryError::NoMechanism.to_string());
        }

        for mechanism in &self.mechanisms {
            match mechanism.attempt(&temp_path).await {
                Ok(()) => {
                    tracing::info!(mechanism = mechanism.name(), "print job sent");
                    if staged_in_output && options.save_copy {
                        return Ok(DeliveryResult::Printed {
                            mechanism: mechanism.name().to_string(),
                            copy: Some(temp_path),
                        });
                    }
                    let copy = self.keep_copy(&temp_path, &file_name, document, options).await;
                    self.release(&temp_path).await;
                    return Ok(DeliveryResult::Printed {
                        mechanism: mechanism.name().to_string(),
                        copy,
                    });
                }
                Err(e) => {
                    tracing::warn!(mechanism = mechanism.name(), error = %e, "print mechanism failed, trying next");
                    attempts.push(format!("{}: {e}", mechanism.name()));
                }
            }
        }

        let retained_path = if staged_in_output {
            temp_path
        } else {
            match move_into(&temp_path, &self.output_dir).await {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(error = %e, path = %temp_path.display(), "could not move document to output directory, leaving it in place");
                    temp_path
                }
            }
        };
        tracing::error!(path = %retained_path.display(), "all print mechanisms failed, document kept");

        Ok(DeliveryResult::Failed {
            retained_path,
            attempts,
        })
    }

    /// Write the document where print commands can read it
    ///
    /// Uses the temp directory, or the output directory when the temp directory is
    /// unusable. The flag is set in the second case.
    async fn stage(
        &self,
        file_name: &str,
        document: &RenderedDocument,
    ) -> Result<(PathBuf, bool), DeliveryError> {
        match persist(&self.temp_dir, file_name, &document.content).await {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "document staged for printing");
                Ok((path, false))
            }
            Err(e) => {
                tracing::warn!(error = %e, "temp directory unusable, staging in output directory");
                let path = persist(&self.output_dir, file_name, &document.content).await?;
                Ok((path, true))
            }
        }
    }

    /// Permanent copy after a successful print, if requested
    async fn keep_copy(
        &self,
        temp_path: &Path,
        file_name: &str,
        document: &RenderedDocument,
        options: DeliveryOptions,
    ) -> Option<PathBuf> {
        if !options.save_copy {
            return None;
        }
        match write_unique(&self.output_dir, file_name, &document.content).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), "copy saved");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(error = %e, source = %temp_path.display(), "could not save copy of printed document");
                None
            }
        }
    }

    /// Give the spooler time to read the staged file, then remove it
    async fn release(&self, temp_path: &Path) {
        if !self.spool_grace.is_zero() {
            tokio::time::sleep(self.spool_grace).await;
        }
        if let Err(e) = tokio::fs::remove_file(temp_path).await {
            tracing::warn!(error = %e, path = %temp_path.display(), "could not remove staged document");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.mechanisms.iter().map(|m| m.name()).collect();
        f.debug_struct("Dispatcher")
            .field("mechanisms", &names)
            .field("viewer", &self.viewer.as_ref().map(|v| v.name()))
            .field("temp_dir", &self.temp_dir)
            .field("output_dir", &self.output_dir)
            .field("spool_grace", &self.spool_grace)
            .finish()
    }
}

async fn persist(dir: &Path, file_name: &str, content: &[u8]) -> Result<PathBuf, DeliveryError> {
    write_unique(dir, file_name, content)
        .await
        .map_err(|source| DeliveryError::Persist {
            path: dir.join(file_name),
            source,
        })
}
