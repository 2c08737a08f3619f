//! Test configuration pointing every host at a mock server and every directory at a sandbox

use edr_printer::config::{BatchConfig, OutputConfig, PortalConfig, PrintConfig};
use edr_printer::Config;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Account used by the mocked login endpoint
pub const TEST_USERNAME: &str = "d2fr4w2";
/// Secret used by the mocked login endpoint
pub const TEST_PASSWORD: &str = "secret";
/// MFA device used by the mocked send-code endpoint
pub const TEST_DEVICE: &str = "device-1";

/// Sandbox directories that live as long as the test
pub struct Sandbox {
    _root: TempDir,
    /// Where saved and retained documents land
    pub output: PathBuf,
    /// Where documents are staged for printing
    pub staging: PathBuf,
}

impl Sandbox {
    /// Create fresh directories
    pub fn new() -> Self {
        let root = TempDir::new().expect("create temp dir");
        let output = root.path().join("output");
        let staging = root.path().join("staging");
        Self {
            _root: root,
            output,
            staging,
        }
    }

    /// Documents currently in the output directory
    pub fn saved_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = match std::fs::read_dir(&self.output) {
            Ok(entries) => entries
                .map(|e| e.expect("read dir entry").path())
                .collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }
}

/// Configuration for a run against `server` writing into `sandbox`
///
/// Print commands are empty on purpose; tests that print set their own.
pub fn test_config(server: &MockServer, sandbox: &Sandbox) -> Config {
    Config {
        portal: PortalConfig {
            login_base_url: server.uri(),
            portal_base_url: server.uri(),
            username: Some(TEST_USERNAME.into()),
            password: Some(TEST_PASSWORD.into()),
            mfa_credential_id: Some(TEST_DEVICE.into()),
            request_timeout: Duration::from_secs(5),
            default_store_number: Some("5307".into()),
            ..Default::default()
        },
        batch: BatchConfig::default(),
        output: OutputConfig {
            output_dir: sandbox.output.clone(),
            temp_dir: sandbox.staging.clone(),
        },
        print: PrintConfig {
            spool_grace: Duration::ZERO,
            timeout: Duration::from_secs(5),
            ..Default::default()
        },
        ..Default::default()
    }
}
