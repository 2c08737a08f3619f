//! Configuration types for edr-printer
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables (`EDR_*`, with `.env` support in the binary), then CLI flags.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable holding the portal account identifier
pub const ENV_USERNAME: &str = "EDR_USERNAME";
/// Environment variable holding the portal secret
pub const ENV_PASSWORD: &str = "EDR_PASSWORD";
/// Environment variable holding the registered MFA device identifier
pub const ENV_MFA_CREDENTIAL_ID: &str = "EDR_MFA_CREDENTIAL_ID";
/// Environment variable overriding the output directory
pub const ENV_OUTPUT_DIR: &str = "EDR_OUTPUT_DIR";
/// Environment variable carrying a pre-obtained bearer token
pub const ENV_AUTH_TOKEN: &str = "EDR_AUTH_TOKEN";

/// Remote portal endpoints and account settings
#[derive(Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the login host (credentials and one-time codes)
    #[serde(default = "default_login_base_url")]
    pub login_base_url: String,

    /// Base URL of the portal host (Event Management lives under `/EventManagement`)
    #[serde(default = "default_portal_base_url")]
    pub portal_base_url: String,

    /// Account identifier
    #[serde(default)]
    pub username: Option<String>,

    /// Account secret (never serialized back out)
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Identifier of the registered device that receives one-time codes
    #[serde(default)]
    pub mfa_credential_id: Option<String>,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// How long a bearer token is trusted after it is obtained (default: 8 hours)
    #[serde(default = "default_token_lifetime", with = "duration_serde")]
    pub token_lifetime: Duration,

    /// User-Agent header sent on every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Store number used when browsing events without an explicit store (default: 8135)
    #[serde(default = "default_store_number")]
    pub default_store_number: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_base_url: default_login_base_url(),
            portal_base_url: default_portal_base_url(),
            username: None,
            password: None,
            mfa_credential_id: None,
            request_timeout: default_request_timeout(),
            token_lifetime: default_token_lifetime(),
            user_agent: default_user_agent(),
            default_store_number: default_store_number(),
        }
    }
}

impl std::fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalConfig")
            .field("login_base_url", &self.login_base_url)
            .field("portal_base_url", &self.portal_base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("mfa_credential_id", &self.mfa_credential_id)
            .field("request_timeout", &self.request_timeout)
            .field("token_lifetime", &self.token_lifetime)
            .field("user_agent", &self.user_agent)
            .field("default_store_number", &self.default_store_number)
            .finish()
    }
}

/// Batch defaults used when the caller does not override them
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Event ids processed when none are given on the command line
    #[serde(default = "default_event_ids")]
    pub default_event_ids: Vec<String>,

    /// Merge all records into one document with a cover section (default: false)
    #[serde(default)]
    pub consolidate: bool,

    /// Send documents to the printer (default: false)
    #[serde(default)]
    pub print: bool,

    /// Keep a permanent copy in the output directory after printing (default: true)
    #[serde(default = "default_true")]
    pub save_copy: bool,

    /// Open each delivered document in the desktop viewer (default: false)
    #[serde(default)]
    pub open_after: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_event_ids: default_event_ids(),
            consolidate: false,
            print: false,
            save_copy: true,
            open_after: false,
        }
    }
}

/// Filesystem locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for saved documents and documents kept after a failed print (default: "output")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory for intermediate documents (default: system temp dir + "edr-printer")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}

/// One print command in the fallback chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintCommandConfig {
    /// Label used in logs and results (defaults to the program name)
    #[serde(default)]
    pub name: Option<String>,

    /// Program to run (looked up in PATH)
    pub program: String,

    /// Arguments; `{file}` is replaced by the absolute document path
    #[serde(default)]
    pub args: Vec<String>,
}

/// Print dispatch settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrintConfig {
    /// Ordered print commands; empty means the platform defaults
    #[serde(default)]
    pub commands: Vec<PrintCommandConfig>,

    /// Timeout for each print command (default: 15 seconds)
    #[serde(default = "default_print_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Wait after a successful print before removing the temp file (default: 5 seconds)
    #[serde(default = "default_spool_grace", with = "duration_serde")]
    pub spool_grace: Duration,

    /// Command that opens a document for viewing; unset means the platform default
    #[serde(default)]
    pub viewer: Option<PrintCommandConfig>,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            timeout: default_print_timeout(),
            spool_grace: default_spool_grace(),
            viewer: None,
        }
    }
}

/// Available render backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderBackendKind {
    /// Print-styled HTML
    Html,
    /// Plain text
    Text,
}

/// Render settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Backends tried in order until one succeeds (default: html, text)
    #[serde(default = "default_backends")]
    pub backends: Vec<RenderBackendKind>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal endpoints and account
    #[serde(default)]
    pub portal: PortalConfig,

    /// Batch defaults
    #[serde(default)]
    pub batch: BatchConfig,

    /// Filesystem locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Print dispatch
    #[serde(default)]
    pub print: PrintConfig,

    /// Rendering
    #[serde(default)]
    pub render: RenderConfig,
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid configuration file: {e}"),
            key: None,
        })
    }

    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
                    message: format!("cannot read {}: {e}", path.display()),
                    key: None,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override settings from `EDR_*` environment variables
    pub fn apply_env(&mut self) {
        if let Some(v) = env_value(ENV_USERNAME) {
            self.portal.username = Some(v);
        }
        if let Some(v) = env_value(ENV_PASSWORD) {
            self.portal.password = Some(v);
        }
        if let Some(v) = env_value(ENV_MFA_CREDENTIAL_ID) {
            self.portal.mfa_credential_id = Some(v);
        }
        if let Some(v) = env_value(ENV_OUTPUT_DIR) {
            self.output.output_dir = PathBuf::from(v);
        }
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("portal.login_base_url", &self.portal.login_base_url),
            ("portal.portal_base_url", &self.portal.portal_base_url),
        ] {
            let url = Url::parse(value)
                .map_err(|e| Error::config(format!("invalid URL {value:?}: {e}"), key))?;
            if url.cannot_be_a_base() {
                return Err(Error::config(format!("{value:?} cannot be a base URL"), key));
            }
        }

        if self.output.output_dir.as_os_str().is_empty() {
            return Err(Error::config(
                "output directory must not be empty",
                "output.output_dir",
            ));
        }

        if self.render.backends.is_empty() {
            return Err(Error::config(
                "at least one render backend is required",
                "render.backends",
            ));
        }

        if let Some(cmd) = self.print.commands.iter().find(|c| c.program.trim().is_empty()) {
            return Err(Error::config(
                format!("print command {:?} has no program", cmd.name),
                "print.commands",
            ));
        }

        if self
            .print
            .viewer
            .as_ref()
            .is_some_and(|v| v.program.trim().is_empty())
        {
            return Err(Error::config("viewer command has no program", "print.viewer"));
        }

        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// Default value functions
fn default_login_base_url() -> String {
    "https://retaillink.login.wal-mart.com".to_string()
}

fn default_portal_base_url() -> String {
    "https://retaillink2.wal-mart.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_token_lifetime() -> Duration {
    Duration::from_secs(8 * 60 * 60)
}

fn default_user_agent() -> String {
    concat!("edr-printer/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_store_number() -> Option<String> {
    Some("8135".to_string())
}

fn default_event_ids() -> Vec<String> {
    vec!["606034".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("edr-printer")
}

fn default_print_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_spool_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_backends() -> Vec<RenderBackendKind> {
    vec![RenderBackendKind::Html, RenderBackendKind::Text]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.batch.default_event_ids, vec!["606034".to_string()]);
        assert!(config.batch.save_copy);
        assert!(!config.batch.print);
        assert_eq!(config.portal.default_store_number.as_deref(), Some("8135"));
        assert_eq!(
            config.render.backends,
            vec![RenderBackendKind::Html, RenderBackendKind::Text]
        );
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_fields() {
        let config = Config::from_toml_str(
            r#"
            [portal]
            username = "d2fr4w2"
            token_lifetime = 600

            [batch]
            default_event_ids = ["1", "2"]
            consolidate = true

            [[print.commands]]
            program = "lp"
            args = ["-d", "front-office", "{file}"]
            "#,
        )
        .unwrap();

        assert_eq!(config.portal.username.as_deref(), Some("d2fr4w2"));
        assert_eq!(config.portal.token_lifetime, Duration::from_secs(600));
        assert_eq!(config.portal.request_timeout, Duration::from_secs(30));
        assert_eq!(config.batch.default_event_ids, vec!["1", "2"]);
        assert!(config.batch.consolidate);
        assert!(config.batch.save_copy);
        assert_eq!(config.print.commands.len(), 1);
        assert_eq!(config.print.commands[0].args[2], "{file}");
        assert_eq!(config.print.timeout, Duration::from_secs(15));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = Config::from_toml_str("[portal\nusername = 1").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn password_is_not_serialized_or_debug_printed() {
        let mut config = Config::default();
        config.portal.password = Some("hunter2".into());

        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("hunter2"));

        let debug = format!("{:?}", config.portal);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn invalid_portal_url_is_rejected_with_key() {
        let mut config = Config::default();
        config.portal.portal_base_url = "not a url".into();
        match config.validate().unwrap_err() {
            Error::Config { key, .. } => {
                assert_eq!(key.as_deref(), Some("portal.portal_base_url"))
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn empty_backend_list_is_rejected() {
        let mut config = Config::default();
        config.render.backends.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn print_command_without_program_is_rejected() {
        let mut config = Config::default();
        config.print.commands.push(PrintCommandConfig {
            name: Some("broken".into()),
            program: "  ".into(),
            args: vec![],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn environment_overrides_account_settings() {
        // SAFETY: serialized with every other test touching the process environment
        unsafe {
            std::env::set_var(ENV_USERNAME, "env-user");
            std::env::set_var(ENV_PASSWORD, "env-secret");
            std::env::set_var(ENV_MFA_CREDENTIAL_ID, "device-1");
            std::env::set_var(ENV_OUTPUT_DIR, "/tmp/edr-out");
        }

        let mut config = Config::default();
        config.apply_env();

        unsafe {
            std::env::remove_var(ENV_USERNAME);
            std::env::remove_var(ENV_PASSWORD);
            std::env::remove_var(ENV_MFA_CREDENTIAL_ID);
            std::env::remove_var(ENV_OUTPUT_DIR);
        }

        assert_eq!(config.portal.username.as_deref(), Some("env-user"));
        assert_eq!(config.portal.password.as_deref(), Some("env-secret"));
        assert_eq!(config.portal.mfa_credential_id.as_deref(), Some("device-1"));
        assert_eq!(config.output.output_dir, PathBuf::from("/tmp/edr-out"));
    }

    #[test]
    #[serial]
    fn blank_environment_values_are_ignored() {
        unsafe {
            std::env::set_var(ENV_USERNAME, "   ");
        }

        let mut config = Config::default();
        config.portal.username = Some("from-file".into());
        config.apply_env();

        unsafe {
            std::env::remove_var(ENV_USERNAME);
        }

        assert_eq!(config.portal.username.as_deref(), Some("from-file"));
    }

    #[test]
    #[serial]
    fn load_reads_file_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edr.toml");
        std::fs::write(
            &path,
            "[output]\noutput_dir = \"reports\"\n[print]\nspool_grace = 0\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.output.output_dir, PathBuf::from("reports"));
        assert_eq!(config.print.spool_grace, Duration::ZERO);
    }

    #[test]
    fn load_missing_file_is_a_config_error() {
        let err = Config::load(Some(Path::new("/nonexistent/edr.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn viewer_command_from_toml() {
        let config = Config::from_toml_str(
            r#"
            [batch]
            open_after = true

            [print.viewer]
            program = "firefox"
            args = ["--new-window", "{file}"]
            "#,
        )
        .unwrap();
        assert!(config.batch.open_after);
        let viewer = config.print.viewer.as_ref().unwrap();
        assert_eq!(viewer.program, "firefox");
        config.validate().unwrap();
    }

    #[test]
    fn blank_viewer_program_is_rejected() {
        let mut config = Config::default();
        config.print.viewer = Some(PrintCommandConfig {
            name: None,
            program: " ".into(),
            args: vec![],
        });
        match config.validate().unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("print.viewer")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duration_serde_serializes_as_seconds() {
        let print = PrintConfig {
            timeout: Duration::from_secs(42),
            ..Default::default()
        };
        let json = serde_json::to_value(&print).unwrap();
        assert_eq!(json["timeout"], 42);
        assert_eq!(json["spool_grace"], 5);
    }
}
