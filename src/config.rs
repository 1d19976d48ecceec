//! TOML configuration for sprintmetrics.
//!
//! Layered model: compiled-in defaults, then a config file (explicit path,
//! `SPRINTMETRICS_CONFIG`, or `./sprintmetrics.toml`), then credential
//! overrides from the environment. Credentials are resolved once here and
//! handed to the tracker client as a value.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::warehouse::WriteMode;

pub const CONFIG_ENV: &str = "SPRINTMETRICS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "sprintmetrics.toml";

pub const ENV_BASE_URL: &str = "JIRA_BASE_URL";
pub const ENV_USERNAME: &str = "JIRA_USERNAME";
pub const ENV_API_TOKEN: &str = "JIRA_API_TOKEN";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for an extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the configuration file, in order:
    /// 1. `explicit`.
    /// 2. The path in `SPRINTMETRICS_CONFIG`.
    /// 3. `./sprintmetrics.toml`, if present.
    /// 4. Compiled-in defaults.
    ///
    /// A file named by 1 or 2, or a local file that exists, must load; a
    /// broken file is an error rather than a silent fall back to defaults.
    /// Credential environment overrides are applied on top.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok().filter(|v| !v.is_empty());
        let mut config = Self::resolve(explicit, env_path.as_deref().map(Path::new))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn resolve(explicit: Option<&Path>, env_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = env_path {
            return Self::load(path).with_context(|| format!("{CONFIG_ENV} points at an unusable file"));
        }

        let local = Path::new(DEFAULT_CONFIG_PATH);
        if local.exists() {
            return Self::load(local);
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    /// Overlay tracker credentials from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.tracker.base_url = url;
        }
        if let Some(user) = lookup(ENV_USERNAME).filter(|v| !v.is_empty()) {
            self.tracker.username = Some(user);
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            self.tracker.api_token = Some(token);
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Connection settings for the tracker REST API.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Site root, e.g. `https://example.atlassian.net`.
    pub base_url: String,
    pub username: Option<String>,
    pub api_token: Option<String>,
    /// `maxResults` requested per page.
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: None,
            api_token: None,
            page_size: 50,
            timeout_secs: 30,
        }
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Basic-auth credentials for the tracker.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub api_token: String,
}

impl TrackerConfig {
    /// The configured site root; there is no built-in default.
    pub fn base_url(&self) -> Result<&str> {
        let url = self.base_url.trim();
        anyhow::ensure!(
            !url.is_empty(),
            "tracker base URL not configured (set {ENV_BASE_URL} or tracker.base_url)"
        );
        Ok(url)
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let username = self
            .username
            .clone()
            .with_context(|| format!("tracker username not configured (set {ENV_USERNAME})"))?;
        let api_token = self
            .api_token
            .clone()
            .with_context(|| format!("tracker API token not configured (set {ENV_API_TOKEN})"))?;
        Ok(Credentials { username, api_token })
    }
}

// ---------------------------------------------------------------------------
// Board / sprint selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub board_id: Option<u64>,
    /// Keep only sprints whose name starts with one of these. Empty keeps all.
    pub name_prefixes: Vec<String>,
    /// Keep only these exact sprint names. Empty keeps all.
    pub sprint_names: Vec<String>,
    /// Skip sprints that have not ended yet.
    pub closed_only: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            board_id: None,
            name_prefixes: Vec::new(),
            sprint_names: Vec::new(),
            closed_only: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Custom fields
// ---------------------------------------------------------------------------

/// Site-specific custom field ids mapped onto record columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub story_points: String,
    pub epic_link: String,
    pub pair: String,
    pub validator: String,
    pub time_in_status: String,
    pub request_type: String,
    pub start_date: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            story_points: "customfield_10014".to_string(),
            epic_link: "customfield_11040".to_string(),
            pair: "customfield_12185".to_string(),
            validator: "customfield_11140".to_string(),
            time_in_status: "customfield_10000".to_string(),
            request_type: "customfield_12101".to_string(),
            start_date: "customfield_12100".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Changelog fetches in flight per sprint. `1` is fully sequential.
    pub concurrency: usize,
    /// Abort the run when any issue's changelog cannot be fetched.
    pub strict: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            strict: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub issues_csv: Option<PathBuf>,
    pub sprints_csv: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            issues_csv: Some(PathBuf::from("sprint_issues.csv")),
            sprints_csv: Some(PathBuf::from("sprints.csv")),
        }
    }
}

// ---------------------------------------------------------------------------
// Warehouse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub mode: WriteMode,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("data/sprintmetrics.db"),
            mode: WriteMode::Append,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
