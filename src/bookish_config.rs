//! Configuration file for Bookish.
//!
//! Settings are read from `.bookish/bookish.toml` and layered
//! file → environment → CLI. Every section and field has a default, so an
//! empty or missing file is valid.
//!
//! # Configuration File Format
//!
//! ```toml
//! [orchestrator]
//! max_loops = 5
//!
//! [store]
//! backend = "sqlite"            # or "memory"
//! path = ".bookish/sessions.db"
//!
//! [scheduling]
//! pages_per_minute = 0.5
//!
//! [metadata]
//! enabled = true
//! base_url = "https://www.googleapis.com"
//! max_retries = 3
//! backoff_ms = 1000
//!
//! [publisher]
//! kind = "auto"                 # auto | github | directory
//! github_owner = "me"
//! github_repo = "my_bookish_companion"
//! github_api = "https://api.github.com"
//!
//! [logging]
//! level = "info"
//! json = false
//! file = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::integrations::is_valid_github_token;
use crate::worker::MAX_PAGES_PER_MINUTE;

pub const CONFIG_FILE: &str = "bookish.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSection {
    /// Worker invocations allowed in one external turn
    #[serde(default = "default_max_loops")]
    pub max_loops: usize,
}

fn default_max_loops() -> usize {
    crate::orchestrator::DEFAULT_MAX_LOOPS
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_loops: default_max_loops(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            _ => anyhow::bail!("Invalid store backend '{}'. Valid values: sqlite, memory", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database path, relative to the project directory
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    ".bookish/sessions.db".to_string()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingSection {
    #[serde(default = "default_pages_per_minute")]
    pub pages_per_minute: f64,
}

fn default_pages_per_minute() -> f64 {
    crate::worker::DEFAULT_PAGES_PER_MINUTE
}

impl Default for SchedulingSection {
    fn default() -> Self {
        Self {
            pages_per_minute: default_pages_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_books_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay before the first retry; doubles each attempt
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Prefer the GOOGLE_BOOKS_API_KEY environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_books_url() -> String {
    crate::integrations::DEFAULT_BOOKS_URL.to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

impl Default for MetadataSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_books_url(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    /// GitHub when a token and repository are configured, directory otherwise
    #[default]
    Auto,
    Github,
    Directory,
}

impl std::fmt::Display for PublisherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublisherKind::Auto => write!(f, "auto"),
            PublisherKind::Github => write!(f, "github"),
            PublisherKind::Directory => write!(f, "directory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherSection {
    #[serde(default)]
    pub kind: PublisherKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_repo: Option<String>,
    #[serde(default = "default_github_api")]
    pub github_api: String,
    /// Directory for the directory publisher, relative to the project directory
    #[serde(default = "default_artifact_dir")]
    pub directory: String,
}

fn default_github_api() -> String {
    crate::integrations::DEFAULT_GITHUB_API.to_string()
}

fn default_artifact_dir() -> String {
    ".bookish/artifacts".to_string()
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            kind: PublisherKind::default(),
            github_owner: None,
            github_repo: None,
            github_api: default_github_api(),
            directory: default_artifact_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Filter used when neither BOOKISH_LOG nor RUST_LOG is set
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Also write daily-rotated logs under `.bookish/logs`
    #[serde(default)]
    pub file: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            file: false,
        }
    }
}

/// Root of `bookish.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookishToml {
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub scheduling: SchedulingSection,
    #[serde(default)]
    pub metadata: MetadataSection,
    #[serde(default)]
    pub publisher: PublisherSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Credentials and overrides read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub github_token: Option<String>,
    pub books_api_key: Option<String>,
    pub max_loops: Option<usize>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| get(key).filter(|value| !value.trim().is_empty());
        Self {
            github_token: get("GITHUB_TOKEN"),
            books_api_key: get("GOOGLE_BOOKS_API_KEY"),
            max_loops: get("BOOKISH_MAX_LOOPS").and_then(|value| value.trim().parse().ok()),
        }
    }
}

impl BookishToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse bookish.toml")
    }

    /// Load `bookish.toml` from `bookish_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(bookish_dir: &Path) -> Result<Self> {
        let config_path = bookish_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize bookish.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides on top of file values.
    pub fn apply_env(&mut self, env: &EnvOverrides) {
        if let Some(max_loops) = env.max_loops {
            self.orchestrator.max_loops = max_loops;
        }
        if let Some(key) = &env.books_api_key {
            self.metadata.api_key = Some(key.clone());
        }
    }

    /// Non-fatal problems worth showing the user.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.orchestrator.max_loops == 0 {
            warnings.push(
                "orchestrator.max_loops is 0: every turn will fail before invoking a worker"
                    .to_string(),
            );
        }

        let pages_per_minute = self.scheduling.pages_per_minute;
        if pages_per_minute.is_nan() || pages_per_minute <= 0.0 {
            warnings.push(format!(
                "scheduling.pages_per_minute must be positive (got {})",
                self.scheduling.pages_per_minute
            ));
        } else if pages_per_minute > MAX_PAGES_PER_MINUTE {
            warnings.push(format!(
                "scheduling.pages_per_minute is {}: schedules are capped at {} pages per minute",
                pages_per_minute, MAX_PAGES_PER_MINUTE
            ));
        }

        if self.metadata.enabled && self.metadata.max_retries == 0 {
            warnings.push("metadata.max_retries is 0: lookups will make one attempt".to_string());
        }

        if self.publisher.kind == PublisherKind::Github
            && (self.publisher.github_owner.is_none() || self.publisher.github_repo.is_none())
        {
            warnings.push(
                "publisher.kind is 'github' but github_owner/github_repo are not set".to_string(),
            );
        }

        if self.store.backend == StoreBackend::Sqlite && self.store.path.trim().is_empty() {
            warnings.push("store.path is empty".to_string());
        }

        warnings
    }

    /// Warnings that depend on credentials from the environment.
    pub fn validate_env(&self, env: &EnvOverrides) -> Vec<String> {
        let mut warnings = Vec::new();
        match (&env.github_token, self.publisher.kind) {
            (None, PublisherKind::Github) => {
                warnings.push("publisher.kind is 'github' but GITHUB_TOKEN is not set".to_string())
            }
            (Some(token), PublisherKind::Github | PublisherKind::Auto)
                if !is_valid_github_token(token) =>
            {
                warnings.push("GITHUB_TOKEN does not look like a GitHub token".to_string())
            }
            _ => {}
        }
        if self.metadata.enabled && self.metadata.api_key.is_none() && env.books_api_key.is_none() {
            warnings.push(
                "GOOGLE_BOOKS_API_KEY is not set; metadata lookups may be rate limited".to_string(),
            );
        }
        warnings
    }
}
