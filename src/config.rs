use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::bookish_config::{BookishToml, EnvOverrides, PublisherKind, StoreBackend};
use crate::integrations::{
    ArtifactPublisher, DirectoryPublisher, GitHubIssuePublisher, GoogleBooksClient,
    MetadataLookup, OfflineLookup,
};
use crate::orchestrator::Orchestrator;
use crate::phase::PhaseRegistry;
use crate::store::{MemoryStore, SessionStore, SqliteStore};
use crate::worker::{DateTool, WorkerDeps, WorkerSet};

/// Runtime configuration for Bookish.
///
/// Resolves `bookish.toml`, the environment and CLI flags into the values
/// the engine runs with, and builds the store, integrations and
/// orchestrator from them.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub bookish_dir: PathBuf,
    pub toml: BookishToml,
    pub env: EnvOverrides,
    pub verbose: bool,
    /// Keep sessions in memory for this process only
    pub ephemeral: bool,
}

impl Config {
    /// Load `.bookish/bookish.toml` under `project_dir` and apply the environment.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let bookish_dir = project_dir.join(".bookish");
        let mut toml = BookishToml::load_or_default(&bookish_dir)?;
        let env = EnvOverrides::from_env();
        toml.apply_env(&env);

        Ok(Self {
            project_dir,
            bookish_dir,
            toml,
            env,
            verbose: false,
            ephemeral: false,
        })
    }

    /// Create Config with CLI overrides, which win over file and environment.
    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        ephemeral: bool,
        max_loops: Option<usize>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.ephemeral = ephemeral;
        if let Some(max_loops) = max_loops {
            config.toml.orchestrator.max_loops = max_loops;
        }
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.bookish_dir.join(crate::bookish_config::CONFIG_FILE)
    }

    pub fn max_loops(&self) -> usize {
        self.toml.orchestrator.max_loops
    }

    pub fn store_path(&self) -> PathBuf {
        self.project_dir.join(&self.toml.store.path)
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.project_dir.join(&self.toml.publisher.directory)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.bookish_dir.join("logs")
    }

    pub fn store_backend(&self) -> StoreBackend {
        if self.ephemeral {
            StoreBackend::Memory
        } else {
            self.toml.store.backend
        }
    }

    /// File and environment warnings together.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        warnings.extend(self.toml.validate_env(&self.env));
        warnings
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.bookish_dir).context("Failed to create .bookish directory")?;
        if self.toml.logging.file {
            std::fs::create_dir_all(self.log_dir()).context("Failed to create log directory")?;
        }
        Ok(())
    }

    pub fn build_store(&self) -> Result<Arc<dyn SessionStore>> {
        match self.store_backend() {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Sqlite => {
                let path = self.store_path();
                let store = SqliteStore::open(&path)
                    .with_context(|| format!("Failed to open session store at {}", path.display()))?;
                Ok(Arc::new(store))
            }
        }
    }

    pub fn build_lookup(&self) -> Arc<dyn MetadataLookup> {
        let metadata = &self.toml.metadata;
        if !metadata.enabled {
            return Arc::new(OfflineLookup);
        }
        Arc::new(
            GoogleBooksClient::new(&metadata.base_url, metadata.api_key.clone())
                .with_retries(metadata.max_retries, Duration::from_millis(metadata.backoff_ms)),
        )
    }

    /// GitHub issues when a token and repository are configured (or required),
    /// otherwise markdown files under the artifact directory.
    pub fn build_publisher(&self) -> Result<Arc<dyn ArtifactPublisher>> {
        let publisher = &self.toml.publisher;
        let github = match (&self.env.github_token, &publisher.github_owner, &publisher.github_repo) {
            (Some(token), Some(owner), Some(repo)) => Some(GitHubIssuePublisher::new(
                &publisher.github_api,
                owner,
                repo,
                token,
            )),
            _ => None,
        };

        match (publisher.kind, github) {
            (PublisherKind::Github, Some(github)) | (PublisherKind::Auto, Some(github)) => {
                Ok(Arc::new(github))
            }
            (PublisherKind::Github, None) => anyhow::bail!(
                "publisher.kind is 'github' but GITHUB_TOKEN, github_owner or github_repo is missing"
            ),
            (PublisherKind::Auto | PublisherKind::Directory, _) => {
                Ok(Arc::new(DirectoryPublisher::new(self.artifact_dir())))
            }
        }
    }

    /// Validated orchestrator over the standard phase chain and workers.
    pub fn build_orchestrator(&self) -> Result<Orchestrator> {
        let workers = WorkerSet::standard(WorkerDeps {
            lookup: self.build_lookup(),
            publisher: self.build_publisher()?,
            pages_per_minute: self.toml.scheduling.pages_per_minute,
            dates: DateTool::system(),
        });

        Orchestrator::new(
            self.build_store()?,
            PhaseRegistry::standard(),
            workers,
            self.max_loops(),
        )
        .context("Invalid workflow configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path, toml: &str) -> Config {
        std::fs::create_dir_all(dir.join(".bookish")).unwrap();
        std::fs::write(dir.join(".bookish/bookish.toml"), toml).unwrap();
        let mut config = Config::new(dir.to_path_buf()).unwrap();
        config.env = EnvOverrides::default();
        config
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".bookish")).unwrap();
        std::fs::write(
            dir.path().join(".bookish/bookish.toml"),
            "[orchestrator]\nmax_loops = 3\n",
        )
        .unwrap();

        let config = Config::with_cli_args(dir.path().to_path_buf(), true, true, Some(11)).unwrap();
        assert_eq!(config.max_loops(), 11);
        assert!(config.verbose);
        assert_eq!(config.store_backend(), StoreBackend::Memory);
    }

    #[test]
    fn test_paths_resolve_under_project() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path(), "");
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.store_path(), root.join(".bookish/sessions.db"));
        assert_eq!(config.artifact_dir(), root.join(".bookish/artifacts"));
        assert_eq!(config.config_file(), root.join(".bookish/bookish.toml"));
    }

    #[test]
    fn test_auto_publisher_without_token_uses_directory() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path(), "[publisher]\ngithub_owner = \"a\"\ngithub_repo = \"b\"\n");
        assert_eq!(config.build_publisher().unwrap().kind(), "directory");
    }

    #[test]
    fn test_auto_publisher_with_token_uses_github() {
        let dir = tempdir().unwrap();
        let mut config =
            config_in(dir.path(), "[publisher]\ngithub_owner = \"a\"\ngithub_repo = \"b\"\n");
        config.env.github_token = Some("ghp_token".into());
        assert_eq!(config.build_publisher().unwrap().kind(), "github");
    }

    #[test]
    fn test_github_publisher_requires_credentials() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path(), "[publisher]\nkind = \"github\"\n");
        assert!(config.build_publisher().is_err());
    }

    #[tokio::test]
    async fn test_build_orchestrator_with_sqlite_store() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path(), "[metadata]\nenabled = false\n");
        let orchestrator = config.build_orchestrator().unwrap();
        assert_eq!(orchestrator.max_loops(), 5);
        assert!(config.store_path().exists());
    }
}
