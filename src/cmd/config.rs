//! Configuration view and validation commands (`bookish config`).

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use bookish::bookish_config::{BookishToml, CONFIG_FILE, EnvOverrides};

    let bookish_dir = project_dir.join(".bookish");
    let config_path = bookish_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Bookish Configuration");
            println!("=====================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                BookishToml::load(&config_path)?
            } else {
                println!("No bookish.toml found at {}", config_path.display());
                println!("Using default configuration.");
                BookishToml::default()
            };
            println!();

            println!("[orchestrator]");
            println!("  max_loops = {}", toml.orchestrator.max_loops);
            println!();

            println!("[store]");
            println!("  backend = \"{}\"", toml.store.backend);
            println!("  path = \"{}\"", toml.store.path);
            println!();

            println!("[scheduling]");
            println!("  pages_per_minute = {}", toml.scheduling.pages_per_minute);
            println!();

            println!("[metadata]");
            println!("  enabled = {}", toml.metadata.enabled);
            println!("  base_url = \"{}\"", toml.metadata.base_url);
            println!("  max_retries = {}", toml.metadata.max_retries);
            println!("  backoff_ms = {}", toml.metadata.backoff_ms);
            println!();

            println!("[publisher]");
            println!("  kind = \"{}\"", toml.publisher.kind);
            if let Some(owner) = &toml.publisher.github_owner {
                println!("  github_owner = \"{}\"", owner);
            }
            if let Some(repo) = &toml.publisher.github_repo {
                println!("  github_repo = \"{}\"", repo);
            }
            println!("  github_api = \"{}\"", toml.publisher.github_api);
            println!("  directory = \"{}\"", toml.publisher.directory);
            println!();

            println!("[logging]");
            println!("  level = \"{}\"", toml.logging.level);
            println!("  json = {}", toml.logging.json);
            println!("  file = {}", toml.logging.file);
            println!();

            // Show effective values (including env overrides)
            let env = EnvOverrides::from_env();
            let mut effective = toml.clone();
            effective.apply_env(&env);
            println!("Effective values (with env overrides):");
            println!("  max_loops = {}", effective.orchestrator.max_loops);
            println!(
                "  GITHUB_TOKEN = {}",
                if env.github_token.is_some() { "set" } else { "unset" }
            );
            println!(
                "  GOOGLE_BOOKS_API_KEY = {}",
                if effective.metadata.api_key.is_some() { "set" } else { "unset" }
            );
            println!();

            if !config_path.exists() {
                println!("Run 'bookish config init' to create a bookish.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let toml = if config_path.exists() {
                BookishToml::load(&config_path)?
            } else {
                println!("No bookish.toml found. Using defaults.");
                BookishToml::default()
            };
            let env = EnvOverrides::from_env();
            let mut warnings = toml.validate();
            warnings.extend(toml.validate_env(&env));

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("bookish.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !bookish_dir.exists() {
                std::fs::create_dir_all(&bookish_dir)?;
            }

            BookishToml::default().save(&config_path)?;

            println!("Created bookish.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [orchestrator] max_loops");
            println!("  - [metadata] enabled, base_url, retries");
            println!("  - [publisher] kind, github_owner, github_repo");
            println!();
        }
    }

    Ok(())
}
