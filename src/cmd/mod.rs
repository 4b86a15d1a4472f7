//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                   |
//! |-----------|----------------------------------------------------|
//! | `project` | `Init`                                             |
//! | `chat`    | `Chat`, `Say`                                      |
//! | `session` | `Status`, `Events`, `Sessions`, `Forget`, `Recover` |
//! | `config`  | `Config`                                           |

pub mod chat;
pub mod config;
pub mod project;
pub mod session;

pub use chat::{cmd_chat, cmd_say};
pub use config::cmd_config;
pub use project::cmd_init;
pub use session::{cmd_events, cmd_forget, cmd_recover, cmd_sessions, cmd_status};

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

use super::Cli;

/// Resolve configuration and start logging for commands that touch sessions.
/// The returned guard must live until the command finishes.
pub fn runtime(cli: &Cli, project_dir: &Path) -> Result<(bookish::config::Config, Option<WorkerGuard>)> {
    use bookish::config::Config;
    use bookish::telemetry::{LogOptions, init_subscriber};

    let config = Config::with_cli_args(
        project_dir.to_path_buf(),
        cli.verbose,
        cli.ephemeral,
        cli.max_loops,
    )?;
    config.ensure_directories()?;

    let level = if config.verbose {
        "debug"
    } else {
        config.toml.logging.level.as_str()
    };
    let log_dir = config.log_dir();
    let guard = init_subscriber(&LogOptions {
        level,
        json: config.toml.logging.json,
        file_dir: config.toml.logging.file.then_some(log_dir.as_path()),
    });

    Ok((config, guard))
}
