use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "bookish")]
#[command(version, about = "Reading companion: pick a book, plan it, get talking about it")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Worker invocations allowed per turn. Overrides bookish.toml.
    #[arg(long, global = true)]
    pub max_loops: Option<usize>,

    /// Keep sessions in memory for this process only
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a bookish project in the current directory
    Init,
    /// Talk with the companion interactively, one turn per line
    Chat {
        /// Resume an existing session (a new one is started otherwise)
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Send a single turn and print the replies
    Say {
        #[arg(short, long)]
        session: String,
        /// What to say
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Show the current phase and state of a session
    Status {
        #[arg(short, long)]
        session: String,
    },
    /// Print a session's event log
    Events {
        #[arg(short, long)]
        session: String,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// List stored sessions
    Sessions,
    /// Drop a session's state, keeping its event log
    Forget {
        #[arg(short, long)]
        session: String,
    },
    /// Show which phase the event log alone would resume at
    Recover {
        #[arg(short, long)]
        session: String,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default bookish.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
        Commands::Chat { session } => {
            let (config, _log_guard) = cmd::runtime(&cli, &project_dir)?;
            cmd::cmd_chat(&config, session.clone()).await?;
        }
        Commands::Say { session, text } => {
            let (config, _log_guard) = cmd::runtime(&cli, &project_dir)?;
            cmd::cmd_say(&config, session, &text.join(" ")).await?;
        }
        Commands::Status { session } => {
            let (config, _log_guard) = cmd::runtime(&cli, &project_dir)?;
            cmd::cmd_status(&config, session).await?;
        }
        Commands::Events { session, json } => {
            let (config, _log_guard) = cmd::runtime(&cli, &project_dir)?;
            cmd::cmd_events(&config, session, *json).await?;
        }
        Commands::Sessions => {
            let (config, _log_guard) = cmd::runtime(&cli, &project_dir)?;
            cmd::cmd_sessions(&config).await?;
        }
        Commands::Forget { session } => {
            let (config, _log_guard) = cmd::runtime(&cli, &project_dir)?;
            cmd::cmd_forget(&config, cli.yes, session).await?;
        }
        Commands::Recover { session } => {
            let (config, _log_guard) = cmd::runtime(&cli, &project_dir)?;
            cmd::cmd_recover(&config, session).await?;
        }
    }

    Ok(())
}
