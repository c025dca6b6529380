use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use swiftflow::config::{AppConfig, CliOverrides};

mod cmd;

#[derive(Parser)]
#[command(name = "swiftflow")]
#[command(version, about = "Order tracking back-end with a per-department selection ledger")]
pub struct Cli {
    /// Path to the config file. Defaults to ./swiftflow.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (CORS permissive for a local front-end)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and run migrations, then exit
    InitDb {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// View, validate or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration
    Validate,
    /// Write a default swiftflow.toml
    Init,
}

impl Commands {
    fn overrides(&self) -> CliOverrides {
        match self {
            Commands::Serve {
                host,
                port,
                db_path,
                dev,
            } => CliOverrides {
                host: host.clone(),
                port: *port,
                db_path: db_path.clone(),
                dev_mode: *dev,
            },
            Commands::InitDb { db_path } => CliOverrides {
                db_path: db_path.clone(),
                ..CliOverrides::default()
            },
            Commands::Config { .. } => CliOverrides::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Commands::Config {
        command: Some(ConfigCommands::Init),
    } = &cli.command
    {
        return cmd::cmd_config_init(cli.config.as_deref());
    }

    let config = AppConfig::resolve(cli.config.as_deref(), &cli.command.overrides())?;
    swiftflow::logging::init_logging(&config.logging);

    match &cli.command {
        Commands::Serve { .. } => cmd::cmd_serve(&config).await?,
        Commands::InitDb { .. } => cmd::cmd_init_db(&config)?,
        Commands::Config { command } => {
            cmd::cmd_config(&config, cli.config.as_deref(), command.clone())?
        }
    }

    Ok(())
}
