use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use rentcpi::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for rentcpi::AppCommand {
    fn from(cmd: Commands) -> rentcpi::AppCommand {
        match cmd {
            Commands::Schedule { months } => rentcpi::AppCommand::Schedule { months },
            Commands::Cpi { count } => rentcpi::AppCommand::Cpi { count },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display the CPI-adjusted rent schedule
    Schedule {
        /// Number of months to display, starting at the contract start
        #[arg(short, long)]
        months: Option<u32>,
    },
    /// Display the latest monthly CPI figures
    Cpi {
        /// Number of months to display
        #[arg(short = 'n', long, default_value_t = 12)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => rentcpi::cli::setup::setup_at_path(path),
            None => rentcpi::cli::setup::setup(),
        },
        Some(cmd) => rentcpi::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
