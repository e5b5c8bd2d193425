use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use coinfolio::core::log::init_logging;

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

impl From<Commands> for coinfolio::AppCommand {
    fn from(cmd: Commands) -> coinfolio::AppCommand {
        match cmd {
            Commands::Add { symbol, amount } => coinfolio::AppCommand::Add { symbol, amount },
            Commands::Remove { symbol, amount } => coinfolio::AppCommand::Remove { symbol, amount },
            Commands::Holdings => coinfolio::AppCommand::Holdings,
            Commands::Total { currency } => coinfolio::AppCommand::Total { currency },
            Commands::Alloc => coinfolio::AppCommand::Alloc,
            Commands::Search { prefix, fiat } => coinfolio::AppCommand::Search { prefix, fiat },
            Commands::Currency { code } => coinfolio::AppCommand::Currency { code },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Add an amount of a crypto asset to the holdings
    Add { symbol: String, amount: f64 },
    /// Remove an amount of a crypto asset from the holdings
    Remove { symbol: String, amount: f64 },
    /// Display holdings with their current value
    Holdings,
    /// Display the total value of the holdings
    Total {
        /// Currency to value in instead of the configured one
        #[arg(long)]
        currency: Option<String>,
    },
    /// Display the allocation across assets
    Alloc,
    /// Suggest crypto symbols or fiat codes starting with a prefix
    Search {
        prefix: String,
        /// Search fiat currency codes instead of crypto symbols
        #[arg(long)]
        fiat: bool,
    },
    /// Choose the preferred display currency
    Currency {
        /// Fiat code such as EUR; empty selects USD
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => coinfolio::cli::setup::setup_at_path(path),
            None => coinfolio::cli::setup::setup(),
        },
        Some(cmd) => coinfolio::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
