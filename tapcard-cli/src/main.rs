//! Tapcard CLI - issue and update encrypted balance cards

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{balance, config, issue, key, read};

/// Tapcard - encrypted balance cards from your terminal
#[derive(Parser)]
#[command(name = "tapcard", version, about, long_about = None)]
struct Cli {
    /// Log protocol steps to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Card image selection shared by every command that taps a card
#[derive(clap::Args)]
struct CardArgs {
    /// Card image file standing in for the tag in the field
    #[arg(long, env = "TAPCARD_CARD")]
    card: PathBuf,
    /// Wait for the card to appear instead of failing
    #[arg(long)]
    wait: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the reader key
    Key {
        #[command(subcommand)]
        command: key::KeyCommands,
    },

    /// Write a new account onto a card
    Issue {
        #[command(flatten)]
        card: CardArgs,
        /// Account holder's first name
        #[arg(long)]
        name: Option<String>,
        /// Account holder's surname
        #[arg(long)]
        surname: Option<String>,
        /// Opening balance
        #[arg(long)]
        balance: Option<String>,
        /// Overwrite a card that already holds data without asking
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read the account on a card
    Read {
        #[command(flatten)]
        card: CardArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add money to a card
    Deposit {
        /// Amount to add
        amount: Option<String>,
        #[command(flatten)]
        card: CardArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Take money from a card
    Withdraw {
        /// Amount to take
        amount: Option<String>,
        #[command(flatten)]
        card: CardArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change reader settings
    Config {
        #[command(subcommand)]
        command: Option<config::ConfigCommands>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

/// Send tracing output to stderr, filtered by TAPCARD_LOG
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tapcard=debug,tapcard_core=debug")
    } else {
        EnvFilter::try_from_env("TAPCARD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Key { command } => key::run(command),
        Commands::Issue { card, name, surname, balance, force, json } => {
            issue::run(&card.card, card.wait, name, surname, balance, force, json)
        }
        Commands::Read { card, json } => read::run(&card.card, card.wait, json),
        Commands::Deposit { amount, card, json } => {
            balance::run_deposit(amount, &card.card, card.wait, json)
        }
        Commands::Withdraw { amount, card, json } => {
            balance::run_withdraw(amount, &card.card, card.wait, json)
        }
        Commands::Config { command } => config::run(command),
    }
}
