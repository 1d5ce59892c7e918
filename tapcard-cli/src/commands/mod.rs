//! CLI command implementations

pub mod balance;
pub mod config;
pub mod issue;
pub mod key;
pub mod read;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use dialoguer::Input;
use serde::Serialize;
use tapcard_core::{CardReader, DecimalAmount, OperationResult, TapcardContext};
use tracing::debug;

use crate::output;

const CARD_POLL_INTERVAL: Duration = Duration::from_millis(250);
const CARD_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Get the tapcard directory from environment or default
pub fn get_tapcard_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TAPCARD_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".tapcard"))
        .context("Could not find home directory; set TAPCARD_DIR")
}

/// Get or create tapcard context
pub fn get_context() -> Result<TapcardContext> {
    let tapcard_dir = get_tapcard_dir()?;

    std::fs::create_dir_all(&tapcard_dir)
        .with_context(|| format!("Failed to create tapcard directory: {:?}", tapcard_dir))?;

    TapcardContext::new(&tapcard_dir).context("Failed to initialize tapcard context")
}

/// Reader over the provisioned key
pub fn get_reader(ctx: &TapcardContext) -> Result<CardReader> {
    ctx.reader()
        .context("No usable reader key. Run 'tapcard key init' first")
}

/// Block until the card image exists, when asked to
pub fn wait_for_card(card: &Path, wait: bool, quiet: bool) -> Result<()> {
    if !wait || card.is_file() {
        return Ok(());
    }

    if !quiet {
        output::info("Hold a card to the reader...");
    }
    debug!(card = %card.display(), "waiting for card");
    let started = Instant::now();
    while !card.is_file() {
        if started.elapsed() >= CARD_WAIT_TIMEOUT {
            bail!("No card presented within {} seconds", CARD_WAIT_TIMEOUT.as_secs());
        }
        thread::sleep(CARD_POLL_INTERVAL);
    }
    Ok(())
}

/// Parse an amount argument, prompting when it was not given
pub fn amount_or_prompt(amount: Option<String>, prompt: &str) -> Result<DecimalAmount> {
    let raw = match amount {
        Some(a) => a,
        None => Input::<String>::new().with_prompt(prompt).interact_text()?,
    };
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid amount {:?}; use digits with an optional '.' part", raw))
}

/// Render a core result as the pretty `OperationResult` JSON document
pub fn render_json<T: Serialize>(result: tapcard_core::Result<T>) -> Result<String> {
    Ok(serde_json::to_string_pretty(&OperationResult::from(result))?)
}

/// Print a core result as JSON. Failures still end the process non-zero.
pub fn emit_json<T: Serialize>(result: tapcard_core::Result<T>) -> Result<()> {
    let failed = result.is_err();
    println!("{}", render_json(result)?);
    if failed {
        std::process::exit(1);
    }
    Ok(())
}
