//! Issue command - write a new account onto a card

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Confirm, Input};
use tapcard_core::{AccountRecord, DecimalAmount};

use super::{emit_json, get_context, get_reader, wait_for_card};
use crate::output;

/// True when the card image exists and is not blank
fn card_holds_data(card: &Path) -> bool {
    std::fs::metadata(card).map(|m| m.len() > 0).unwrap_or(false)
}

fn refuse_overwrite() -> tapcard_core::Error {
    tapcard_core::Error::validation("card already holds data; pass --force to overwrite it")
}

/// Get a holder field from its flag or prompt for it
fn field_or_prompt(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::<String>::new().with_prompt(prompt).interact_text()?),
    }
}

pub fn run(
    card: &Path,
    wait: bool,
    name: Option<String>,
    surname: Option<String>,
    balance: Option<String>,
    force: bool,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let mut reader = get_reader(&ctx)?;

    let name = field_or_prompt(name, "Name")?;
    let surname = field_or_prompt(surname, "Surname")?;
    let balance_str = match balance {
        Some(b) => b,
        None => Input::<String>::new()
            .with_prompt("Opening balance")
            .default("0".to_string())
            .interact_text()?,
    };
    let balance: DecimalAmount = balance_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid opening balance {:?}", balance_str))?;

    wait_for_card(card, wait, json)?;

    // Issuing replaces whatever the card holds
    if card_holds_data(card) && !force {
        if json {
            return emit_json::<AccountRecord>(Err(refuse_overwrite()));
        }
        if !Confirm::new()
            .with_prompt("This card already holds data. Overwrite it?")
            .default(false)
            .interact()?
        {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let result = reader.issue(&mut ctx.card(card), &name, &surname, balance);
    if json {
        return emit_json(result);
    }

    let record = result?;
    output::success("Card issued");
    println!("{}", output::record_table(&record));
    println!("{}", format!("Key ID: {}", reader.key_id()).dimmed());
    Ok(())
}
