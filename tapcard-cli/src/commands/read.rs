//! Read command - show the account on a card

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::{emit_json, get_context, get_reader, wait_for_card};
use crate::output;

pub fn run(card: &Path, wait: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let mut reader = get_reader(&ctx)?;
    wait_for_card(card, wait, json)?;

    let result = reader.tap(&mut ctx.card(card));
    if json {
        return emit_json(result);
    }

    let outcome = result?;
    println!("{}", "Card account".bold());
    println!("{}", output::record_table(&outcome.record));
    Ok(())
}
