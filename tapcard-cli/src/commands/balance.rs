//! Deposit and withdraw commands - change the balance on a card
//!
//! The amount is queued on the reader first and lands on the card in the
//! next tap. A withdrawal reads the card once beforehand so the overdraft
//! policy can see the current balance.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;
use tapcard_core::{OverdraftWarning, SessionOutcome};

use super::{amount_or_prompt, emit_json, get_context, get_reader, wait_for_card};
use crate::output;

pub fn run_deposit(amount: Option<String>, card: &Path, wait: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let mut reader = get_reader(&ctx)?;
    let amount = amount_or_prompt(amount, "Amount to deposit")?;
    reader.request_deposit(amount)?;

    wait_for_card(card, wait, json)?;
    let result = reader.tap(&mut ctx.card(card));
    if json {
        return emit_json(result);
    }

    print_change("Deposit complete", &result?);
    Ok(())
}

pub fn run_withdraw(amount: Option<String>, card: &Path, wait: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let mut reader = get_reader(&ctx)?;
    let amount = amount_or_prompt(amount, "Amount to withdraw")?;

    wait_for_card(card, wait, json)?;
    // Read-only pass: nothing is pending yet
    if json {
        if let Err(e) = reader.tap(&mut ctx.card(card)) {
            return emit_json::<SessionOutcome>(Err(e));
        }
    } else {
        reader.tap(&mut ctx.card(card))?;
    }

    let warning = match reader.request_withdrawal(amount) {
        Ok(warning) => warning,
        Err(e) if json => return emit_json::<SessionOutcome>(Err(e)),
        Err(e) => return Err(e.into()),
    };
    if let Some(warning) = warning.as_ref().filter(|_| !json) {
        print_overdraft(warning);
    }

    let result = reader.tap(&mut ctx.card(card));
    if json {
        return emit_json(result);
    }

    print_change("Withdrawal complete", &result?);
    Ok(())
}

fn print_overdraft(warning: &OverdraftWarning) {
    output::warning(&format!(
        "Withdrawal of {} exceeds the card balance of {}",
        warning.requested, warning.balance
    ));
}

fn print_change(headline: &str, outcome: &SessionOutcome) {
    output::success(headline);

    let mut table = output::create_table();
    table.set_header(vec!["Holder", "Before", "After"]);
    let after = outcome.record.balance();
    let after_cell = if after.is_negative() {
        Cell::new(after.to_canonical().red().to_string())
    } else {
        Cell::new(after.to_canonical())
    };
    table.add_row(vec![
        Cell::new(format!("{} {}", outcome.record.name(), outcome.record.surname())),
        Cell::new(outcome.previous.balance().to_canonical()),
        after_cell,
    ]);
    println!("{}", table);
}
