//! Key command - provision and inspect the reader key

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use tapcard_core::ports::KeyCustodian;

use super::get_context;

#[derive(Subcommand)]
pub enum KeyCommands {
    /// Create the reader key if it does not exist yet
    Init {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show whether a reader key is present
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: KeyCommands) -> Result<()> {
    let ctx = get_context()?;
    let path = ctx.key_store.path().display().to_string();

    match command {
        KeyCommands::Init { json } => {
            let existed = ctx.key_store.exists();
            let key = ctx.init_key()?;

            if json {
                println!(
                    "{}",
                    serde_json::json!({ "created": !existed, "keyId": key.key_id(), "path": path })
                );
            } else if existed {
                println!("{}", "Reader key already exists, keeping it".yellow());
                println!("  Key ID: {}", key.key_id());
            } else {
                println!("{}", "Reader key created".green());
                println!("  Key ID: {}", key.key_id());
                println!("  File: {}", path);
                println!(
                    "{}",
                    "Cards written with this key can only be read by readers that share it".dimmed()
                );
            }
        }
        KeyCommands::Status { json } => {
            let key = if ctx.key_store.exists() {
                Some(ctx.key_store.get()?)
            } else {
                None
            };

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "exists": key.is_some(),
                        "keyId": key.as_ref().map(|k| k.key_id()),
                        "encryptions": key.as_ref().map(|k| k.encryptions()),
                        "path": path,
                    })
                );
            } else {
                match key {
                    Some(key) => {
                        println!("Reader key is {}", "PRESENT".green());
                        println!("  Key ID: {}", key.key_id());
                        println!("  File: {}", path);
                    }
                    None => {
                        println!("Reader key is {}", "MISSING".yellow());
                        println!("Run 'tapcard key init' to create one.");
                    }
                }
            }
        }
    }

    Ok(())
}
