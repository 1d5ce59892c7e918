//! Config command - show or change reader settings

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use tapcard_core::OverdraftPolicy;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or set the overdraft policy (reject or warn)
    Overdraft {
        /// New policy
        policy: Option<String>,
    },
}

pub fn run(command: Option<ConfigCommands>) -> Result<()> {
    let mut ctx = get_context()?;

    match command.unwrap_or(ConfigCommands::Show { json: false }) {
        ConfigCommands::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&ctx.config)?);
                return Ok(());
            }

            let capacity = match ctx.config.capacity_limit() {
                Some(bytes) => format!("{} bytes", bytes),
                None => "unlimited".to_string(),
            };
            let mut table = output::create_table();
            table.add_row(vec!["Data directory".to_string(), ctx.data_dir().display().to_string()]);
            table.add_row(vec!["Overdraft policy".to_string(), ctx.config.overdraft.to_string()]);
            table.add_row(vec!["Tag capacity".to_string(), capacity]);
            table.add_row(vec!["Language code".to_string(), ctx.config.language_code.clone()]);
            table.add_row(vec![
                "Key file".to_string(),
                ctx.config.key_path(ctx.data_dir()).display().to_string(),
            ]);
            println!("{}", table);
        }
        ConfigCommands::Overdraft { policy: None } => {
            println!("Overdraft policy is {}", ctx.config.overdraft.as_str().bold());
        }
        ConfigCommands::Overdraft { policy: Some(policy) } => {
            let policy: OverdraftPolicy = policy.parse()?;
            ctx.config.overdraft = policy;
            ctx.save_config()?;
            output::success(&format!("Overdraft policy set to {}", policy));
        }
    }

    Ok(())
}
