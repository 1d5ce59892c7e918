//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use tapcard_core::AccountRecord;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Account holder and balance as a two-column table
pub fn record_table(record: &AccountRecord) -> Table {
    let mut table = create_table();
    table.add_row(vec![Cell::new("Name"), Cell::new(record.name())]);
    table.add_row(vec![Cell::new("Surname"), Cell::new(record.surname())]);
    table.add_row(vec![
        Cell::new("Balance"),
        Cell::new(record.balance().to_canonical()),
    ]);
    table
}
