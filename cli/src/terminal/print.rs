use std::io::Write;

use colored::*;
use lookout_common::FactRecord;

pub const TOTAL_WIDTH: usize = 64;

const PRIMARY: Color = Color::BrightGreen;
const SEPARATOR: Color = Color::BrightBlack;
const TEXT_DEFAULT: Color = Color::White;

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let msg_len: usize = formatted.chars().count();

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: ColoredString = format!(
        "{}{}{}",
        "─".repeat(left),
        formatted.to_uppercase().color(PRIMARY),
        "─".repeat(right)
    )
    .color(SEPARATOR);

    println!("{line}");
}

pub fn aligned_line(key: &str, key_width: usize, value: &str) {
    let dots: String = ".".repeat((key_width + 1).saturating_sub(key.chars().count()));
    println!(
        "{} {}{}{} {}",
        ">".color(SEPARATOR),
        key.color(PRIMARY),
        dots.color(SEPARATOR),
        ":".color(SEPARATOR),
        value.color(TEXT_DEFAULT)
    );
}

pub fn separator() {
    println!("{}", "═".repeat(TOTAL_WIDTH).color(SEPARATOR));
}

/// One record as one JSON line on stdout.
pub fn fact_line(record: &FactRecord) -> anyhow::Result<()> {
    let line = serde_json::to_string(record)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}
