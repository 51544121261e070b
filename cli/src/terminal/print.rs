use colored::*;
use unicode_width::UnicodeWidthStr;

use crate::terminal::{colors, spinner};

pub const TOTAL_WIDTH: usize = 64;

/// Writes one line to stdout without tearing the progress bar.
pub fn print(msg: &str) {
    spinner::get_spinner().suspend(|| println!("{msg}"));
}

pub fn header(msg: &str, q_level: u8) {
    if q_level > 0 {
        return;
    }

    let formatted: String = format!("⟦ {} ⟧", msg.to_uppercase());
    let msg_width: usize = UnicodeWidthStr::width(formatted.as_str());

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_width);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: String = format!(
        "{}{}{}",
        "─".repeat(left).bright_black(),
        formatted.bright_green(),
        "─".repeat(right).bright_black()
    );

    print(&line);
}

pub fn fat_separator(q_level: u8) {
    if q_level > 0 {
        return;
    }
    let sep: ColoredString = "═".repeat(TOTAL_WIDTH).bright_black();
    print(&format!("{}", sep));
}

pub fn print_status<T: AsRef<str>>(msg: T) {
    let prefix: ColoredString = ">".color(colors::SEPARATOR);
    let message: String = format!("{} {}", prefix, msg.as_ref().color(colors::TEXT_DEFAULT));
    print(&message);
}

pub fn centerln(msg: &str) {
    let space = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    print(&format!("{}{}", space, msg));
}

/// Prints a line of the plain-text summary with its markers coloured.
pub fn summary_line(line: &str) {
    if let Some(addr) = line.strip_suffix(" ✓ FOUND") {
        print(&format!("{} {}", addr.color(colors::IPV4_ADDR), "✓ FOUND".green().bold()));
    } else if let Some(addr) = line.strip_suffix(" ✗") {
        print(&format!("{} {}", addr.dimmed(), "✗".red()));
    } else if line.starts_with('[') {
        print(&format!("{}", line.color(colors::PRIMARY).bold()));
    } else {
        print(line);
    }
}

pub fn no_results() {
    centerln(&format!("{}", "NO COZYLIFE DEVICES ANSWERED".red().bold()));
}
