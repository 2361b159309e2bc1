use colored::*;
use std::io::Write;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.chars().count()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_warning(text: &str) {
    println!("{}", text.yellow());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

/// Print without a newline. Flushes so the text shows before input is read.
pub fn print_prompt(text: &str) -> std::io::Result<()> {
    print!("{}", text.yellow().bold());
    std::io::stdout().flush()
}

pub fn print_field(label: &str, value: &str) {
    println!("  {} {}", format!("{}:", label).bold(), value);
}
