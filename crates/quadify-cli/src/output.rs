//! Printing helpers shared by the commands.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result as pretty JSON. Text output is left to the
/// command.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    if let OutputFormat::Json = format {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!(
                "{}: failed to serialize result: {}",
                "Error".red().bold(),
                e
            ),
        }
    }
}

/// Green check line in text mode.
pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if !quiet && matches!(format, OutputFormat::Text) {
        println!("{} {}", "✓".green().bold(), message);
    }
}

/// Neutral status line in text mode.
pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if !quiet && matches!(format, OutputFormat::Text) {
        println!("{} {}", "•".cyan(), message);
    }
}
