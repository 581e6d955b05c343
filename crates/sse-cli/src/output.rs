//! Output formatting for sse-cli (text, json, csv)

use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use sse_client::Event;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One colored line per event (default)
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// CSV rows with a header
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

/// Event as printed, stamped with the receive time
#[derive(Debug, Serialize)]
pub struct EventRow<'a> {
    pub received_at: String,
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub id: &'a str,
    pub data: &'a str,
}

impl<'a> EventRow<'a> {
    pub fn new(event: &'a Event) -> Self {
        Self {
            received_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event_type: &event.event_type,
            id: &event.id,
            data: &event.data,
        }
    }
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print the CSV header when needed
    pub fn header(&self) {
        if self.format == OutputFormat::Csv {
            println!("received_at,type,id,data");
        }
    }

    /// Print one event in the configured format
    pub fn print_event(&self, event: &Event) {
        let row = EventRow::new(event);
        match self.format {
            OutputFormat::Text => {
                let id = if row.id.is_empty() {
                    String::new()
                } else {
                    format!(" #{}", row.id)
                };
                println!(
                    "{} {}{}: {}",
                    row.received_at.dimmed(),
                    row.event_type.cyan().bold(),
                    id,
                    row.data
                );
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string(&row).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Csv => println!("{}", csv_line(&row)),
        }
    }
}

fn csv_line(row: &EventRow<'_>) -> String {
    [row.received_at.as_str(), row.event_type, row.id, row.data]
        .iter()
        .map(|v| escape_csv(v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
        assert_eq!(escape_csv("carriage\rreturn"), "\"carriage\rreturn\"");
    }

    #[test]
    fn test_csv_line() {
        let event = Event::new("4", "notice", "a,b");
        let row = EventRow {
            received_at: "t".to_string(),
            ..EventRow::new(&event)
        };

        assert_eq!(csv_line(&row), "t,notice,4,\"a,b\"");
    }

    #[test]
    fn test_format_from_config_string() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("csv".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
