//! Output formatting for CLI commands.

use clap::ValueEnum;
use colored::Colorize;
use idrange_engine::{IdRange, Identity};
use serde::Serialize;
use tabled::{Table, Tabled};

const CLI_SCHEMA_VERSION: &str = "ipa-idrange-fix.v1";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

/// One table row per range.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RangeRow {
    name: String,
    #[tabled(rename = "type")]
    #[serde(rename = "type")]
    kind: String,
    size: u64,
    first_id: u64,
    last_id: u64,
    #[tabled(display = "display_option")]
    base_rid: Option<u64>,
    #[tabled(display = "display_option")]
    last_base_rid: Option<u64>,
    #[tabled(display = "display_option")]
    secondary_base_rid: Option<u64>,
    #[tabled(display = "display_option")]
    last_secondary_rid: Option<u64>,
}

impl From<&IdRange> for RangeRow {
    fn from(range: &IdRange) -> Self {
        Self {
            name: range.name.clone(),
            kind: range.kind.to_string(),
            size: range.size(),
            first_id: range.first_id(),
            last_id: range.last_id(),
            base_rid: range.base_rid,
            last_base_rid: range.last_base_rid(),
            secondary_base_rid: range.secondary_base_rid,
            last_secondary_rid: range.last_secondary_rid(),
        }
    }
}

/// One table row per user or group.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct IdentityRow {
    kind: String,
    name: String,
    id: u64,
    #[tabled(display = "display_dn")]
    dn: Option<String>,
}

impl From<&Identity> for IdentityRow {
    fn from(identity: &Identity) -> Self {
        Self {
            kind: format!("{:?}", identity.kind()).to_lowercase(),
            name: identity.label().to_string(),
            id: identity.identifier(),
            dn: identity.origin().map(|origin| origin.to_string()),
        }
    }
}

fn display_option(value: &Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn display_dn(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

pub fn range_rows<'a>(ranges: impl IntoIterator<Item = &'a IdRange>) -> Vec<RangeRow> {
    ranges.into_iter().map(RangeRow::from).collect()
}

pub fn identity_rows<'a>(identities: impl IntoIterator<Item = &'a Identity>) -> Vec<IdentityRow> {
    identities.into_iter().map(IdentityRow::from).collect()
}

/// Print rows as a table.
pub fn print_table<T: Tabled>(data: &[T]) {
    if data.is_empty() {
        println!("{}", "No items found.".dimmed());
    } else {
        println!("{}", Table::new(data));
    }
}

/// Print a single item as JSON.
pub fn print_json<T: Serialize + ?Sized>(data: &T) {
    println!("{}", format_json(data, "{}"));
}

/// Print a section header.
pub fn print_header(text: &str) {
    println!();
    println!("{}", text.bold().underline());
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", "Warning:".yellow().bold(), message);
}

/// Print a failure that does not stop the command.
pub fn print_failure(message: &str) {
    println!("{} {}", "Error:".red().bold(), message);
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str) -> String {
    let value = serde_json::to_value(data).unwrap_or_else(|_| serde_json::json!({}));
    let wrapped = wrap_with_schema(value);
    let sorted = sort_json_value(wrapped);
    serde_json::to_string_pretty(&sorted).unwrap_or_else(|_| fallback.to_string())
}

fn wrap_with_schema(value: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "schemaVersion": CLI_SCHEMA_VERSION,
        "data": value
    })
}

fn sort_json_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(values) => {
            serde_json::Value::Array(values.into_iter().map(sort_json_value).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut pairs: Vec<_> = entries.into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut mapped = serde_json::Map::new();
            for (key, value) in pairs {
                mapped.insert(key, sort_json_value(value));
            }
            serde_json::Value::Object(mapped)
        }
        other => other,
    }
}
