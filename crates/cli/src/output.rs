// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use clap::ValueEnum;
use em_core::EventRecord;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON record per line
    Json,
    /// One human-readable summary per line
    Text,
}

/// Render records, one per line
pub fn render_records(
    records: &[EventRecord],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        match format {
            OutputFormat::Json => out.push_str(&serde_json::to_string(record)?),
            OutputFormat::Text => {
                let severity = if record.severity.is_empty() {
                    "-"
                } else {
                    record.severity.as_str()
                };
                // Writing to a String cannot fail
                let _ = write!(
                    out,
                    "{} {:<8} {} site={}",
                    record.timestamp.to_rfc3339(),
                    severity,
                    record.event_type,
                    record.site
                );
                if !record.message.is_empty() {
                    let _ = write!(out, " {}", record.message);
                }
            }
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
