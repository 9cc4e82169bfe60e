use crate::aggregator::RunSummary;
use crate::errors::Result;
use serde::Serialize;
use std::io::Write;

/// Defines the possible output formats for the run summary.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// A simple, human-readable text format.
    #[default]
    Text,
    /// JSON format, suitable for machine processing.
    Json,
}

/// Renders a [`RunSummary`] once a run has completed.
pub struct OutputFormatter {
    format: OutputFormat,
    dry_run: bool,
    tool_name: String,
    tool_version: String,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, dry_run: bool) -> Self {
        Self {
            format,
            dry_run,
            tool_name: env!("CARGO_PKG_NAME").to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Writes the formatted summary to a given writer.
    pub fn write_summary<W: Write>(&self, writer: &mut W, summary: &RunSummary) -> Result<()> {
        let output = match self.format {
            OutputFormat::Text => self.format_text(summary),
            OutputFormat::Json => self.format_json(summary)?,
        };
        writer.write_all(output.as_bytes())?;
        Ok(())
    }

    fn format_text(&self, summary: &RunSummary) -> String {
        let touched_label = if self.dry_run {
            "Files to change"
        } else {
            "Files changed  "
        };
        let mut output = format!("\n{}\n", "-".repeat(50));
        output.push_str(&format!("Files scanned  : {}\n", summary.files_processed));
        output.push_str(&format!("{touched_label}: {}\n", summary.files_touched));
        output.push_str(&format!("Replacements   : {}\n", summary.total_replacements));
        if summary.failed > 0 {
            output.push_str(&format!("Failed         : {}\n", summary.failed));
        }
        if summary.cancelled > 0 {
            output.push_str(&format!("Cancelled      : {}\n", summary.cancelled));
        }
        if self.dry_run {
            output.push_str("\nDry run: no files were modified\n");
        }
        output
    }

    fn format_json(&self, summary: &RunSummary) -> Result<String> {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            tool: &'a str,
            version: &'a str,
            dry_run: bool,
            #[serde(flatten)]
            summary: &'a RunSummary,
        }

        let output = JsonOutput {
            tool: &self.tool_name,
            version: &self.tool_version,
            dry_run: self.dry_run,
            summary,
        };
        let mut json = serde_json::to_string_pretty(&output)?;
        json.push('\n');
        Ok(json)
    }
}
