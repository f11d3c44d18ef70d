//! CSV exporter.
//!
//! Serializes a [`Project`] back to delimited text. Absent cells are written
//! as empty fields; quoting is applied only where the csv writer needs it
//! unless `quote_all` is set.

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::ExportResult;
use crate::project::Project;

/// Options for CSV export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Output field separator
    pub delimiter: char,

    /// Write the column names as the first line
    pub include_header: bool,

    /// Quote every field
    pub quote_all: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
            quote_all: false,
        }
    }
}

/// Export a project to CSV bytes.
pub fn export(project: &Project, options: &ExportOptions) -> ExportResult<Vec<u8>> {
    let mut buffer = Vec::new();
    export_to(&mut buffer, project, options)?;
    Ok(buffer)
}

/// Export a project as CSV into any writer.
pub fn export_to<W: Write>(writer: W, project: &Project, options: &ExportOptions) -> ExportResult<()> {
    project.check_consistency()?;

    let delimiter = if options.delimiter.is_ascii() {
        options.delimiter as u8
    } else {
        b','
    };

    let quote_style = if options.quote_all {
        csv::QuoteStyle::Always
    } else {
        csv::QuoteStyle::Necessary
    };

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(quote_style)
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(false)
        .from_writer(writer);

    if options.include_header {
        csv_writer.write_record(project.columns().iter().map(|c| c.name.as_str()))?;
    }

    for row in project.rows() {
        csv_writer.write_record(row.cells.iter().map(|c| c.as_deref().unwrap_or("")))?;
    }

    csv_writer.flush()?;
    Ok(())
}
