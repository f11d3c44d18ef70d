//! Engine configuration.
//!
//! Options are grouped by the phase that reads them. Defaults can be
//! overridden from the environment (a `.env` file is loaded by the CLI):
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `BATCHREFINE_DELIMITER` | input delimiter, e.g. `;` or `tab` |
//! | `BATCHREFINE_ENCODING` | input encoding label |
//! | `BATCHREFINE_OUTPUT_DELIMITER` | output delimiter |
//! | `BATCHREFINE_GUESS_TYPES` | guess column types on import |

use serde::{Deserialize, Serialize};

use crate::exporter::ExportOptions;
use crate::operations::ProcessOptions;
use crate::parser::ImportOptions;

/// Options for one transform run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Declared format hints for the importer
    pub import: ImportOptions,

    /// CSV output settings
    pub export: ExportOptions,

    /// Free-form options handed to every `create_process` call
    pub process: ProcessOptions,
}

impl EngineOptions {
    /// Defaults overridden by `BATCHREFINE_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(d) = lookup("BATCHREFINE_DELIMITER").as_deref().and_then(parse_delimiter) {
            self.import.delimiter = Some(d);
        }
        if let Some(enc) = lookup("BATCHREFINE_ENCODING").filter(|e| !e.trim().is_empty()) {
            self.import.encoding = Some(enc.trim().to_string());
        }
        if let Some(d) = lookup("BATCHREFINE_OUTPUT_DELIMITER").as_deref().and_then(parse_delimiter) {
            self.export.delimiter = d;
        }
        if let Some(flag) = lookup("BATCHREFINE_GUESS_TYPES").as_deref().and_then(parse_flag) {
            self.import.guess_types = flag;
        }
        self
    }
}

/// Parse a delimiter given on the command line or in the environment.
///
/// Accepts a single character or one of `tab`, `\t`, `comma`, `semicolon`, `pipe`.
pub fn parse_delimiter(value: &str) -> Option<char> {
    match value.to_lowercase().as_str() {
        "tab" | "\\t" | "\t" => Some('\t'),
        "comma" => Some(','),
        "semicolon" => Some(';'),
        "pipe" => Some('|'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() => Some(c),
                _ => None,
            }
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_options() {
        let opts = EngineOptions::default();
        assert_eq!(opts.import.delimiter, None);
        assert_eq!(opts.import.header_lines, 1);
        assert!(opts.import.skip_blank_rows);
        assert_eq!(opts.export.delimiter, ',');
        assert!(opts.export.include_header);
        assert!(opts.process.is_empty());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("BATCHREFINE_DELIMITER", "tab"),
            ("BATCHREFINE_ENCODING", "windows-1252"),
            ("BATCHREFINE_OUTPUT_DELIMITER", ";"),
            ("BATCHREFINE_GUESS_TYPES", "yes"),
        ]
        .into_iter()
        .collect();

        let opts = EngineOptions::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(opts.import.delimiter, Some('\t'));
        assert_eq!(opts.import.encoding.as_deref(), Some("windows-1252"));
        assert_eq!(opts.export.delimiter, ';');
        assert!(opts.import.guess_types);
    }

    #[test]
    fn test_bad_overrides_ignored() {
        let opts = EngineOptions::default().with_overrides(|k| match k {
            "BATCHREFINE_DELIMITER" => Some("ab".to_string()),
            "BATCHREFINE_GUESS_TYPES" => Some("maybe".to_string()),
            _ => None,
        });

        assert_eq!(opts.import.delimiter, None);
        assert!(!opts.import.guess_types);
    }

    #[test]
    fn test_from_json_partial() {
        let opts = EngineOptions::from_json(r#"{"export": {"delimiter": "|"}, "process": {"mode": "rows"}}"#).unwrap();

        assert_eq!(opts.export.delimiter, '|');
        assert!(opts.export.include_header);
        assert_eq!(opts.process.get("mode"), Some(&serde_json::json!("rows")));
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(","), Some(','));
        assert_eq!(parse_delimiter("TAB"), Some('\t'));
        assert_eq!(parse_delimiter("semicolon"), Some(';'));
        assert_eq!(parse_delimiter(""), None);
        assert_eq!(parse_delimiter("§"), None);
    }
}
