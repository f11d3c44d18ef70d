//! Per-cell value operations.
//!
//! Small string functions chained by `text-transform` and `add-column`.
//! Regex patterns are compiled once per process by [`ValuePipeline`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{OperationError, OperationResult};

/// All available value operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueOp {
    /// Remove leading and trailing whitespace
    Trim,

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Uppercase the first letter of every word, lowercase the rest
    Titlecase,

    /// Collapse runs of whitespace into a single space
    CollapseWhitespace,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Pad string at start to reach target length
    PadStart {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Pad string at end to reach target length
    PadEnd {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Extract year (4 digits) from a date string
    ExtractYear,

    /// Ensure string starts with given prefix
    EnsurePrefix { value: String },

    /// Ensure string ends with given suffix
    EnsureSuffix { value: String },

    /// Map values using a lookup table.
    ///
    /// An exact key wins; otherwise, when case-insensitive, the first key in
    /// sorted order that matches ignoring case.
    Map {
        mapping: BTreeMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Value to use when no mapping matches (None keeps the input)
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// Take a range of characters
    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },

    /// Remove all non-alphanumeric characters
    Alphanumeric,

    /// Remove all non-digit characters
    DigitsOnly,
}

fn default_pad_char() -> String {
    "0".to_string()
}

impl ValueOp {
    fn apply(&self, value: &str, regex: Option<&Regex>) -> String {
        match self {
            ValueOp::Trim => value.trim().to_string(),
            ValueOp::Uppercase => value.to_uppercase(),
            ValueOp::Lowercase => value.to_lowercase(),
            ValueOp::Titlecase => titlecase(value),
            ValueOp::CollapseWhitespace => value.split_whitespace().collect::<Vec<_>>().join(" "),
            ValueOp::Replace { value: replacement, .. } => match regex {
                Some(re) => re.replace_all(value, replacement.as_str()).into_owned(),
                None => value.to_string(),
            },
            ValueOp::PadStart { length, char } => pad(value, *length, char, true),
            ValueOp::PadEnd { length, char } => pad(value, *length, char, false),
            ValueOp::ExtractYear => match regex.and_then(|re| re.find(value)) {
                Some(m) => m.as_str().to_string(),
                None => String::new(),
            },
            ValueOp::EnsurePrefix { value: prefix } => {
                if value.starts_with(prefix.as_str()) {
                    value.to_string()
                } else {
                    format!("{}{}", prefix, value)
                }
            }
            ValueOp::EnsureSuffix { value: suffix } => {
                if value.ends_with(suffix.as_str()) {
                    value.to_string()
                } else {
                    format!("{}{}", value, suffix)
                }
            }
            ValueOp::Map { mapping, case_insensitive, default_unmapped } => {
                let found = mapping.get(value).or_else(|| {
                    if !*case_insensitive {
                        return None;
                    }
                    let key = value.to_lowercase();
                    mapping.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v)
                });

                match (found, default_unmapped) {
                    (Some(v), _) => v.clone(),
                    (None, Some(d)) => d.clone(),
                    (None, None) => value.to_string(),
                }
            }
            ValueOp::Substring { start, length } => {
                let chars = value.chars().skip(*start);
                match length {
                    Some(l) => chars.take(*l).collect(),
                    None => chars.collect(),
                }
            }
            ValueOp::Alphanumeric => value.chars().filter(|c| c.is_alphanumeric()).collect(),
            ValueOp::DigitsOnly => value.chars().filter(|c| c.is_ascii_digit()).collect(),
        }
    }

    fn compile(&self) -> OperationResult<Option<Regex>> {
        match self {
            ValueOp::Replace { pattern, .. } => Regex::new(pattern)
                .map(Some)
                .map_err(|e| OperationError::invalid("pattern", e.to_string())),
            ValueOp::ExtractYear => Regex::new(r"\d{4}")
                .map(Some)
                .map_err(|e| OperationError::invalid("pattern", e.to_string())),
            _ => Ok(None),
        }
    }
}

fn pad(value: &str, length: usize, pad_char: &str, at_start: bool) -> String {
    let current = value.chars().count();
    if current >= length {
        return value.to_string();
    }
    let pad = pad_char.chars().next().unwrap_or('0');
    let padding: String = std::iter::repeat(pad).take(length - current).collect();
    if at_start {
        format!("{}{}", padding, value)
    } else {
        format!("{}{}", value, padding)
    }
}

fn titlecase(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// A validated chain of value operations.
#[derive(Debug, Clone)]
pub struct ValuePipeline {
    steps: Vec<(ValueOp, Option<Regex>)>,
}

impl ValuePipeline {
    /// Compile every regex up front so bad patterns fail before any cell changes.
    pub fn new(ops: &[ValueOp]) -> OperationResult<Self> {
        let steps = ops
            .iter()
            .map(|op| op.compile().map(|re| (op.clone(), re)))
            .collect::<OperationResult<Vec<_>>>()?;
        Ok(Self { steps })
    }

    /// Parse a GREL-style method chain such as `value.trim().toUppercase()`.
    ///
    /// Only argument-free methods with a direct counterpart are understood.
    pub fn from_expression(expression: &str) -> OperationResult<Self> {
        let body = expression.trim();
        let body = body.strip_prefix("grel:").unwrap_or(body).trim();
        let chain = body
            .strip_prefix("value")
            .ok_or_else(|| OperationError::invalid("expression", format!("unsupported expression: {}", expression)))?;

        let mut ops = Vec::new();
        for call in chain.split('.').filter(|s| !s.is_empty()) {
            let op = match call.trim() {
                "trim()" | "strip()" => ValueOp::Trim,
                "toUppercase()" => ValueOp::Uppercase,
                "toLowercase()" => ValueOp::Lowercase,
                "toTitlecase()" => ValueOp::Titlecase,
                other => {
                    return Err(OperationError::invalid(
                        "expression",
                        format!("unsupported function: {}", other),
                    ))
                }
            };
            ops.push(op);
        }

        Self::new(&ops)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step in order.
    pub fn apply(&self, value: &str) -> String {
        let mut current = value.to_string();
        for (op, regex) in &self.steps {
            current = op.apply(&current, regex.as_ref());
        }
        current
    }
}

/// Get a description of all available value operations
pub fn operations_description() -> String {
    r#"Value operations (used by text-transform and add-column):

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| titlecase | Capitalize every word | - |
| collapse_whitespace | Collapse whitespace runs | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| pad_start | Pad string at start | length, char (default "0") |
| pad_end | Pad string at end | length, char (default "0") |
| extract_year | Extract 4-digit year | - |
| ensure_prefix | Add prefix if not present | value |
| ensure_suffix | Add suffix if not present | value |
| map | Map values using lookup table | mapping, case_insensitive, default_unmapped |
| substring | Extract substring | start, length (optional) |
| alphanumeric | Keep only alphanumeric chars | - |
| digits_only | Keep only digits | - |"#
        .to_string()
}
