//! CSV importer with encoding and delimiter auto-detection.
//!
//! Turns raw file bytes into a [`Project`]. Format hints from
//! [`ImportOptions`] take precedence over detection.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::error::CsvError;
use crate::project::{Cell, Column, ColumnType, Project};

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(0);
        CsvError::new(line, err.to_string())
    }
}

/// Declared format hints for the importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Field separator (auto-detect if not specified)
    pub delimiter: Option<char>,

    /// Character encoding label (auto-detect if not specified)
    pub encoding: Option<String>,

    /// Number of header lines: 0 or 1
    pub header_lines: usize,

    /// Drop rows whose fields are all blank
    pub skip_blank_rows: bool,

    /// Trim whitespace around every value
    pub trim_values: bool,

    /// Guess numeric and boolean column types
    pub guess_types: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: None,
            header_lines: 1,
            skip_blank_rows: true,
            trim_values: false,
            guess_types: false,
        }
    }
}

/// Result of importing with metadata
#[derive(Debug, Clone)]
pub struct ImportResult {
    /// The populated project
    pub project: Project,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding label
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, CsvError> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => {
            // Strip a BOM if present; keep going on invalid sequences
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.into_owned())
        }
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(enc) => Ok(enc.decode(bytes).0.into_owned()),
            None => Err(CsvError::new(0, format!("Unsupported encoding: {}", encoding))),
        },
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Characters inside double-quoted fields are not counted.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut in_quotes = false;
    let unquoted: Vec<char> = first_line
        .chars()
        .filter(|&c| {
            if c == '"' {
                in_quotes = !in_quotes;
            }
            !in_quotes && c != '"'
        })
        .collect();

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = unquoted.iter().filter(|&&c| c == sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Import a CSV file into a project.
///
/// # Example
/// ```ignore
/// let result = import_file("/path/to/file.csv", &ImportOptions::default())?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.project.row_count());
/// ```
pub fn import_file<P: AsRef<Path>>(path: P, options: &ImportOptions) -> Result<ImportResult, CsvError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file: {}", e)))?;

    import_bytes(&bytes, options)
}

/// Import CSV bytes into a project.
pub fn import_bytes(bytes: &[u8], options: &ImportOptions) -> Result<ImportResult, CsvError> {
    let encoding = match &options.encoding {
        Some(enc) => enc.clone(),
        None => detect_encoding(bytes),
    };

    let content = decode_content(bytes, &encoding)?;

    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&content));

    let project = import_str(&content, delimiter, options)?;

    Ok(ImportResult {
        project,
        encoding,
        delimiter,
    })
}

/// Import already-decoded CSV text with an explicit delimiter.
pub fn import_str(content: &str, delimiter: char, options: &ImportOptions) -> Result<Project, CsvError> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::new(0, format!("Delimiter must be ASCII, got '{}'", delimiter)));
    }
    if options.header_lines > 1 {
        return Err(CsvError::new(0, "At most one header line is supported"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let mut headers: Vec<String> = Vec::new();
    if options.header_lines == 1 {
        let header = records
            .next()
            .ok_or_else(|| CsvError::new(1, "No headers found"))??;
        headers = header.iter().map(|h| h.trim().to_string()).collect();
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for record in records {
        let record = record?;
        let cells: Vec<Cell> = record
            .iter()
            .map(|field| {
                let field = if options.trim_values { field.trim() } else { field };
                if field.is_empty() {
                    None
                } else {
                    Some(field.to_string())
                }
            })
            .collect();

        if options.skip_blank_rows
            && cells.iter().all(|c| c.as_deref().map_or(true, |v| v.trim().is_empty()))
        {
            continue;
        }

        rows.push(cells);
    }

    // Rows wider than the header get generated column names
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(headers.len());
    while headers.len() < width {
        headers.push(String::new());
    }

    let mut project = Project::new();
    for (i, header) in headers.iter().enumerate() {
        let name = unique_name(&project, header, i);
        project
            .add_column(i, Column::new(name))
            .map_err(|e| CsvError::new(1, e.to_string()))?;
    }

    for (i, mut cells) in rows.into_iter().enumerate() {
        cells.resize(width, None);
        project
            .push_row(cells)
            .map_err(|e| CsvError::new(i + 1 + options.header_lines, e.to_string()))?;
    }

    project.update();

    if options.guess_types {
        guess_column_types(&mut project);
    }

    Ok(project)
}

/// Pick a column name that is not taken yet.
fn unique_name(project: &Project, header: &str, index: usize) -> String {
    let base = if header.is_empty() {
        format!("Column {}", index + 1)
    } else {
        header.to_string()
    };

    if project.column_index(&base).is_none() {
        return base;
    }

    (2..)
        .map(|n| format!("{} {}", base, n))
        .find(|candidate| project.column_index(candidate).is_none())
        .unwrap_or(base)
}

/// Set numeric and boolean type hints on columns whose non-blank values all agree.
fn guess_column_types(project: &mut Project) {
    for col in 0..project.column_count() {
        let values: Vec<&str> = project
            .rows()
            .iter()
            .filter_map(|row| row.value(col))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();

        if values.is_empty() {
            continue;
        }

        let hint = if values.iter().all(|v| v.parse::<f64>().is_ok()) {
            ColumnType::Number
        } else if values
            .iter()
            .all(|v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false"))
        {
            ColumnType::Boolean
        } else {
            ColumnType::Text
        };

        // Index comes from the loop bound, cannot fail
        let _ = project.set_column_type(col, hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(csv: &str) -> Project {
        import_bytes(csv.as_bytes(), &ImportOptions::default())
            .unwrap()
            .project
    }

    #[test]
    fn test_simple_csv() {
        let project = import("name,age\nAlice,30\nBob,25\n");

        assert_eq!(project.column_names(), vec!["name", "age"]);
        assert_eq!(project.row_count(), 2);
        assert_eq!(project.cell(0, 0).unwrap(), Some("Alice"));
        assert_eq!(project.cell(1, 1).unwrap(), Some("25"));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let result = import_bytes(b"a;b;c\n1;2;3", &ImportOptions::default()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.project.cell(0, 2).unwrap(), Some("3"));
    }

    #[test]
    fn test_explicit_delimiter_wins() {
        let options = ImportOptions {
            delimiter: Some('|'),
            ..Default::default()
        };
        let result = import_bytes(b"a,b|c\n1,2|3", &options).unwrap();

        assert_eq!(result.project.column_names(), vec!["a,b", "c"]);
    }

    #[test]
    fn test_quoted_values() {
        let project = import("name,quote\n\"Smith, Alice\",\"She said \"\"hi\"\"\"\n");

        assert_eq!(project.cell(0, 0).unwrap(), Some("Smith, Alice"));
        assert_eq!(project.cell(0, 1).unwrap(), Some("She said \"hi\""));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let project = import("a,b\n1,2\n\n3,4\n , \n");
        assert_eq!(project.row_count(), 2);
    }

    #[test]
    fn test_missing_values_are_absent() {
        let project = import("a,b,c\n1,,3\n4\n");

        assert_eq!(project.cell(0, 1).unwrap(), None);
        assert_eq!(project.cell(1, 2).unwrap(), None);
        assert!(project.check_consistency().is_ok());
    }

    #[test]
    fn test_extra_fields_add_columns() {
        let project = import("a,b\n1,2,3\n");

        assert_eq!(project.column_names(), vec!["a", "b", "Column 3"]);
        assert_eq!(project.cell(0, 2).unwrap(), Some("3"));
    }

    #[test]
    fn test_duplicate_headers_disambiguated() {
        let project = import("x,x,\n1,2,3\n");
        assert_eq!(project.column_names(), vec!["x", "x 2", "Column 3"]);
    }

    #[test]
    fn test_no_header_line() {
        let options = ImportOptions {
            header_lines: 0,
            ..Default::default()
        };
        let project = import_bytes(b"1,2\n3,4\n", &options).unwrap().project;

        assert_eq!(project.column_names(), vec!["Column 1", "Column 2"]);
        assert_eq!(project.row_count(), 2);
    }

    #[test]
    fn test_guess_types() {
        let options = ImportOptions {
            guess_types: true,
            ..Default::default()
        };
        let project = import_bytes(b"n,flag,s\n1.5,true,x\n2,,y\n", &options)
            .unwrap()
            .project;

        let hints: Vec<ColumnType> = project.columns().iter().map(|c| c.type_hint).collect();
        assert_eq!(hints, vec![ColumnType::Number, ColumnType::Boolean, ColumnType::Text]);
    }

    #[test]
    fn test_empty_csv_error() {
        let err = import_bytes(b"", &ImportOptions::default()).unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_detect_delimiter_ignores_quoted_header() {
        assert_eq!(detect_delimiter("\"p;q;r\",s\n1,2\n"), ',');
        assert_eq!(detect_delimiter("\"a,\"\"b\"\",c\";d;e\n"), ';');

        let result = import_bytes(b"\"p;q;r\",s\n1,2\n", &ImportOptions::default()).unwrap();
        assert_eq!(result.delimiter, ',');
        assert_eq!(result.project.column_names(), vec!["p;q;r", "s"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        assert!(decode_content(b"abc", "klingon-8").is_err());
    }

    #[test]
    fn test_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name,age\nAlice,30\n").unwrap();

        let result = import_file(&path, &ImportOptions::default()).unwrap();
        assert_eq!(result.project.row_count(), 1);

        let missing = import_file(dir.path().join("nope.csv"), &ImportOptions::default());
        assert!(missing.unwrap_err().message.contains("Cannot read file"));
    }
}
