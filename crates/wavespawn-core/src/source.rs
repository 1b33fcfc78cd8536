//! Rule table sources.
//!
//! A source yields raw textual rows; it never interprets field values.
//! Typing and validation happen in [`crate::store::load`], so every source
//! format is held to the same rules.
//!
//! Supported formats:
//!
//! - CSV (`.csv`): a header row naming the columns, in any order. Fields may
//!   be double-quoted (with `""` as an escaped quote) so `enemy_no_list` and
//!   `description` can contain commas. Blank lines are skipped and unknown
//!   columns are ignored.
//! - YAML (`.yaml` / `.yml`): a sequence of mappings. Scalars are taken as
//!   text; a sequence value (e.g. `enemy_no_list: [1, 2]`) is joined with
//!   commas.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::store::LoadError;

/// One record of the rule table in textual form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRuleRow {
    /// 1-based position in the source (line for CSV, entry for YAML).
    position: usize,
    fields: BTreeMap<String, String>,
}

impl RawRuleRow {
    /// Create an empty row at the given source position.
    pub const fn new(position: usize) -> Self {
        Self {
            position,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field. Names are matched case-insensitively.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.fields
            .insert(name.trim().to_ascii_lowercase(), value.into());
    }

    /// Raw value of a field, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// 1-based position in the source.
    pub const fn position(&self) -> usize {
        self.position
    }
}

/// Anything that can produce the rows of a rule table.
pub trait RuleSource {
    /// Read all rows.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the source is missing or cannot be
    /// decoded into rows.
    fn rows(&self) -> Result<Vec<RawRuleRow>, LoadError>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// Rows held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineRows(pub Vec<RawRuleRow>);

impl RuleSource for InlineRows {
    fn rows(&self) -> Result<Vec<RawRuleRow>, LoadError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("inline ({} rows)", self.0.len())
    }
}

/// A rule table file. The format is chosen from the extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a source for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for FileSource {
    fn rows(&self) -> Result<Vec<RawRuleRow>, LoadError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::Missing {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(LoadError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => parse_csv(&contents),
            Some("yaml" | "yml") => parse_yaml(&contents),
            _ => Err(LoadError::UnsupportedFormat {
                path: self.path.clone(),
            }),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Split CSV text into rows keyed by the header line.
///
/// # Errors
///
/// Returns [`LoadError::Csv`] for an unterminated quoted field, a missing
/// header, or a record with more fields than the header.
pub fn parse_csv(text: &str) -> Result<Vec<RawRuleRow>, LoadError> {
    let records = split_records(text.trim_start_matches('\u{feff}'))?;
    let mut records = records.into_iter();

    let Some((_, header)) = records.next() else {
        return Err(LoadError::Csv {
            line: 1,
            reason: "missing header row".to_owned(),
        });
    };
    let header: Vec<String> = header
        .iter()
        .map(|name| name.trim().to_ascii_lowercase())
        .collect();

    records
        .map(|(line, fields)| {
            // Surplus fields mean a stray comma shifted the record.
            if fields.len() > header.len() {
                return Err(LoadError::Csv {
                    line,
                    reason: format!(
                        "expected {} fields, found {}",
                        header.len(),
                        fields.len()
                    ),
                });
            }
            let mut row = RawRuleRow::new(line);
            for (name, value) in header.iter().zip(fields) {
                row.insert(name, value);
            }
            Ok(row)
        })
        .collect()
}

/// Tokenize CSV text into `(line, fields)` records, skipping blank lines.
fn split_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, LoadError> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line: usize = 1;
    let mut record_line: usize = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => {
                    if c == '\n' {
                        line = line.saturating_add(1);
                    }
                    field.push(c);
                }
            }
            continue;
        }

        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                push_record(&mut records, record_line, std::mem::take(&mut fields));
                line = line.saturating_add(1);
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(LoadError::Csv {
            line: record_line,
            reason: "unterminated quoted field".to_owned(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        push_record(&mut records, record_line, fields);
    }
    Ok(records)
}

fn push_record(records: &mut Vec<(usize, Vec<String>)>, line: usize, fields: Vec<String>) {
    if fields.iter().all(|f| f.trim().is_empty()) {
        return;
    }
    records.push((line, fields));
}

// ---------------------------------------------------------------------------
// YAML
// ---------------------------------------------------------------------------

/// Read a YAML sequence of mappings into rows.
///
/// # Errors
///
/// Returns [`LoadError::Yaml`] if the document is not a sequence of
/// mappings, or [`LoadError::Malformed`] for a nested mapping value.
pub fn parse_yaml(text: &str) -> Result<Vec<RawRuleRow>, LoadError> {
    let entries: Vec<BTreeMap<String, serde_yml::Value>> = serde_yml::from_str(text)?;
    let mut rows = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let mut row = RawRuleRow::new(index.saturating_add(1));
        for (name, value) in &entry {
            match yaml_text(value) {
                Ok(Some(text)) => row.insert(name, text),
                Ok(None) => {}
                Err(reason) => {
                    return Err(LoadError::Malformed {
                        row: row.position(),
                        reason: format!("field {name}: {reason}"),
                    });
                }
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Textual form of a YAML value. `None` for null, which reads as absent.
fn yaml_text(value: &serde_yml::Value) -> Result<Option<String>, String> {
    use serde_yml::Value;

    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Sequence(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                if let Some(text) = yaml_text(item)? {
                    parts.push(text);
                }
            }
            Ok(Some(parts.join(",")))
        }
        Value::Mapping(_) | Value::Tagged(_) => Err("expected a scalar or a list".to_owned()),
    }
}
