//! Rule store: turns raw rows into a validated [`RuleSnapshot`].
//!
//! Loading is all-or-nothing. A single bad field anywhere in the table fails
//! the whole load, so a partially parsed rule set is never published.
//!
//! Column schema (one row per rule):
//!
//! | column | type |
//! |---|---|
//! | `rule_id` | integer |
//! | `start_time` | integer seconds |
//! | `end_time` | integer seconds, `-1` = open-ended |
//! | `enemy_no_list` | comma-separated integers, at least one |
//! | `spawn_weight` | float `>= 0` |
//! | `spawn_frequency` | float `> 0` |
//! | `strength_multiplier` | float `> 0` |
//! | `size_multiplier` | float `> 0` |
//! | `enabled` | `true` / `false`, case-insensitive |
//! | `description` | free text |

use std::path::PathBuf;
use std::str::FromStr;

use wavespawn_types::{EntityTypeId, RuleEnd, RuleError, RuleId, SpawnRule, SpawnRuleParts};

use crate::snapshot::RuleSnapshot;
use crate::source::{RawRuleRow, RuleSource};

/// Column names of the rule table, in canonical order.
pub const COLUMNS: [&str; 10] = [
    "rule_id",
    "start_time",
    "end_time",
    "enemy_no_list",
    "spawn_weight",
    "spawn_frequency",
    "strength_multiplier",
    "size_multiplier",
    "enabled",
    "description",
];

/// Errors that can occur while loading a rule table.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The source does not exist.
    #[error("rule source not found: {}", .path.display())]
    Missing {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The source exists but could not be read.
    #[error("failed to read rule source {}: {source}", .path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file extension names no supported format.
    #[error("unsupported rule source format: {}", .path.display())]
    UnsupportedFormat {
        /// Path with the unrecognised extension.
        path: PathBuf,
    },

    /// YAML content is not a sequence of mappings.
    #[error("failed to parse rule YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// CSV content could not be tokenized.
    #[error("CSV error at line {line}: {reason}")]
    Csv {
        /// 1-based line of the failing record.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// A field is missing or not in the expected textual form.
    #[error("row {row}: {reason}")]
    Malformed {
        /// Source position of the row.
        row: usize,
        /// What went wrong.
        reason: String,
    },

    /// The fields parse but violate a rule invariant.
    #[error("row {row}: {source}")]
    InvalidRule {
        /// Source position of the row.
        row: usize,
        /// The violated invariant.
        source: RuleError,
    },

    /// Two rows share a `rule_id`.
    #[error("duplicate rule_id {id} at row {row}")]
    DuplicateRuleId {
        /// The repeated id.
        id: RuleId,
        /// Position of the second occurrence.
        row: usize,
    },
}

impl LoadError {
    /// Whether the source was absent, as opposed to present but malformed.
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Load every row of `source` into an available snapshot.
///
/// Disabled rules are kept; they are filtered at evaluation time.
///
/// # Errors
///
/// Returns the first [`LoadError`] encountered. Nothing is published on
/// failure.
pub fn load(source: &impl RuleSource) -> Result<RuleSnapshot, LoadError> {
    let rows = source.rows()?;
    let mut rules = Vec::with_capacity(rows.len());
    let mut positions = Vec::with_capacity(rows.len());

    for row in &rows {
        rules.push(parse_row(row)?);
        positions.push(row.position());
    }

    RuleSnapshot::from_rules(rules).map_err(|e| match e {
        // Report the source position rather than the table index.
        LoadError::DuplicateRuleId { id, row } => LoadError::DuplicateRuleId {
            id,
            row: row
                .checked_sub(1)
                .and_then(|i| positions.get(i).copied())
                .unwrap_or(row),
        },
        other => other,
    })
}

/// Parse and validate a single row.
///
/// # Errors
///
/// Returns [`LoadError::Malformed`] for a missing or unparseable field and
/// [`LoadError::InvalidRule`] when the values break a rule invariant.
pub fn parse_row(row: &RawRuleRow) -> Result<SpawnRule, LoadError> {
    let end_raw: i64 = parse_number(row, "end_time")?;
    let end_time = RuleEnd::from_raw(end_raw).map_err(|source| LoadError::InvalidRule {
        row: row.position(),
        source,
    })?;

    let parts = SpawnRuleParts {
        id: RuleId(parse_number(row, "rule_id")?),
        start_time: parse_number(row, "start_time")?,
        end_time,
        entity_type_ids: parse_entity_list(row, "enemy_no_list")?,
        spawn_weight: parse_number(row, "spawn_weight")?,
        spawn_frequency: parse_number(row, "spawn_frequency")?,
        strength_multiplier: parse_number(row, "strength_multiplier")?,
        size_multiplier: parse_number(row, "size_multiplier")?,
        enabled: parse_bool(row, "enabled")?,
        description: field(row, "description")?.to_owned(),
    };

    SpawnRule::new(parts).map_err(|source| LoadError::InvalidRule {
        row: row.position(),
        source,
    })
}

fn malformed(row: &RawRuleRow, reason: String) -> LoadError {
    LoadError::Malformed {
        row: row.position(),
        reason,
    }
}

/// Trimmed value of a required field.
fn field<'a>(row: &'a RawRuleRow, name: &str) -> Result<&'a str, LoadError> {
    row.get(name)
        .map(str::trim)
        .ok_or_else(|| malformed(row, format!("missing field {name}")))
}

fn parse_number<T>(row: &RawRuleRow, name: &str) -> Result<T, LoadError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    let text = field(row, name)?;
    text.parse()
        .map_err(|e| malformed(row, format!("field {name}: invalid number {text:?}: {e}")))
}

fn parse_bool(row: &RawRuleRow, name: &str) -> Result<bool, LoadError> {
    let text = field(row, name)?;
    if text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(malformed(
            row,
            format!("field {name}: expected true or false, got {text:?}"),
        ))
    }
}

fn parse_entity_list(row: &RawRuleRow, name: &str) -> Result<Vec<EntityTypeId>, LoadError> {
    let text = field(row, name)?;
    if text.is_empty() {
        return Err(malformed(row, format!("field {name}: empty list")));
    }
    text.split(',')
        .map(|item| {
            let item = item.trim();
            item.parse::<u32>().map(EntityTypeId).map_err(|e| {
                malformed(
                    row,
                    format!("field {name}: invalid entity id {item:?}: {e}"),
                )
            })
        })
        .collect()
}
