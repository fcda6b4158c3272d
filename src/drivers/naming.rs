//! Storage names for snapshot databases.
//!
//! A snapshot of `source` labelled `label` taken at `t` lives in a database
//! called `dbsnap_snapshot_<source>_<label>_<t as unix millis>`.

use chrono::{DateTime, Utc};

use super::error::{OperatorError, Result};

/// Marks snapshot databases; listing keeps only names starting with it.
pub const SNAPSHOT_PREFIX: &str = "dbsnap_snapshot_";

/// Prefix of the pre-image kept while a safe restore is running.
pub const BACKUP_PREFIX: &str = "temp_emergency_backup_";

const SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    pub source_database: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl SnapshotName {
    pub fn new(source_database: &str, label: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            source_database: source_database.to_string(),
            label: label.to_string(),
            created_at,
        }
    }

    pub fn encode(&self) -> Result<String> {
        encode(&self.source_database, &self.label, self.created_at)
    }
}

pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == SEPARATOR)
}

pub fn validate_label(label: &str) -> Result<()> {
    if is_valid_label(label) {
        Ok(())
    } else {
        Err(OperatorError::InvalidLabel(label.to_string()))
    }
}

pub fn encode(source_database: &str, label: &str, created_at: DateTime<Utc>) -> Result<String> {
    validate_label(label)?;
    Ok(format!(
        "{SNAPSHOT_PREFIX}{source_database}{SEPARATOR}{label}{SEPARATOR}{}",
        created_at.timestamp_millis()
    ))
}

/// Decode without knowing the source database: the last two segments are the
/// timestamp and the label, everything before them is the source database.
pub fn decode(name: &str) -> Result<SnapshotName> {
    let malformed = || OperatorError::MalformedName(name.to_string());

    let rest = name.strip_prefix(SNAPSHOT_PREFIX).ok_or_else(malformed)?;
    let (head, millis) = rest.rsplit_once(SEPARATOR).ok_or_else(malformed)?;
    let (source_database, label) = head.rsplit_once(SEPARATOR).ok_or_else(malformed)?;
    if source_database.is_empty() || label.is_empty() {
        return Err(malformed());
    }
    let created_at = parse_millis(millis).ok_or_else(malformed)?;

    Ok(SnapshotName::new(source_database, label, created_at))
}

/// Decode a name known to belong to `source_database`. Exact even when the
/// label itself contains underscores. Returns `None` for other databases'
/// snapshots.
pub fn decode_for(name: &str, source_database: &str) -> Option<SnapshotName> {
    let rest = name
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_prefix(source_database)?
        .strip_prefix(SEPARATOR)?;
    let (label, millis) = rest.rsplit_once(SEPARATOR)?;
    if !is_valid_label(label) {
        return None;
    }
    let created_at = parse_millis(millis)?;
    Some(SnapshotName::new(source_database, label, created_at))
}

/// Decode `name` against the databases that exist on the server.
///
/// When several of them could own the name, the longest wins: with both `app`
/// and `app_test` present, `dbsnap_snapshot_app_test_v1_<t>` is `v1` of
/// `app_test`, not `test_v1` of `app`. Names no listed database owns fall back
/// to [`decode`].
pub fn decode_among<'a, I>(name: &str, databases: I) -> Result<SnapshotName>
where
    I: IntoIterator<Item = &'a str>,
{
    databases
        .into_iter()
        .filter_map(|database| decode_for(name, database))
        .max_by_key(|parts| parts.source_database.len())
        .map_or_else(|| decode(name), Ok)
}

pub fn backup_name(source_database: &str) -> String {
    format!("{BACKUP_PREFIX}{source_database}")
}

fn parse_millis(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: i64 = raw.parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}
