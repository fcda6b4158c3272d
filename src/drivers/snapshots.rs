//! Snapshot, list, restore and delete expressed once over [`Catalog`] primitives.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::backup::backup_and_run;
use super::catalog::Catalog;
use super::error::{OperatorError, Result};
use super::naming::{self, SNAPSHOT_PREFIX};
use super::{RestoreMode, SnapshotEntry};

pub async fn take<C: Catalog>(
    catalog: &mut C,
    source: &str,
    label: &str,
    now: DateTime<Utc>,
) -> Result<SnapshotEntry> {
    naming::validate_label(label)?;
    let storage_name = naming::encode(source, label, now)?;
    if storage_name.len() > C::MAX_NAME_LEN {
        return Err(OperatorError::NameTooLong {
            name: storage_name,
            limit: C::MAX_NAME_LEN,
        });
    }

    let names = catalog.database_names().await?;
    let owner = naming::decode_among(&storage_name, owners(&names, source))?;
    if owner.source_database != source {
        return Err(OperatorError::AmbiguousLabel {
            label: label.to_string(),
            database: source.to_string(),
            other: owner.source_database,
        });
    }

    if find_in(&entries(names, source), source, label).is_some() {
        return Err(OperatorError::NameTaken {
            label: label.to_string(),
            database: source.to_string(),
        });
    }

    catalog.duplicate(source, &storage_name).await?;
    info!(source, label, storage = %storage_name, "snapshot created");

    Ok(SnapshotEntry {
        label: label.to_string(),
        source_database: source.to_string(),
        created_at: DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now),
        storage_name,
    })
}

/// Every snapshot database on the server, in catalog order.
///
/// Each name is attributed to the longest existing database (or `source`) it
/// can belong to; names of databases that no longer exist fall back to the
/// generic split. Undecodable names are skipped.
pub async fn list<C: Catalog>(catalog: &mut C, source: &str) -> Result<Vec<SnapshotEntry>> {
    let names = catalog.database_names().await?;
    Ok(entries(names, source))
}

fn entries(names: Vec<String>, source: &str) -> Vec<SnapshotEntry> {
    let owners = owners(&names, source);
    let mut entries = Vec::new();
    for name in names.iter().filter(|n| n.starts_with(SNAPSHOT_PREFIX)) {
        match naming::decode_among(name, owners.iter().copied()) {
            Ok(parts) => entries.push(SnapshotEntry {
                label: parts.label,
                source_database: parts.source_database,
                created_at: parts.created_at,
                storage_name: name.clone(),
            }),
            Err(err) => warn!(error = %err, "skipping unrecognised snapshot database"),
        }
    }
    entries
}

/// Databases that can own a snapshot: every live database plus `source`,
/// which may be absent after a failed fast restore.
fn owners<'a>(names: &'a [String], source: &'a str) -> Vec<&'a str> {
    names
        .iter()
        .map(String::as_str)
        .filter(|n| !n.starts_with(SNAPSHOT_PREFIX))
        .chain(std::iter::once(source))
        .collect()
}

pub async fn find<C: Catalog>(catalog: &mut C, source: &str, label: &str) -> Result<SnapshotEntry> {
    naming::validate_label(label)?;
    let entries = list(catalog, source).await?;
    find_in(&entries, source, label)
        .cloned()
        .ok_or_else(|| OperatorError::SnapshotNotFound {
            label: label.to_string(),
            database: source.to_string(),
        })
}

/// Replace `target` with the contents of snapshot `label`. The snapshot itself
/// is kept.
pub async fn restore<C: Catalog>(
    catalog: &mut C,
    target: &str,
    label: &str,
    mode: RestoreMode,
) -> Result<()> {
    let entry = find(catalog, target, label).await?;
    debug!(target, label, storage = %entry.storage_name, ?mode, "restoring");

    match mode {
        RestoreMode::Fast => replace_from(catalog, target, &entry.storage_name).await?,
        RestoreMode::Safe => {
            let target_owned = target.to_string();
            let storage = entry.storage_name.clone();
            backup_and_run(catalog, target, move |c| {
                Box::pin(async move { replace_from(c, &target_owned, &storage).await })
            })
            .await?
        }
    }

    info!(target, label, ?mode, "snapshot restored");
    Ok(())
}

pub async fn delete<C: Catalog>(catalog: &mut C, source: &str, label: &str) -> Result<()> {
    let entry = find(catalog, source, label).await?;
    catalog.drop_database(&entry.storage_name).await?;
    info!(source, label, storage = %entry.storage_name, "snapshot deleted");
    Ok(())
}

async fn replace_from<C: Catalog>(catalog: &mut C, target: &str, storage_name: &str) -> Result<()> {
    catalog.drop_database(target).await?;
    catalog.duplicate(storage_name, target).await
}

fn find_in<'a>(entries: &'a [SnapshotEntry], source: &str, label: &str) -> Option<&'a SnapshotEntry> {
    entries
        .iter()
        .find(|e| e.source_database == source && e.label == label)
}
