use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use super::catalog::Catalog;
use super::error::{OperatorError, Result};
use super::naming::backup_name;

/// Run a destructive `mutate` against `source` with a pre-image to fall back on.
///
/// The pre-image is taken with the catalog's `preserve` primitive under
/// `temp_emergency_backup_<source>`. If `mutate` fails, the partial `source` is
/// dropped, the pre-image is put back and the error from `mutate` is returned
/// unchanged. Rollback failures are logged and swallowed.
pub async fn backup_and_run<C, F>(catalog: &mut C, source: &str, mutate: F) -> Result<()>
where
    C: Catalog,
    F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, Result<()>>,
{
    let backup = backup_name(source);
    // An over-long name would be truncated by the server and never match below.
    if backup.len() > C::MAX_NAME_LEN {
        return Err(OperatorError::NameTooLong {
            name: backup,
            limit: C::MAX_NAME_LEN,
        });
    }

    if catalog.database_names().await?.iter().any(|n| *n == backup) {
        return Err(OperatorError::StaleBackup(backup));
    }

    let preserved = match catalog.preserve(source, &backup).await {
        Ok(preserved) => preserved,
        Err(err) => {
            // A half-written copy is worthless; the source itself was not touched.
            swallow("drop partial backup", catalog.drop_database(&backup).await);
            return Err(err);
        }
    };
    debug!(source, backup = %backup, preserved, "pre-image taken");

    match mutate(&mut *catalog).await {
        Ok(()) => {
            if preserved {
                swallow("drop backup", catalog.drop_database(&backup).await);
            }
            Ok(())
        }
        Err(err) => {
            warn!(source, error = %err, "restore failed, rolling back");
            swallow("drop partial source", catalog.drop_database(source).await);
            if preserved {
                match catalog.reinstate(&backup, source).await {
                    Ok(()) => swallow("drop backup", catalog.drop_database(&backup).await),
                    Err(rollback_err) => {
                        swallow("reinstate backup", Err(rollback_err));
                        error!(
                            source,
                            backup = %backup,
                            "could not put the original database back; its copy is kept under the backup name"
                        );
                    }
                }
            }
            Err(err)
        }
    }
}

fn swallow(step: &'static str, result: Result<()>) {
    if let Err(source) = result {
        let err = OperatorError::Rollback {
            step,
            source: Box::new(source),
        };
        warn!(error = %err, "ignoring cleanup failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::memory::MemoryCatalog;

    fn rows(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("row{i}")).collect()
    }

    #[tokio::test]
    async fn success_drops_backup() {
        let mut catalog = MemoryCatalog::with_database("main", rows(3));

        backup_and_run(&mut catalog, "main", |c| {
            Box::pin(async move {
                c.drop_database("main").await?;
                c.insert_database("main", rows(1));
                Ok::<_, OperatorError>(())
            })
        })
        .await
        .unwrap();

        assert_eq!(catalog.rows("main").unwrap().len(), 1);
        assert_eq!(catalog.names(), vec!["main"]);
    }

    #[tokio::test]
    async fn failure_restores_source_and_returns_original_error() {
        let mut catalog = MemoryCatalog::with_database("main", rows(5));
        let before = catalog.rows("main").unwrap().clone();

        let err = backup_and_run(&mut catalog, "main", |c| {
            Box::pin(async move {
                c.drop_database("main").await?;
                c.insert_database("main", rows(2));
                Err::<(), _>(OperatorError::EmptySource("snap".into()))
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, OperatorError::EmptySource(ref db) if db == "snap"));
        assert_eq!(catalog.rows("main").unwrap(), &before);
        assert!(!catalog.names().iter().any(|n| n.starts_with("temp_emergency_backup_")));
    }

    #[tokio::test]
    async fn failing_cleanup_does_not_mask_error() {
        let mut catalog = MemoryCatalog::with_database("main", rows(5));
        catalog.fail_drop_of("main");

        let err = backup_and_run(&mut catalog, "main", |_c| {
            Box::pin(async move { Err::<(), _>(OperatorError::EmptySource("snap".into())) })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, OperatorError::EmptySource(_)));
    }

    #[tokio::test]
    async fn failed_reinstate_keeps_backup() {
        let mut catalog = MemoryCatalog::with_database("main", rows(5));
        catalog.fail_reinstate();

        let result = backup_and_run(&mut catalog, "main", |c| {
            Box::pin(async move {
                c.drop_database("main").await?;
                Err::<(), _>(OperatorError::EmptySource("snap".into()))
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(
            catalog.rows("temp_emergency_backup_main").unwrap().len(),
            5
        );
    }

    #[tokio::test]
    async fn refuses_to_overwrite_stale_backup() {
        let mut catalog = MemoryCatalog::with_database("main", rows(5));
        catalog.insert_database("temp_emergency_backup_main", rows(9));

        let mut ran = false;
        let err = backup_and_run(&mut catalog, "main", |_c| {
            ran = true;
            Box::pin(async move { Ok::<_, OperatorError>(()) })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, OperatorError::StaleBackup(ref n) if n == "temp_emergency_backup_main"));
        assert!(!ran);
        assert_eq!(catalog.rows("main").unwrap().len(), 5);
        assert_eq!(catalog.rows("temp_emergency_backup_main").unwrap().len(), 9);
    }

    #[tokio::test]
    async fn overlong_backup_name_is_refused() {
        let source = "s".repeat(42);
        let mut catalog = MemoryCatalog::with_database(&source, rows(2));

        let mut ran = false;
        let err = backup_and_run(&mut catalog, &source, |_c| {
            ran = true;
            Box::pin(async move { Ok::<_, OperatorError>(()) })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, OperatorError::NameTooLong { limit: 63, .. }));
        assert!(!ran);
        assert!(catalog.calls.is_empty());
        assert_eq!(catalog.names(), vec![source]);
    }

    #[tokio::test]
    async fn absent_source_is_dropped_on_failure() {
        let mut catalog = MemoryCatalog::default();

        let result = backup_and_run(&mut catalog, "main", |c| {
            Box::pin(async move {
                c.insert_database("main", rows(1));
                Err::<(), _>(OperatorError::EmptySource("snap".into()))
            })
        })
        .await;

        assert!(result.is_err());
        assert!(catalog.names().is_empty());
    }
}
