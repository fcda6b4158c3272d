use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::marker::PhantomData;

pub mod backup;
pub mod catalog;
pub mod connection_url;
pub mod error;
pub mod mongo;
pub mod naming;
pub mod postgres;
pub mod selector;
pub mod snapshots;

#[cfg(test)]
pub(crate) mod memory;

pub use catalog::Catalog;
pub use connection_url::ConnectionUrl;
pub use error::{OperatorError, Result};
pub use mongo::MongoCatalog;
pub use postgres::PostgresCatalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub label: String,
    pub source_database: String,
    pub created_at: DateTime<Utc>,
    /// Name of the database holding the snapshot on the server.
    pub storage_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Drop and recreate with no safety net. A failure after the drop leaves
    /// the target database absent.
    Fast,
    /// Keep a pre-image of the target and roll back to it on failure.
    Safe,
}

impl RestoreMode {
    pub fn from_fast(fast: bool) -> Self {
        if fast { Self::Fast } else { Self::Safe }
    }
}

/// Snapshot operations against one live database.
#[async_trait]
pub trait DbOperator: Send + Sync {
    fn name(&self) -> &'static str;

    fn url(&self) -> &ConnectionUrl;

    /// Copy the database into a new snapshot called `label`.
    async fn snapshot(&self, label: &str) -> Result<SnapshotEntry>;

    /// Replace the database with the contents of snapshot `label`.
    async fn restore(&self, label: &str, mode: RestoreMode) -> Result<()>;

    async fn delete(&self, label: &str) -> Result<()>;

    /// All snapshots on the server, in catalog order.
    async fn list(&self) -> Result<Vec<SnapshotEntry>>;
}

/// The one [`DbOperator`] implementation, parameterised by backend.
pub struct SnapshotOperator<C> {
    url: ConnectionUrl,
    _catalog: PhantomData<fn() -> C>,
}

impl<C: Catalog> SnapshotOperator<C> {
    pub fn new(url: ConnectionUrl) -> Self {
        Self {
            url,
            _catalog: PhantomData,
        }
    }

    fn database(&self) -> &str {
        self.url.database()
    }
}

#[async_trait]
impl<C: Catalog + 'static> DbOperator for SnapshotOperator<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn url(&self) -> &ConnectionUrl {
        &self.url
    }

    async fn snapshot(&self, label: &str) -> Result<SnapshotEntry> {
        naming::validate_label(label)?;
        let mut catalog = C::connect(&self.url).await?;
        snapshots::take(&mut catalog, self.database(), label, Utc::now()).await
    }

    async fn restore(&self, label: &str, mode: RestoreMode) -> Result<()> {
        naming::validate_label(label)?;
        let mut catalog = C::connect(&self.url).await?;
        snapshots::restore(&mut catalog, self.database(), label, mode).await
    }

    async fn delete(&self, label: &str) -> Result<()> {
        naming::validate_label(label)?;
        let mut catalog = C::connect(&self.url).await?;
        snapshots::delete(&mut catalog, self.database(), label).await
    }

    async fn list(&self) -> Result<Vec<SnapshotEntry>> {
        let mut catalog = C::connect(&self.url).await?;
        snapshots::list(&mut catalog, self.database()).await
    }
}
