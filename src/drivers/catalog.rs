use async_trait::async_trait;

use super::connection_url::ConnectionUrl;
use super::error::Result;

/// Server-side database primitives a backend must provide.
///
/// A catalog is a live session against the server's bootstrap database, opened
/// once per operator call and dropped at the end of it.
#[async_trait]
pub trait Catalog: Send {
    /// Human-readable backend name, e.g. `postgres`.
    const NAME: &'static str;
    /// URL scheme this backend accepts.
    const SCHEME: &'static str;
    /// Always-present database used for catalog-level commands.
    const ADMIN_DATABASE: &'static str;
    /// Longest database name the server accepts.
    const MAX_NAME_LEN: usize;

    async fn connect(url: &ConnectionUrl) -> Result<Self>
    where
        Self: Sized;

    /// All database names, in the server's own order.
    async fn database_names(&mut self) -> Result<Vec<String>>;

    /// Create `target` as a full copy of `source`.
    async fn duplicate(&mut self, source: &str, target: &str) -> Result<()>;

    /// Drop `name`. Succeeds if it does not exist.
    async fn drop_database(&mut self, name: &str) -> Result<()>;

    /// Move or copy `source` aside to `backup`. Returns `false` when there is
    /// nothing to preserve.
    async fn preserve(&mut self, source: &str, backup: &str) -> Result<bool>;

    /// Put a preserved `backup` back under the name `source`.
    async fn reinstate(&mut self, backup: &str, source: &str) -> Result<()>;
}
