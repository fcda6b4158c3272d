use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

use super::catalog::Catalog;
use super::connection_url::ConnectionUrl;
use super::error::{OperatorError, Result};

/// Session against the `postgres` bootstrap database.
///
/// Copies use `CREATE DATABASE ... WITH TEMPLATE`, which refuses to run while
/// anyone is connected to the template, so every catalog-mutating statement is
/// preceded by terminating the other backends on the database it touches.
///
/// The pool holds a single connection so `pg_backend_pid()` always names the
/// session issuing the statements.
pub struct PostgresCatalog {
    pool: PgPool,
    url: String,
    fallback_owner: String,
}

impl PostgresCatalog {
    async fn terminate_connections(&self, database: &str) -> Result<()> {
        debug!(database, "terminating connections");
        sqlx::query(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = $1 AND pid <> pg_backend_pid()",
        )
        .bind(database.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            OperatorError::connection(
                format!("terminating connections to {database}"),
                self.url.clone(),
                e,
            )
        })?;
        Ok(())
    }

    async fn exists(&self, database: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(database.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                OperatorError::connection(format!("looking up {database}"), self.url.clone(), e)
            })
    }

    async fn owner_of(&self, database: &str) -> Result<String> {
        let owner = sqlx::query_scalar::<_, String>(
            "SELECT pg_get_userbyid(datdba)::text FROM pg_database WHERE datname = $1",
        )
        .bind(database.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            OperatorError::connection(format!("looking up owner of {database}"), self.url.clone(), e)
        })?;
        Ok(owner.unwrap_or_else(|| self.fallback_owner.clone()))
    }

    async fn execute_ddl(&self, operation: String, statement: String) -> Result<()> {
        debug!(%statement, "executing");
        // Simple-query protocol: CREATE/DROP DATABASE cannot run as prepared statements.
        sqlx::raw_sql(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| OperatorError::connection(operation, self.url.clone(), e))?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.terminate_connections(from).await?;
        self.execute_ddl(
            format!("renaming {from} to {to}"),
            format!(
                "ALTER DATABASE {} RENAME TO {}",
                quote_ident(from),
                quote_ident(to)
            ),
        )
        .await
    }
}

#[async_trait]
impl Catalog for PostgresCatalog {
    const NAME: &'static str = "postgres";
    const SCHEME: &'static str = "postgresql";
    const ADMIN_DATABASE: &'static str = "postgres";
    const MAX_NAME_LEN: usize = 63;

    async fn connect(url: &ConnectionUrl) -> Result<Self> {
        let admin = url.with_database(Self::ADMIN_DATABASE);
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(admin.as_str())
            .await
            .map_err(|e| OperatorError::connection("connecting", admin.redacted(), e))?;
        debug!(url = %admin, "connected");
        Ok(Self {
            pool,
            url: admin.redacted(),
            fallback_owner: url.username().to_string(),
        })
    }

    async fn database_names(&mut self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT datname::text FROM pg_database")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| OperatorError::connection("listing databases", self.url.clone(), e))
    }

    async fn duplicate(&mut self, source: &str, target: &str) -> Result<()> {
        let owner = self.owner_of(source).await?;
        self.terminate_connections(source).await?;
        self.execute_ddl(
            format!("copying {source} to {target}"),
            format!(
                "CREATE DATABASE {} WITH TEMPLATE {} OWNER {}",
                quote_ident(target),
                quote_ident(source),
                quote_ident(&owner)
            ),
        )
        .await
    }

    async fn drop_database(&mut self, name: &str) -> Result<()> {
        self.terminate_connections(name).await?;
        self.execute_ddl(
            format!("dropping {name}"),
            format!("DROP DATABASE IF EXISTS {}", quote_ident(name)),
        )
        .await
    }

    async fn preserve(&mut self, source: &str, backup: &str) -> Result<bool> {
        if !self.exists(source).await? {
            return Ok(false);
        }
        self.rename(source, backup).await?;
        Ok(true)
    }

    async fn reinstate(&mut self, backup: &str, source: &str) -> Result<()> {
        self.rename(backup, source).await
    }
}

/// Quote an identifier for use in DDL, preserving its case.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
