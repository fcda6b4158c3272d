//! In-memory catalog for exercising the snapshot and rollback logic without a server.
//! Each database is a list of rows; failures can be injected per primitive.

use async_trait::async_trait;
use std::io;

use super::catalog::Catalog;
use super::connection_url::ConnectionUrl;
use super::error::{OperatorError, Result};

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    databases: Vec<(String, Vec<String>)>,
    fail_duplicate_into: Option<String>,
    fail_drop_of: Option<String>,
    fail_preserve: bool,
    fail_reinstate: bool,
    pub calls: Vec<String>,
}

impl MemoryCatalog {
    pub fn with_database(name: &str, rows: Vec<String>) -> Self {
        let mut catalog = Self::default();
        catalog.insert_database(name, rows);
        catalog
    }

    pub fn insert_database(&mut self, name: &str, rows: Vec<String>) {
        match self.position(name) {
            Some(i) => self.databases[i].1 = rows,
            None => self.databases.push((name.to_string(), rows)),
        }
    }

    pub fn rows(&self, name: &str) -> Option<&Vec<String>> {
        self.position(name).map(|i| &self.databases[i].1)
    }

    pub fn rows_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        self.position(name).map(|i| &mut self.databases[i].1)
    }

    pub fn names(&self) -> Vec<String> {
        self.databases.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn fail_duplicate_into(&mut self, target: &str) {
        self.fail_duplicate_into = Some(target.to_string());
    }

    pub fn fail_drop_of(&mut self, name: &str) {
        self.fail_drop_of = Some(name.to_string());
    }

    pub fn fail_preserve(&mut self) {
        self.fail_preserve = true;
    }

    pub fn fail_reinstate(&mut self) {
        self.fail_reinstate = true;
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.databases.iter().position(|(n, _)| n == name)
    }

    fn take(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name).map(|i| self.databases.remove(i).1)
    }

    fn failure(operation: &str, detail: &str) -> OperatorError {
        OperatorError::connection(operation, "memory://localhost", io::Error::other(detail.to_string()))
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    const NAME: &'static str = "memory";
    const SCHEME: &'static str = "memory";
    const ADMIN_DATABASE: &'static str = "admin";
    const MAX_NAME_LEN: usize = 63;

    async fn connect(_url: &ConnectionUrl) -> Result<Self> {
        Ok(Self::default())
    }

    async fn database_names(&mut self) -> Result<Vec<String>> {
        self.calls.push("list".into());
        Ok(self.names())
    }

    async fn duplicate(&mut self, source: &str, target: &str) -> Result<()> {
        self.calls.push(format!("duplicate {source} {target}"));
        if self.fail_duplicate_into.as_deref() == Some(target) {
            return Err(Self::failure("duplicate", "injected failure"));
        }
        if self.position(target).is_some() {
            return Err(Self::failure("duplicate", "target exists"));
        }
        let rows = self
            .rows(source)
            .cloned()
            .ok_or_else(|| Self::failure("duplicate", "source does not exist"))?;
        self.databases.push((target.to_string(), rows));
        Ok(())
    }

    async fn drop_database(&mut self, name: &str) -> Result<()> {
        self.calls.push(format!("drop {name}"));
        if self.fail_drop_of.as_deref() == Some(name) {
            return Err(Self::failure("drop", "injected failure"));
        }
        self.take(name);
        Ok(())
    }

    async fn preserve(&mut self, source: &str, backup: &str) -> Result<bool> {
        self.calls.push(format!("preserve {source} {backup}"));
        let Some(rows) = self.rows(source).cloned() else {
            return Ok(false);
        };
        if self.fail_preserve {
            // Leaves a partial copy behind, like an interrupted clone.
            self.databases.push((backup.to_string(), rows.into_iter().take(1).collect()));
            return Err(Self::failure("preserve", "injected failure"));
        }
        self.take(source);
        self.databases.push((backup.to_string(), rows));
        Ok(true)
    }

    async fn reinstate(&mut self, backup: &str, source: &str) -> Result<()> {
        self.calls.push(format!("reinstate {backup} {source}"));
        if self.fail_reinstate || self.position(source).is_some() {
            return Err(Self::failure("reinstate", "cannot reinstate"));
        }
        let rows = self
            .take(backup)
            .ok_or_else(|| Self::failure("reinstate", "backup does not exist"))?;
        self.databases.push((source.to_string(), rows));
        Ok(())
    }
}
