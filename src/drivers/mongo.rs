use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::results::{CollectionSpecification, CollectionType};
use mongodb::{Client, Database, IndexModel};
use tracing::debug;

use super::catalog::Catalog;
use super::connection_url::ConnectionUrl;
use super::error::{OperatorError, Result};

const INSERT_BATCH: usize = 1000;

/// Session against a MongoDB server through its `admin` database.
///
/// MongoDB has neither database rename nor clone-from-template, so copies are
/// document-by-document. A copy is not atomic: an interrupted clone leaves a
/// partially populated target behind.
pub struct MongoCatalog {
    client: Client,
    url: String,
}

impl MongoCatalog {
    fn failed(&self, operation: String) -> impl FnOnce(mongodb::error::Error) -> OperatorError {
        let url = self.url.clone();
        move |e| OperatorError::connection(operation, url, e)
    }

    async fn collection_names(&self, database: &Database) -> Result<Vec<String>> {
        Ok(self
            .collection_specs(database)
            .await?
            .into_iter()
            .map(|spec| spec.name)
            .collect())
    }

    /// Collections and views of `database`, minus `system.*`.
    async fn collection_specs(&self, database: &Database) -> Result<Vec<CollectionSpecification>> {
        let specs: Vec<CollectionSpecification> = database
            .list_collections()
            .await
            .map_err(self.failed(format!("listing collections of {}", database.name())))?
            .try_collect()
            .await
            .map_err(self.failed(format!("listing collections of {}", database.name())))?;
        Ok(specs
            .into_iter()
            .filter(|spec| !spec.name.starts_with("system."))
            .collect())
    }

    /// Copy every collection of `source` into `target`, indexes and collection
    /// options included. Views are recreated from their definition.
    async fn clone_database(&self, source: &str, target: &str) -> Result<()> {
        let src = self.client.database(source);
        let dst = self.client.database(target);

        let specs = self.collection_specs(&src).await?;
        if specs.is_empty() {
            return Err(OperatorError::EmptySource(source.to_string()));
        }

        for spec in specs {
            let name = spec.name.as_str();
            debug!(source, target, collection = %name, kind = ?spec.collection_type, "copying collection");
            dst.create_collection(name)
                .with_options(spec.options.clone())
                .await
                .map_err(self.failed(format!("creating {target}.{name}")))?;
            if matches!(spec.collection_type, CollectionType::View) {
                continue;
            }

            let src_coll = src.collection::<Document>(name);
            let dst_coll = dst.collection::<Document>(name);

            let mut cursor = src_coll
                .find(doc! {})
                .await
                .map_err(self.failed(format!("reading {source}.{name}")))?;
            let mut batch = Vec::with_capacity(INSERT_BATCH);
            while let Some(document) = cursor
                .try_next()
                .await
                .map_err(self.failed(format!("reading {source}.{name}")))?
            {
                batch.push(document);
                if batch.len() == INSERT_BATCH {
                    dst_coll
                        .insert_many(std::mem::take(&mut batch))
                        .await
                        .map_err(self.failed(format!("writing {target}.{name}")))?;
                }
            }
            if !batch.is_empty() {
                dst_coll
                    .insert_many(batch)
                    .await
                    .map_err(self.failed(format!("writing {target}.{name}")))?;
            }

            let indexes: Vec<IndexModel> = src_coll
                .list_indexes()
                .await
                .map_err(self.failed(format!("reading indexes of {source}.{name}")))?
                .try_collect()
                .await
                .map_err(self.failed(format!("reading indexes of {source}.{name}")))?;
            let secondary: Vec<IndexModel> = indexes
                .into_iter()
                .filter(|index| {
                    index.options.as_ref().and_then(|o| o.name.as_deref()) != Some("_id_")
                })
                .collect();
            if !secondary.is_empty() {
                dst_coll
                    .create_indexes(secondary)
                    .await
                    .map_err(self.failed(format!("creating indexes on {target}.{name}")))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MongoCatalog {
    const NAME: &'static str = "mongodb";
    const SCHEME: &'static str = "mongodb";
    const ADMIN_DATABASE: &'static str = "admin";
    const MAX_NAME_LEN: usize = 63;

    async fn connect(url: &ConnectionUrl) -> Result<Self> {
        let admin = url.with_database(Self::ADMIN_DATABASE);
        let redacted = admin.redacted();
        let client = Client::with_uri_str(admin.as_str())
            .await
            .map_err(|e| OperatorError::connection("connecting", redacted.clone(), e))?;
        // The driver connects lazily; ping so bad credentials fail here.
        client
            .database(Self::ADMIN_DATABASE)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| OperatorError::connection("connecting", redacted.clone(), e))?;
        debug!(url = %redacted, "connected");
        Ok(Self {
            client,
            url: redacted,
        })
    }

    async fn database_names(&mut self) -> Result<Vec<String>> {
        self.client
            .list_database_names()
            .await
            .map_err(self.failed("listing databases".into()))
    }

    async fn duplicate(&mut self, source: &str, target: &str) -> Result<()> {
        self.clone_database(source, target).await
    }

    async fn drop_database(&mut self, name: &str) -> Result<()> {
        debug!(database = name, "dropping");
        self.client
            .database(name)
            .drop()
            .await
            .map_err(self.failed(format!("dropping {name}")))
    }

    async fn preserve(&mut self, source: &str, backup: &str) -> Result<bool> {
        let src = self.client.database(source);
        if self.collection_names(&src).await?.is_empty() {
            return Ok(false);
        }
        self.clone_database(source, backup).await?;
        Ok(true)
    }

    async fn reinstate(&mut self, backup: &str, source: &str) -> Result<()> {
        self.clone_database(backup, source).await
    }
}
