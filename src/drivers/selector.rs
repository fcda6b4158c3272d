use std::marker::PhantomData;
use std::sync::Arc;

use super::catalog::Catalog;
use super::connection_url::ConnectionUrl;
use super::error::{OperatorError, Result};
use super::{DbOperator, MongoCatalog, PostgresCatalog, SnapshotOperator};

/// Builds an operator for URLs of one scheme. Building never touches the network.
pub trait OperatorBuilder: Send + Sync {
    fn id(&self) -> &'static str;

    /// Fails with [`OperatorError::UnsupportedScheme`] for URLs of other schemes.
    fn build(&self, url: &str) -> Result<Box<dyn DbOperator>>;
}

pub struct CatalogBuilder<C>(PhantomData<fn() -> C>);

impl<C> CatalogBuilder<C> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<C> Default for CatalogBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Catalog + 'static> OperatorBuilder for CatalogBuilder<C> {
    fn id(&self) -> &'static str {
        C::NAME
    }

    fn build(&self, url: &str) -> Result<Box<dyn DbOperator>> {
        let parsed = ConnectionUrl::parse(url)?;
        if parsed.scheme() != C::SCHEME {
            return Err(OperatorError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        Ok(Box::new(SnapshotOperator::<C>::new(parsed)))
    }
}

pub fn default_builders() -> Vec<Arc<dyn OperatorBuilder>> {
    vec![
        Arc::new(CatalogBuilder::<PostgresCatalog>::new()),
        Arc::new(CatalogBuilder::<MongoCatalog>::new()),
    ]
}

/// Try each builder in order. A scheme mismatch moves on to the next one; any
/// other error is returned as is.
pub fn select_operator(
    url: &str,
    builders: &[Arc<dyn OperatorBuilder>],
) -> Result<Box<dyn DbOperator>> {
    for builder in builders {
        match builder.build(url) {
            Ok(operator) => return Ok(operator),
            Err(err) if err.is_unsupported_scheme() => continue,
            Err(err) => return Err(err),
        }
    }
    let scheme = ConnectionUrl::parse(url)?.scheme().to_string();
    Err(OperatorError::UnsupportedScheme(scheme))
}

/// Id of the builder that accepts `url`, if any.
pub fn backend_id(url: &str, builders: &[Arc<dyn OperatorBuilder>]) -> Option<&'static str> {
    builders
        .iter()
        .find(|b| b.build(url).is_ok())
        .map(|b| b.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl OperatorBuilder for Broken {
        fn id(&self) -> &'static str {
            "broken"
        }

        fn build(&self, _url: &str) -> Result<Box<dyn DbOperator>> {
            Err(OperatorError::MalformedUrl("config problem".into()))
        }
    }

    struct Mismatch;

    impl OperatorBuilder for Mismatch {
        fn id(&self) -> &'static str {
            "mismatch"
        }

        fn build(&self, _url: &str) -> Result<Box<dyn DbOperator>> {
            Err(OperatorError::UnsupportedScheme("other".into()))
        }
    }

    #[test]
    fn picks_postgres() {
        let op = select_operator("postgresql://u:p@localhost/app", &default_builders()).unwrap();
        assert_eq!(op.name(), "postgres");
        assert_eq!(op.url().database(), "app");
    }

    #[test]
    fn picks_mongo() {
        let op = select_operator("mongodb://u:p@localhost:27017/app", &default_builders()).unwrap();
        assert_eq!(op.name(), "mongodb");
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = select_operator("mysql://u:p@localhost/app", &default_builders())
            .err()
            .unwrap();
        assert!(matches!(err, OperatorError::UnsupportedScheme(ref s) if s == "mysql"));
    }

    #[test]
    fn postgres_alias_is_not_accepted() {
        let err = select_operator("postgres://u:p@localhost/app", &default_builders())
            .err()
            .unwrap();
        assert!(err.is_unsupported_scheme());
    }

    #[test]
    fn malformed_url_is_fatal() {
        let err = select_operator("not a url", &default_builders()).err().unwrap();
        assert!(matches!(err, OperatorError::MalformedUrl(_)));
    }

    #[test]
    fn mismatch_falls_through_but_other_errors_stop() {
        let builders: Vec<Arc<dyn OperatorBuilder>> = vec![
            Arc::new(Mismatch),
            Arc::new(CatalogBuilder::<PostgresCatalog>::new()),
        ];
        assert!(select_operator("postgresql://localhost/app", &builders).is_ok());

        let builders: Vec<Arc<dyn OperatorBuilder>> = vec![
            Arc::new(Broken),
            Arc::new(CatalogBuilder::<PostgresCatalog>::new()),
        ];
        let err = select_operator("postgresql://localhost/app", &builders)
            .err()
            .unwrap();
        assert!(matches!(err, OperatorError::MalformedUrl(_)));
    }

    #[test]
    fn backend_ids() {
        let builders = default_builders();
        assert_eq!(backend_id("postgresql://localhost/app", &builders), Some("postgres"));
        assert_eq!(backend_id("mongodb://localhost/app", &builders), Some("mongodb"));
        assert_eq!(backend_id("redis://localhost/0", &builders), None);
    }
}
