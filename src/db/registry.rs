use tracing::info;

use crate::config::DatabaseConfig;
use crate::db::{Document, KeyValue, Relational, document, key_value, relational};
use crate::error::StoreError;

/// The live backend handles of this process.
///
/// Built once during startup, then shared read-only (behind `Arc`) with every
/// request. Holds at most one handle per backend kind; a getter returns
/// `None` for a backend that was never activated.
#[derive(Debug, Clone, Default)]
pub struct Backends {
    relational: Option<Relational>,
    key_value: Option<KeyValue>,
    document: Option<Document>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the provider of every activated backend, in order.
    ///
    /// The first failure is returned and nothing built so far is kept.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut backends = Self::new();

        if cfg.relational.activate.is_on() {
            backends.install_relational(relational::connect(&cfg.relational).await?);
        }
        if cfg.redis.activate.is_on() {
            backends.install_key_value(key_value::connect(&cfg.redis).await?);
        }
        if cfg.mongodb.activate.is_on() {
            backends.install_document(document::connect(&cfg.mongodb).await?);
        }

        info!(
            relational = backends.relational.is_some(),
            key_value = backends.key_value.is_some(),
            document = backends.document.is_some(),
            "backends initialized"
        );
        Ok(backends)
    }

    /// Replace the relational handle, returning the previous one unclosed.
    pub fn install_relational(&mut self, handle: Relational) -> Option<Relational> {
        self.relational.replace(handle)
    }

    pub fn install_key_value(&mut self, handle: KeyValue) -> Option<KeyValue> {
        self.key_value.replace(handle)
    }

    pub fn install_document(&mut self, handle: Document) -> Option<Document> {
        self.document.replace(handle)
    }

    pub fn relational(&self) -> Option<&Relational> {
        self.relational.as_ref()
    }

    pub fn key_value(&self) -> Option<&KeyValue> {
        self.key_value.as_ref()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }
}
