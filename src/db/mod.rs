//! Storage backends and the tables the service owns.
//!
//! Layout:
//! - `relational.rs`, `key_value.rs`, `document.rs`: one connection provider per backend
//! - `registry.rs`: the `Backends` value holding the live handles
//! - `schema.rs`: per-dialect DDL and migration entry points
//! - `models.rs`: Rust structs mirroring DB rows
//! - `auth.rs`, `catalog.rs`: queries against the relational handle

pub mod auth;
pub mod catalog;
pub mod document;
pub mod key_value;
pub mod models;
pub mod registry;
pub mod relational;
pub mod schema;

use std::fmt;

pub use auth::AuthStorage;
pub use document::Document;
pub use key_value::KeyValue;
pub use models::{CredentialRecord, Hobby, NewCredential, Post};
pub use registry::Backends;
pub use relational::{Relational, RelationalTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Relational,
    KeyValue,
    Document,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Relational => "relational",
            BackendKind::KeyValue => "key-value",
            BackendKind::Document => "document",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
