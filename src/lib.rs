pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod router;
pub mod service;
pub mod telemetry;

pub use config::Config;
pub use db::Backends;
pub use error::StoreError;
