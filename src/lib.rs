//! Storefront health watcher library.

pub mod admin;
pub mod clock;
pub mod config;
pub mod domain;
pub mod ingest;
pub mod lifecycle;
pub mod observability;
pub mod query;
pub mod resilience;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod summary;

pub use config::WatchConfig;
pub use lifecycle::Shutdown;
