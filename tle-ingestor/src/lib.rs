pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod ingest;
pub mod metrics_consts;
pub mod store;
