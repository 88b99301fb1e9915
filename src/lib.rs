pub mod artifacts;
pub mod config;
pub mod error;
pub mod handlers;
pub mod kv;
pub mod metrics;
pub mod models;
pub mod object_store;
pub mod rate_limit;
pub mod retry;
pub mod state;
pub mod sync;
