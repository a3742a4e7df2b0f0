pub mod types;
pub mod captures;
pub mod config;
pub mod error;
pub mod stats;
pub mod cancel;
pub mod query_info;
