pub mod backend;
pub mod conversions;
pub mod queries;
pub mod schema;
pub mod store_impl;
pub mod tracking;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `pixelrelay_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
