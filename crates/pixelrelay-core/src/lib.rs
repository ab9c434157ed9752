pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod kpi;
pub mod memory;
pub mod page;
pub mod store;
