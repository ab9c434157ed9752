pub mod app;
pub mod error;
pub mod publisher;
pub mod routes;
pub mod state;
