pub mod events;
pub mod health;
pub mod kpis;
pub mod relay;
pub mod tracking;
