pub mod events;
pub mod tracking;
