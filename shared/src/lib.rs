//! Shared types, error taxonomy, concurrency gate and remote-source capability
//! for PDF Harvest.
pub mod errors;
pub mod gate;
pub mod models;
pub mod source;
