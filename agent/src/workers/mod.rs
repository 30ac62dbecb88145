//! Background workers

pub mod health_sync;
pub mod log_retention;
