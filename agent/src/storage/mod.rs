//! Persistent storage

pub mod layout;
pub mod options;
pub mod settings;
