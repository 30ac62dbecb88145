//! Caches

pub mod api;
