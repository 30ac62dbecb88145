//! Web Change Detector API models

pub mod models;
