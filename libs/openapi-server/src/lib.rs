//! Admin surface models

pub mod models;
