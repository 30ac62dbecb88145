//! Web Change Detector Agent Library
//!
//! Manual checks workflow, error recovery and logging for the Web Change
//! Detector visual regression service.

pub mod app;
pub mod authn;
pub mod cache;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod installer;
pub mod logs;
pub mod recovery;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
pub mod workflow;
