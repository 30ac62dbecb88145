//! Web Change Detector API client

pub mod account;
pub mod api;
pub mod client;
pub mod comparisons;
pub mod groups;
pub mod queues;
pub mod screenshots;

pub use api::{ApiClient, WebChangeApi};
pub use client::HttpClient;
