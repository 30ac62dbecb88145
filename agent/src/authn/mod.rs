//! Admin authentication

pub mod nonce;
