//! # dariah_core
//!
//! Session validation and request admission for the DARIAH reporting portal.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod rate_limit;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
