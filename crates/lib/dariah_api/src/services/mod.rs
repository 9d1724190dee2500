//! Services shared by handlers and middleware.

pub mod auth;
pub mod cookies;
