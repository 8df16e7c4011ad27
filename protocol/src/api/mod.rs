//! API DTOs module
//!
//! - `auth`: login and token refresh

pub mod auth;

pub use auth::*;
