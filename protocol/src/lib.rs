//! Wire types shared between the Turnier API and its clients.
//!
//! - `common`: types that appear in several places (claims, session record, envelope)
//! - `api`: request/response DTOs grouped by endpoint family

pub mod api;
pub mod common;

pub use common::*;
