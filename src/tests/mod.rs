//! Shared test fixtures

pub mod utils;
