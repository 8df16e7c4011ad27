//! Turnier API client
//!
//! Authenticated request pipeline for the Turnier tournament management API:
//! token storage, expiry inspection, proactive single-flight refresh and a
//! dispatcher that turns every response into data or a typed error.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod token;
pub mod version;

#[cfg(test)]
mod tests;

pub use auth::{AuthService, RefreshCoordinator, RefreshOutcome, SessionStatus};
pub use client::{
    ApiClient, HttpRequest, HttpResponse, RequestOptions, ReqwestTransport, ResponseBody,
    Transport,
};
pub use config::{CliConfig, ClientConfig, ClientConfigBuilder};
pub use error::{ErrorCode, Result, TurnierError};
pub use events::{LogoutReason, SessionEvent, SessionEvents};
pub use store::{FileStorage, MemoryStorage, SessionStorage, TokenStore};
pub use token::{Clock, SystemClock, TokenInspector};
pub use turnier_protocol as protocol;
