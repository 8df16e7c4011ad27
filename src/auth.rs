//! Session lifecycle: proactive token refresh, login and status

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info, warn};
use turnier_protocol::api::{LoginRequest, LoginResponse, RefreshTokenResponse};
use turnier_protocol::{ApiEnvelope, SessionRecord, SessionUser};
use validator::Validate;

use crate::client::{
    bearer_header, ApiClient, HttpRequest, RequestOptions, Transport, JSON_CONTENT_TYPE,
};
use crate::error::{Result, TurnierError};
use crate::events::{SessionEvent, SessionEvents};
use crate::store::TokenStore;
use crate::token::TokenInspector;

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";

/// What a call to [`RefreshCoordinator::refresh_if_needed`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No token stored
    NoToken,
    /// Token is fine, expired or unreadable; nothing to refresh
    NotDue,
    /// Another refresh was already running
    InFlight,
    Refreshed,
    /// The refresh call failed; the old token is untouched
    Failed,
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RefreshOutcome::NoToken => "no session",
            RefreshOutcome::NotDue => "not due",
            RefreshOutcome::InFlight => "already in progress",
            RefreshOutcome::Refreshed => "refreshed",
            RefreshOutcome::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Holds the in-flight flag for its lifetime and clears it on drop, so the
/// flag is released on success, failure and cancellation alike.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Keeps a valid session alive by exchanging it before it runs out.
///
/// At most one refresh is in flight per coordinator. Callers that arrive
/// while one is running return immediately instead of waiting for it.
#[derive(Debug)]
pub struct RefreshCoordinator<T: Transport> {
    transport: Arc<T>,
    store: TokenStore,
    inspector: TokenInspector,
    events: SessionEvents,
    refresh_url: String,
    threshold_ms: i64,
    refreshing: AtomicBool,
}

impl<T: Transport> RefreshCoordinator<T> {
    pub fn new(
        transport: Arc<T>,
        store: TokenStore,
        inspector: TokenInspector,
        events: SessionEvents,
        refresh_url: String,
        threshold_ms: i64,
    ) -> Self {
        Self {
            transport,
            store,
            inspector,
            events,
            refresh_url,
            threshold_ms,
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub fn threshold_ms(&self) -> i64 {
        self.threshold_ms
    }

    /// Refresh the stored token if it is still valid but expiring soon.
    ///
    /// Never fails: a failed refresh is logged and the request that triggered
    /// it goes out with the old token. If the server rejects that, the 401
    /// path ends the session.
    pub async fn refresh_if_needed(&self) -> RefreshOutcome {
        if self.is_refreshing() {
            return RefreshOutcome::InFlight;
        }

        let Some(token) = self.store.get_token() else {
            return RefreshOutcome::NoToken;
        };

        // An expired token cannot be exchanged; leave it to the 401 path.
        if !self.inspector.is_valid(&token)
            || !self.inspector.is_expiring_soon(&token, self.threshold_ms)
        {
            return RefreshOutcome::NotDue;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.refreshing) else {
            return RefreshOutcome::InFlight;
        };

        debug!(
            "Session expires in {} ms, refreshing",
            self.inspector.remaining_ms(&token).unwrap_or_default()
        );

        let new_token = match self.exchange(&token).await {
            Ok(new_token) => new_token,
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                return RefreshOutcome::Failed;
            }
        };

        if let Err(e) = self.store.set_token(&new_token) {
            warn!("Refreshed token could not be stored: {}", e);
            return RefreshOutcome::Failed;
        }

        self.events.emit(SessionEvent::TokenRefreshed);
        info!("Session refreshed");
        RefreshOutcome::Refreshed
    }

    async fn exchange(&self, token: &str) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(AUTHORIZATION, bearer_header(token)?);

        let request = HttpRequest {
            method: Method::POST,
            url: self.refresh_url.clone(),
            headers,
            body: None,
        };

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            let message = response
                .server_message()
                .unwrap_or_else(|| "Refresh rejected".to_string());
            return Err(TurnierError::request_failed(response.status, message));
        }

        let refreshed: RefreshTokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| TurnierError::invalid_response(format!("Bad refresh response: {}", e)))?;

        if refreshed.token.trim().is_empty() {
            return Err(TurnierError::invalid_response(
                "Refresh response contained an empty token",
            ));
        }
        Ok(refreshed.token)
    }
}

/// Login responses come bare or wrapped in the standard envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoginReply {
    Bare(LoginResponse),
    Wrapped(ApiEnvelope<LoginResponse>),
}

impl LoginReply {
    fn into_response(self) -> Result<LoginResponse> {
        match self {
            LoginReply::Bare(response) => Ok(response),
            LoginReply::Wrapped(envelope) => envelope
                .into_result()
                .map_err(TurnierError::login_failed),
        }
    }
}

/// Snapshot of the local session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub token_present: bool,
    pub valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_ms: Option<i64>,
    pub refresh_due: bool,
    pub user: Option<SessionUser>,
}

/// Login, logout and status on top of an [`ApiClient`]
#[derive(Debug)]
pub struct AuthService<'a, T: Transport> {
    client: &'a ApiClient<T>,
}

impl<'a, T: Transport> AuthService<'a, T> {
    pub fn new(client: &'a ApiClient<T>) -> Self {
        Self { client }
    }

    /// Exchange credentials for a session and store it.
    ///
    /// Any previous session is cleared first so a stale token is never sent
    /// along with the credentials.
    pub async fn login(&self, request: &LoginRequest) -> Result<SessionRecord> {
        request.validate()?;
        self.client.store().clear_session()?;

        let options = RequestOptions::new(Method::POST).json(request)?;
        let response = self.client.send_raw(LOGIN_ENDPOINT, options).await?;

        match response.status {
            401 | 403 => {
                let message = response
                    .server_message()
                    .unwrap_or_else(|| "Invalid username or password".to_string());
                return Err(TurnierError::login_failed(message));
            }
            status if !response.is_success() => {
                let message = response
                    .server_message()
                    .unwrap_or_else(|| format!("Login failed with status {}", status));
                return Err(TurnierError::request_failed(status, message));
            }
            _ => {}
        }

        let reply: LoginReply = serde_json::from_str(&response.body)
            .map_err(|e| TurnierError::invalid_response(format!("Bad login response: {}", e)))?;
        let login = reply.into_response()?;

        if login.token.trim().is_empty() {
            return Err(TurnierError::invalid_response(
                "Login response contained an empty token",
            ));
        }

        let mut record = SessionRecord::from(login);
        if record.user.is_none() {
            record.user = Some(SessionUser::new(request.username.clone(), None));
        }

        self.client.store().save_session(&record)?;
        info!("Logged in as {}", request.username);
        Ok(record)
    }

    pub fn logout(&self) -> Result<()> {
        self.client.logout()
    }

    pub fn status(&self) -> SessionStatus {
        let store = self.client.store();
        let inspector = self.client.inspector();
        let token = store.get_token();
        let threshold_ms = self.client.refresher().threshold_ms();

        let (valid, expires_at, remaining_ms, refresh_due) = match token.as_deref() {
            Some(token) => {
                let valid = inspector.is_valid(token);
                (
                    valid,
                    inspector.expires_at(token),
                    inspector.remaining_ms(token),
                    valid && inspector.is_expiring_soon(token, threshold_ms),
                )
            }
            None => (false, None, None, false),
        };

        SessionStatus {
            token_present: token.is_some(),
            valid,
            expires_at,
            remaining_ms,
            refresh_due,
            user: store.get_user(),
        }
    }
}
