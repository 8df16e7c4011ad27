//! HTTP client for the Turnier API
//!
//! [`ApiClient::call`] is the single path for authenticated requests: it
//! refreshes the session if due, attaches the bearer token, sends exactly one
//! request and turns the response status into a body or a [`TurnierError`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{RefreshCoordinator, RefreshOutcome};
use crate::config::ClientConfig;
use crate::error::{Result, TurnierError};
use crate::events::{LogoutReason, SessionEvent, SessionEvents};
use crate::store::{FileStorage, MemoryStorage, SessionStorage, TokenStore};
use crate::token::{Clock, SystemClock, TokenInspector};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const HEALTH_ENDPOINT: &str = "/health";

/// Longest excerpt of a non-JSON error body kept in an error message
const ERROR_SNIPPET_CHARS: usize = 200;

/// A fully prepared outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Status, headers and text body of a response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// `application/json` or any `+json` media type
    pub fn is_json(&self) -> bool {
        self.content_type()
            .and_then(|value| value.split(';').next())
            .map(|media| {
                let media = media.trim().to_ascii_lowercase();
                media == JSON_CONTENT_TYPE || media.ends_with("+json")
            })
            .unwrap_or(false)
    }

    /// The server's explanation from a JSON body: `message`, then `error`
    pub fn server_message(&self) -> Option<String> {
        let value: Value = serde_json::from_str(&self.body).ok()?;
        ["message", "error"].iter().find_map(|key| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    fn failure_message(&self) -> String {
        if let Some(message) = self.server_message() {
            return message;
        }
        if serde_json::from_str::<Value>(&self.body).is_err() {
            let snippet: String = self.body.trim().chars().take(ERROR_SNIPPET_CHARS).collect();
            if !snippet.is_empty() {
                return snippet;
            }
        }
        format!("Request failed with status {}", self.status)
    }
}

/// Sends one request and returns whatever the server answered.
///
/// Only a missing response is an error here; status handling belongs to the
/// caller.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut client_builder = Client::builder().timeout(config.request_timeout());

        if !config.use_proxy {
            client_builder = client_builder.no_proxy();
        }

        let client = client_builder.build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut request_builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            request_builder = request_builder.body(body);
        }

        let response = request_builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

pub(crate) fn bearer_header(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
    value.set_sensitive(true);
    Ok(value)
}

#[derive(Debug, Clone)]
enum HeaderOverride {
    Set(String, String),
    Remove(String),
}

/// Method, body and header overrides for one call
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    headers: Vec<HeaderOverride>,
    body: Option<Vec<u8>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Serialize `payload` as the JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(payload)?);
        Ok(self)
    }

    /// Raw body, e.g. a pre-encoded multipart form
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a header, replacing the pipeline's value for the same name
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .push(HeaderOverride::Set(name.into(), value.into()));
        self
    }

    /// Make sure a header is not sent at all
    pub fn without_header(mut self, name: impl Into<String>) -> Self {
        self.headers.push(HeaderOverride::Remove(name.into()));
        self
    }

    fn apply_headers(&self, headers: &mut HeaderMap) -> Result<()> {
        for header in &self.headers {
            match header {
                HeaderOverride::Set(name, value) => {
                    let name = HeaderName::from_bytes(name.as_bytes())?;
                    headers.insert(name, HeaderValue::from_str(value)?);
                }
                HeaderOverride::Remove(name) => {
                    let name = HeaderName::from_bytes(name.as_bytes())?;
                    headers.remove(name);
                }
            }
        }
        Ok(())
    }
}

/// Decoded success body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }

    /// Deserialize into `R`; text bodies are parsed as JSON
    pub fn into_json<R: DeserializeOwned>(self) -> Result<R> {
        match self {
            ResponseBody::Json(value) => serde_json::from_value(value).map_err(|e| {
                TurnierError::invalid_response(format!("Unexpected response shape: {}", e))
            }),
            ResponseBody::Text(text) => serde_json::from_str(&text).map_err(|e| {
                TurnierError::invalid_response(format!("Response is not JSON: {}", e))
            }),
        }
    }
}

/// Authenticated API client.
///
/// Owns the session state for one application: storage, the refresh flag and
/// the event channel. Clone-free by design; share it behind an `Arc`.
#[derive(Debug)]
pub struct ApiClient<T: Transport = ReqwestTransport> {
    config: ClientConfig,
    transport: Arc<T>,
    store: TokenStore,
    inspector: TokenInspector,
    refresher: RefreshCoordinator<T>,
    events: SessionEvents,
}

impl ApiClient<ReqwestTransport> {
    /// Production client: reqwest transport, wall clock, and file storage at
    /// `config.storage_path` (memory when unset).
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        let storage: Arc<dyn SessionStorage> = match &config.storage_path {
            Some(path) => Arc::new(FileStorage::open(path)),
            None => Arc::new(MemoryStorage::new()),
        };
        Self::with_parts(config, transport, storage, Arc::new(SystemClock))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<T>,
        storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let store = TokenStore::new(storage);
        let inspector = TokenInspector::new(clock);
        let events = SessionEvents::new();
        let refresher = RefreshCoordinator::new(
            transport.clone(),
            store.clone(),
            inspector.clone(),
            events.clone(),
            config.endpoint_url(crate::auth::REFRESH_ENDPOINT),
            config.refresh_threshold_ms,
        );

        Ok(Self {
            config,
            transport,
            store,
            inspector,
            refresher,
            events,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn inspector(&self) -> &TokenInspector {
        &self.inspector
    }

    pub fn refresher(&self) -> &RefreshCoordinator<T> {
        &self.refresher
    }

    /// Logout and refresh notifications
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// A stored token that has not expired
    pub fn is_authenticated(&self) -> bool {
        self.store
            .get_token()
            .map(|token| self.inspector.is_valid(&token))
            .unwrap_or(false)
    }

    pub async fn refresh_if_needed(&self) -> RefreshOutcome {
        self.refresher.refresh_if_needed().await
    }

    /// Send an authenticated request through the pipeline.
    ///
    /// # Errors
    ///
    /// - `SessionExpired` on 401, after the session was cleared and a logout
    ///   event was broadcast
    /// - `Forbidden` on 403, session untouched
    /// - `RequestFailed` on any other non-2xx status
    /// - `Network` when no response was received
    pub async fn call(&self, endpoint: &str, options: RequestOptions) -> Result<ResponseBody> {
        self.refresher.refresh_if_needed().await;

        let headers = self.build_headers(&options)?;
        let request = HttpRequest {
            method: options.method,
            url: self.config.endpoint_url(endpoint),
            headers,
            body: options.body,
        };

        debug!("{} {}", request.method, request.url);
        let response = self.transport.send(request).await?;
        self.interpret(response)
    }

    /// [`call`](Self::call) and deserialize the body into `R`
    pub async fn call_json<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<R> {
        self.call(endpoint, options).await?.into_json()
    }

    pub async fn get(&self, endpoint: &str) -> Result<ResponseBody> {
        self.call(endpoint, RequestOptions::get()).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &B,
    ) -> Result<ResponseBody> {
        self.call(endpoint, RequestOptions::post().json(payload)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &B,
    ) -> Result<ResponseBody> {
        self.call(endpoint, RequestOptions::put().json(payload)?).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &B,
    ) -> Result<ResponseBody> {
        self.call(endpoint, RequestOptions::patch().json(payload)?).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<ResponseBody> {
        self.call(endpoint, RequestOptions::delete()).await
    }

    /// Send without refresh, without a bearer token and without status
    /// handling. For endpoints that sit outside the session, like login.
    pub async fn send_raw(&self, endpoint: &str, options: RequestOptions) -> Result<HttpResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        options.apply_headers(&mut headers)?;

        let request = HttpRequest {
            method: options.method,
            url: self.config.endpoint_url(endpoint),
            headers,
            body: options.body,
        };

        debug!("{} {} (unauthenticated)", request.method, request.url);
        self.transport.send(request).await
    }

    /// `Ok(true)` if the server answers 2xx on the health endpoint,
    /// `Ok(false)` on any other status, `Err` if it cannot be reached.
    pub async fn check_health(&self) -> Result<bool> {
        let response = self
            .send_raw(HEALTH_ENDPOINT, RequestOptions::get())
            .await?;
        Ok(response.is_success())
    }

    /// End the session locally and tell subscribers.
    pub fn logout(&self) -> Result<()> {
        self.store.clear_session()?;
        self.events
            .emit(SessionEvent::LoggedOut(LogoutReason::UserRequested));
        info!("Logged out");
        Ok(())
    }

    fn build_headers(&self, options: &RequestOptions) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        if let Some(token) = self.store.get_token() {
            headers.insert(AUTHORIZATION, bearer_header(&token)?);
        }

        options.apply_headers(&mut headers)?;
        Ok(headers)
    }

    fn interpret(&self, response: HttpResponse) -> Result<ResponseBody> {
        match response.status {
            401 => {
                if let Err(e) = self.store.clear_session() {
                    warn!("Failed to clear session after 401: {}", e);
                }
                self.events
                    .emit(SessionEvent::LoggedOut(LogoutReason::SessionExpired));
                info!("Session rejected by server, logged out");

                let message = response
                    .server_message()
                    .unwrap_or_else(|| "Session expired, please log in again".to_string());
                Err(TurnierError::session_expired(message))
            }
            403 => {
                let message = response
                    .server_message()
                    .unwrap_or_else(|| "Insufficient permissions".to_string());
                Err(TurnierError::forbidden(message))
            }
            status if !response.is_success() => Err(TurnierError::request_failed(
                status,
                response.failure_message(),
            )),
            _ if response.is_json() => {
                if response.body.trim().is_empty() {
                    return Ok(ResponseBody::Json(Value::Null));
                }
                serde_json::from_str(&response.body)
                    .map(ResponseBody::Json)
                    .map_err(|e| {
                        TurnierError::invalid_response(format!("Invalid JSON response: {}", e))
                    })
            }
            _ => Ok(ResponseBody::Text(response.body)),
        }
    }
}
