//! Session lifecycle events
//!
//! The pipeline never navigates or prompts on its own. It announces what
//! happened to the session and whoever renders the UI decides what to do:
//!
//! ```rust,no_run
//! # async fn example(client: turnier_client::ApiClient) {
//! let mut events = client.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if event.is_logout() {
//!             println!("Session ended, back to the login screen");
//!         }
//!     }
//! });
//! # }
//! ```

use std::fmt;

use tokio::sync::broadcast;

/// Lagging subscribers lose the oldest events beyond this
const EVENT_CAPACITY: usize = 16;

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The server answered 401
    SessionExpired,
    /// Explicit logout
    UserRequested,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogoutReason::SessionExpired => write!(f, "session expired"),
            LogoutReason::UserRequested => write!(f, "logged out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Storage has been cleared
    LoggedOut(LogoutReason),
    /// A proactive refresh stored a new token
    TokenRefreshed,
}

impl SessionEvent {
    pub fn is_logout(&self) -> bool {
        matches!(self, SessionEvent::LoggedOut(_))
    }
}

/// Broadcast sender shared by every component of one client
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Deliver to current subscribers. Having none is fine.
    pub fn emit(&self, event: SessionEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!("Session event delivered to {} subscriber(s)", delivered);
    }
}
