//! # Event Bus System
//!
//! Provides an event-driven notification channel for the drive manager core
//! using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Core modules publish typed events after a state change has taken effect
//! (a session signed in, a token refreshed, a file uploaded). Subscribers such
//! as audit logging or a UI push channel listen independently. Publishing
//! never fails the operation that triggered it: emitters ignore the
//! "no subscribers" error.
//!
//! ```text
//! ┌──────────────┐    emit     ┌───────────┐   subscribe   ┌────────────┐
//! │ core-auth    ├────────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘             │ EventBus  │               └────────────┘
//! ┌──────────────┐    emit     │           │   subscribe   ┌────────────┐
//! │ core-service ├────────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘             └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::SignedOut {
//!         session_id: "session-123".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session and credential lifecycle events
    Auth(AuthEvent),
    /// Remote file operations
    Drive(DriveEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Drive(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { recoverable: true, .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Auth(AuthEvent::SignedOut { .. }) => EventSeverity::Info,
            CoreEvent::Drive(DriveEvent::Deleted { .. }) => EventSeverity::Info,
            CoreEvent::Drive(DriveEvent::Uploaded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events related to the credential lifecycle of a browser session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// An authorization URL was issued and the session awaits the callback.
    SigningIn { session_id: String },
    /// The authorization code was exchanged and tokens were stored.
    SignedIn { session_id: String },
    /// The session's tokens were removed.
    SignedOut { session_id: String },
    /// The access token was refreshed and written back.
    TokenRefreshed {
        session_id: String,
        /// Expiry of the new token (Unix epoch seconds), when known.
        expires_at: Option<i64>,
    },
    /// Authentication failed and the session was invalidated.
    AuthError {
        session_id: Option<String>,
        message: String,
        /// Whether the user can recover by signing in again.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn { .. } => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "Session signed in",
            AuthEvent::SignedOut { .. } => "Session signed out",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Drive Events
// ============================================================================

/// Events emitted after a remote file operation completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DriveEvent {
    Uploaded {
        file_id: String,
        folder_id: String,
        name: String,
        bytes: u64,
    },
    Downloaded { file_id: String, bytes: u64 },
    Deleted { file_id: String, parent_id: String },
}

impl DriveEvent {
    fn description(&self) -> &str {
        match self {
            DriveEvent::Uploaded { .. } => "File uploaded",
            DriveEvent::Downloaded { .. } => "File downloaded",
            DriveEvent::Deleted { .. } => "Entity deleted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        let event = CoreEvent::Auth(AuthEvent::SignedOut {
            session_id: "test".to_string(),
        });

        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_event_emission_with_subscribers() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        let event = CoreEvent::Drive(DriveEvent::Uploaded {
            file_id: "file-1".to_string(),
            folder_id: "root".to_string(),
            name: "test.txt".to_string(),
            bytes: 5,
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 1);
        assert_eq!(sub.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_cloned_bus_shares_channel() {
        let bus = EventBus::default();
        let clone = bus.clone();
        let mut sub = bus.subscribe();

        clone
            .emit(CoreEvent::Auth(AuthEvent::SigningIn {
                session_id: "s".to_string(),
            }))
            .unwrap();

        assert!(matches!(
            sub.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SigningIn { .. })
        ));
    }

    #[test]
    fn test_event_severity() {
        let rejected = CoreEvent::Auth(AuthEvent::AuthError {
            session_id: None,
            message: "refresh rejected".to_string(),
            recoverable: true,
        });
        let stuck = CoreEvent::Auth(AuthEvent::AuthError {
            session_id: None,
            message: "session store unavailable".to_string(),
            recoverable: false,
        });
        let refreshed = CoreEvent::Auth(AuthEvent::TokenRefreshed {
            session_id: "s".to_string(),
            expires_at: Some(1_700_000_000),
        });

        assert_eq!(rejected.severity(), EventSeverity::Warning);
        assert_eq!(stuck.severity(), EventSeverity::Error);
        assert_eq!(refreshed.severity(), EventSeverity::Debug);
        assert_eq!(rejected.description(), "Authentication error");
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Drive(DriveEvent::Deleted {
            file_id: "abc".to_string(),
            parent_id: "root".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Drive");
        assert_eq!(json["payload"]["event"], "Deleted");
        assert_eq!(json["payload"]["parent_id"], "root");
    }
}
