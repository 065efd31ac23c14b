//! Types crossing the backend bridge: requests, errors and push-events.
//!
//! The backend owns the actual SSH connection. The orchestrator only sees the
//! request/response calls of [`Backend`] and the [`PushEvent`] stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Backend-assigned identifier of a live session.
pub type SessionId = String;

/// Failure reported by a backend call. Carries the backend's own message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BridgeError(pub String);

impl From<String> for BridgeError {
    fn from(message: String) -> Self {
        BridgeError(message)
    }
}

impl From<&str> for BridgeError {
    fn from(message: &str) -> Self {
        BridgeError(message.to_string())
    }
}

/// How a profile authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "authType", rename_all = "camelCase")]
pub enum AuthMethod {
    #[serde(rename_all = "camelCase")]
    Password {
        #[serde(default)]
        password: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    KeyFile {
        private_key_path: String,
        #[serde(default)]
        passphrase: Option<String>,
    },
}

/// A saved connection, as handed over by the profile store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(flatten)]
    pub auth: AuthMethod,
}

impl ConnectionProfile {
    /// Label shown on the session's tab: the profile name, or the host when
    /// the profile is unnamed.
    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() {
            &self.host
        } else {
            name
        }
    }

    /// `host:port` as passed to the socket layer.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Request/response side of the backend bridge.
///
/// Every call is a suspension point. Implementations own their timeouts.
#[async_trait(?Send)]
pub trait Backend {
    /// Open a session for `profile` and return its id.
    async fn connect(&self, profile: &ConnectionProfile) -> Result<SessionId, BridgeError>;

    /// Ask the backend to terminate `session_id`.
    async fn disconnect(&self, session_id: &str) -> Result<(), BridgeError>;

    /// Resolve the remote working directory a new session starts in.
    async fn resolve_home(&self, session_id: &str) -> Result<String, BridgeError>;

    /// Send user input to the remote shell.
    async fn write(&self, session_id: &str, data: &[u8]) -> Result<(), BridgeError>;

    /// Tell the remote PTY about a new grid size.
    async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<(), BridgeError>;
}

/// Backend-initiated notification, tagged with the session it belongs to.
///
/// The bridge emits these as separate `ssh-data`, `ssh-error` and `ssh-close`
/// events whose payload carries no tag. The host folds the event name into the
/// payload as `kind`; both those names and the canonical ones below parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PushEvent {
    /// Raw output for the session's terminal.
    #[serde(rename_all = "camelCase", alias = "ssh-data")]
    Data { session_id: SessionId, data: Vec<u8> },
    /// A fault notice from the session.
    #[serde(rename_all = "camelCase", alias = "ssh-error")]
    Error {
        session_id: SessionId,
        #[serde(alias = "error")]
        message: String,
    },
    /// The backend terminated the session.
    #[serde(rename_all = "camelCase", alias = "ssh-close")]
    Closed { session_id: SessionId },
}

impl PushEvent {
    pub fn session_id(&self) -> &str {
        match self {
            PushEvent::Data { session_id, .. }
            | PushEvent::Error { session_id, .. }
            | PushEvent::Closed { session_id } => session_id,
        }
    }
}
