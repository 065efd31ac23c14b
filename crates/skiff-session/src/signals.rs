//! UI signals emitted by the orchestrator for the presentation layer.
//!
//! Signals are serialized as tagged JSON so a host can forward them to a
//! webview unchanged.

use serde::Serialize;

use crate::bridge::SessionId;

/// Connection status shown in the status indicator.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Status {
    /// No session is active (empty state).
    Disconnected,
    Connecting { label: String },
    Connected { label: String },
    Error { message: String },
}

/// One entry of the tab strip.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: SessionId,
    pub label: String,
    pub active: bool,
    /// A background error arrived since the tab was last active.
    pub faulted: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum UiSignal {
    /// The set, order, active tab, or fault flags changed. `active` is `None`
    /// in the empty state, where session-scoped controls are disabled.
    TabsChanged {
        tabs: Vec<TabInfo>,
        active: Option<SessionId>,
    },
    StatusChanged { status: Status },
}
