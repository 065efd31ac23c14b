//! skiff-session: multi-session orchestration for the Skiff remote client.
//!
//! This crate sits between the backend bridge (which owns the SSH/SFTP
//! connections) and the presentation layer (terminal surfaces, the shared
//! directory browser, the tab strip). It decides which session exists, which
//! one is visible, and where backend push-events go.
//!
//! # Architecture
//!
//! - [`SessionRegistry`]: Ordered set of live [`SessionRecord`]s; tab order.
//! - [`Orchestrator`]: Connect, switch, close and resize operations, plus the
//!   active-session pointer and UI signals.
//! - [`EventRouter`]: Single subscription to backend push-events, dispatched
//!   by session id.
//! - [`BrowserSnapshot`]: Per-session navigation state for the one shared
//!   [`DirectoryBrowser`].
//!
//! Everything runs on one cooperative task set (a tokio `LocalSet`). State is
//! kept behind `Rc<RefCell<_>>` and is never borrowed across an `.await`.

pub mod bridge;
pub mod config;
pub mod orchestrator;
pub mod record;
pub mod registry;
pub mod router;
pub mod signals;
pub mod snapshot;
pub mod surface;

#[cfg(test)]
mod testing;

pub use bridge::{AuthMethod, Backend, BridgeError, ConnectionProfile, PushEvent, SessionId};
pub use config::{ConfigError, OrchestratorConfig};
pub use orchestrator::{ConnectError, Orchestrator};
pub use record::SessionRecord;
pub use registry::{DuplicateSession, SessionRegistry};
pub use router::{EventRouter, RouterHandle};
pub use signals::{Status, TabInfo, UiSignal};
pub use snapshot::{BrowserSnapshot, DirectoryBrowser};
pub use surface::{SurfaceError, SurfaceHandle, SurfaceHost, TerminalSurface};
