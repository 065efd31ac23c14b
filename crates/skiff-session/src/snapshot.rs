//! Per-session navigation state for the shared directory browser.
//!
//! There is exactly one [`DirectoryBrowser`]. It is lent to whichever session
//! is active; every other session keeps only a [`BrowserSnapshot`]. A snapshot
//! records *where* the user was, never *what* the listing contained, so a
//! restore always triggers a fresh fetch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bridge::BridgeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSnapshot {
    /// Directory currently shown.
    pub path: String,
    /// Visited directories, oldest first.
    pub history: Vec<String>,
    /// Index into `history` of the entry matching `path`. Owned by the
    /// browser and carried here verbatim.
    pub history_cursor: usize,
}

impl BrowserSnapshot {
    /// A fresh snapshot positioned at `path` with no navigation behind it.
    pub fn at(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            history: vec![path.clone()],
            path,
            history_cursor: 0,
        }
    }
}

/// The single shared file browser.
#[async_trait(?Send)]
pub trait DirectoryBrowser {
    /// Capture the live navigation state.
    fn snapshot(&self) -> BrowserSnapshot;

    /// Rebind to `session_id` at `snapshot` and fetch the listing for
    /// `snapshot.path`. Resolves once the listing has loaded.
    async fn restore(&self, snapshot: BrowserSnapshot, session_id: &str)
        -> Result<(), BridgeError>;
}
