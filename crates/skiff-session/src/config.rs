//! Orchestrator tunables, persisted in the settings table.

use rusqlite::Connection;
use skiff_db::settings;
use tokio::sync::mpsc;

use crate::bridge::PushEvent;

/// Settings key for the directory a session's browser starts in when the
/// remote home directory cannot be resolved.
pub const SETTING_FALLBACK_PATH: &str = "session_fallback_path";

/// Settings key for the push-event channel capacity.
pub const SETTING_EVENT_BUFFER: &str = "session_event_buffer";

pub const DEFAULT_FALLBACK_PATH: &str = "/";

pub const DEFAULT_EVENT_BUFFER: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub fallback_path: String,
    pub event_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fallback_path: DEFAULT_FALLBACK_PATH.to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl OrchestratorConfig {
    /// Read the config from the settings table.
    ///
    /// Missing or malformed values fall back to their defaults; only storage
    /// failures are errors.
    pub fn load(conn: &Connection) -> Result<Self, ConfigError> {
        let fallback_path = match settings::get(conn, SETTING_FALLBACK_PATH)? {
            Some(path) if path.starts_with('/') => path,
            Some(path) => {
                log::warn!("ignoring non-absolute {SETTING_FALLBACK_PATH} {path:?}");
                DEFAULT_FALLBACK_PATH.to_string()
            }
            None => DEFAULT_FALLBACK_PATH.to_string(),
        };

        let event_buffer = match settings::get(conn, SETTING_EVENT_BUFFER)? {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    log::warn!("ignoring invalid {SETTING_EVENT_BUFFER} {raw:?}");
                    DEFAULT_EVENT_BUFFER
                }
            },
            None => DEFAULT_EVENT_BUFFER,
        };

        Ok(Self {
            fallback_path,
            event_buffer,
        })
    }

    /// Write this config to the settings table.
    pub fn save(&self, conn: &Connection) -> Result<(), ConfigError> {
        settings::set(conn, SETTING_FALLBACK_PATH, &self.fallback_path)?;
        settings::set(conn, SETTING_EVENT_BUFFER, &self.event_buffer.to_string())?;
        Ok(())
    }

    /// Write the defaults for any key that has no value yet.
    pub fn seed_defaults(conn: &Connection) -> Result<(), ConfigError> {
        settings::set_if_absent(conn, SETTING_FALLBACK_PATH, DEFAULT_FALLBACK_PATH)?;
        settings::set_if_absent(
            conn,
            SETTING_EVENT_BUFFER,
            &DEFAULT_EVENT_BUFFER.to_string(),
        )?;
        Ok(())
    }

    /// Channel the backend bridge pushes events into. The receiver goes to
    /// [`EventRouter::spawn`](crate::EventRouter::spawn).
    pub fn push_channel(&self) -> (mpsc::Sender<PushEvent>, mpsc::Receiver<PushEvent>) {
        mpsc::channel(self.event_buffer.max(1))
    }
}
