//! The session controller: connect, switch, close and resize.
//!
//! All operations run on one cooperative task set. Each operation does its
//! state mutation synchronously, releases the state borrow, and only then
//! awaits the backend or the directory browser. Anything that resumes after an
//! `.await` looks the session up again, because the user or a backend `closed`
//! event may have removed it in the meantime.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::bridge::{Backend, BridgeError, ConnectionProfile, SessionId};
use crate::config::OrchestratorConfig;
use crate::record::SessionRecord;
use crate::registry::{DuplicateSession, SessionRegistry};
use crate::signals::{Status, TabInfo, UiSignal};
use crate::snapshot::{BrowserSnapshot, DirectoryBrowser};
use crate::surface::SurfaceHost;

/// Why `connect` produced no session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// The backend rejected the request or could not reach the host.
    #[error("connection failed: {0}")]
    Backend(#[from] BridgeError),
    /// The backend handed out an id that is still live.
    #[error("backend returned id {0} which is already in use")]
    DuplicateSession(SessionId),
}

struct State {
    registry: SessionRegistry,
    /// Weak pointer to the visible session. Always re-validated.
    active: Option<SessionId>,
    host: Box<dyn SurfaceHost>,
    /// Background sessions that reported an error since they were last active.
    faulted: HashSet<SessionId>,
    status: Status,
    /// Session whose listing the browser is showing. Unset between an
    /// activation and the end of its restore.
    browser_bound: Option<SessionId>,
    /// Bumped whenever the browser is lent to another session; restores
    /// issued under an older value are stale.
    browser_epoch: u64,
}

struct Inner {
    config: OrchestratorConfig,
    backend: Rc<dyn Backend>,
    browser: Rc<dyn DirectoryBrowser>,
    signals: mpsc::UnboundedSender<UiSignal>,
    state: RefCell<State>,
}

/// What local teardown decided about the active pointer.
struct Teardown {
    was_active: bool,
    replacement: Option<SessionId>,
}

/// A directory restore owed to a freshly activated session.
struct Restore {
    session_id: SessionId,
    snapshot: BrowserSnapshot,
    epoch: u64,
}

/// The part of a close that has to wait on collaborators: loading the
/// replacement's listing and telling the backend.
pub(crate) struct PendingClose {
    session_id: SessionId,
    restore: Option<Restore>,
}

/// Owns the session registry and the active-session pointer.
///
/// Cheap to clone; clones share state. Not `Send`: keep it on the task set
/// that drives the UI.
///
/// Collaborator calls made while the orchestrator updates its state
/// (`TerminalSurface` and `SurfaceHost` methods) must not call back into the
/// orchestrator. Read accessors are safe from `DirectoryBrowser::snapshot`.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Rc<Inner>,
}

impl Orchestrator {
    /// Create an orchestrator in the empty state.
    ///
    /// Returns the receiving end of the UI signal stream alongside it.
    pub fn new(
        config: OrchestratorConfig,
        backend: Rc<dyn Backend>,
        browser: Rc<dyn DirectoryBrowser>,
        mut host: Box<dyn SurfaceHost>,
    ) -> (Self, mpsc::UnboundedReceiver<UiSignal>) {
        let (signals, signal_rx) = mpsc::unbounded_channel();
        host.show_placeholder(true);

        let orchestrator = Self {
            inner: Rc::new(Inner {
                config,
                backend,
                browser,
                signals,
                state: RefCell::new(State {
                    registry: SessionRegistry::new(),
                    active: None,
                    host,
                    faulted: HashSet::new(),
                    status: Status::Disconnected,
                    browser_bound: None,
                    browser_epoch: 0,
                }),
            }),
        };
        (orchestrator, signal_rx)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Open a new session for `profile` and make it the active tab.
    ///
    /// The new tab's listing is first loaded at the fallback path while the
    /// home directory is looked up, then reloaded at home once it is known.
    /// That is two fetches when home differs from the fallback.
    pub async fn connect(&self, profile: &ConnectionProfile) -> Result<SessionId, ConnectError> {
        let label = profile.display_name().to_string();
        self.set_status(Status::Connecting {
            label: label.clone(),
        });

        let session_id = match self.inner.backend.connect(profile).await {
            Ok(id) => id,
            Err(err) => {
                warn!("connect to {} failed: {err}", profile.address());
                self.set_status(Status::Error {
                    message: format!("Connection failed: {err}"),
                });
                return Err(ConnectError::Backend(err));
            }
        };

        if let Err(err) = self.open_record(&session_id, label) {
            self.set_status(Status::Error {
                message: err.to_string(),
            });
            return Err(err);
        }
        info!("session {session_id} connected to {}", profile.address());
        self.emit_tabs();

        self.switch_to(&session_id).await;
        self.resolve_initial_path(&session_id).await;

        Ok(session_id)
    }

    fn open_record(&self, session_id: &str, label: String) -> Result<(), ConnectError> {
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;

        if state.registry.contains(session_id) {
            error!("backend reused live session id {session_id}");
            return Err(ConnectError::DuplicateSession(session_id.to_string()));
        }

        let record = SessionRecord::open(
            session_id.to_string(),
            label,
            state.host.as_mut(),
            BrowserSnapshot::at(&self.inner.config.fallback_path),
        );
        if let Err(DuplicateSession(record)) = state.registry.add(record) {
            record.close(state.host.as_mut());
            return Err(ConnectError::DuplicateSession(session_id.to_string()));
        }
        Ok(())
    }

    /// Ask the backend for the session's home directory and park the browser
    /// there, unless the user has already navigated elsewhere.
    async fn resolve_initial_path(&self, session_id: &str) {
        let initial = BrowserSnapshot::at(&self.inner.config.fallback_path);

        let home = match self.inner.backend.resolve_home(session_id).await {
            Ok(home) => home,
            Err(err) => {
                warn!(
                    "home directory for {session_id} unavailable, staying at {}: {err}",
                    initial.path
                );
                return;
            }
        };
        if home == initial.path {
            return;
        }
        let resolved = BrowserSnapshot::at(home);
        let live = self.inner.browser.snapshot();

        let rebind = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let is_active = state.active.as_deref() == Some(session_id);
            let is_bound = state.browser_bound.as_deref() == Some(session_id);
            let epoch = state.browser_epoch;
            let Some(record) = state.registry.find_mut(session_id) else {
                debug!("session {session_id} closed before its home directory resolved");
                return;
            };

            let current = if is_bound {
                live
            } else {
                record.browser_snapshot().clone()
            };
            if current != initial {
                debug!("session {session_id} navigated away before home resolved");
                return;
            }
            record.set_browser_snapshot(resolved.clone());
            is_active.then(|| Restore {
                session_id: session_id.to_string(),
                snapshot: resolved,
                epoch,
            })
        };

        if let Some(restore) = rebind {
            self.restore_browser(restore).await;
        }
    }

    /// Make `session_id` the visible session. Unknown ids are ignored.
    pub async fn switch_to(&self, session_id: &str) {
        if let Some(restore) = self.activate(session_id) {
            self.restore_browser(restore).await;
        }
    }

    /// Synchronous part of a switch: swap surfaces, park the outgoing
    /// browser state and emit signals. Returns the restore still owed.
    fn activate(&self, session_id: &str) -> Option<Restore> {
        let live = self.inner.browser.snapshot();

        let restore = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;

            if !state.registry.contains(session_id) {
                debug!("ignoring switch to unknown session {session_id}");
                return None;
            }

            let reactivating = state.active.as_deref() == Some(session_id);
            if !reactivating {
                if let Some(previous_id) = state.active.take() {
                    if let Some(previous) = state.registry.find_mut(&previous_id) {
                        state.host.set_visible(previous.surface(), false);
                        // A browser still loading for `previous` holds nothing of its own.
                        if state.browser_bound.as_deref() == Some(previous_id.as_str()) {
                            previous.set_browser_snapshot(live);
                        }
                    }
                }
                state.browser_bound = None;
                state.browser_epoch += 1;
            }
            let epoch = state.browser_epoch;

            state.active = Some(session_id.to_string());
            state.faulted.remove(session_id);
            state.host.show_placeholder(false);

            let record = state.registry.find_mut(session_id)?;
            state.host.set_visible(record.surface(), true);
            // The surface may have been resized while hidden.
            if let Err(err) = record.terminal_mut().refit() {
                debug!("refit of {session_id} skipped: {err}");
            }
            record.terminal_mut().focus();
            state.status = Status::Connected {
                label: record.display_name().to_string(),
            };

            (!reactivating).then(|| Restore {
                session_id: session_id.to_string(),
                snapshot: record.browser_snapshot().clone(),
                epoch,
            })
        };

        self.emit_tabs();
        self.emit_status();
        restore
    }

    /// Load the listing for a session activated under `restore.epoch`. A
    /// restore overtaken by a later switch or close is dropped.
    async fn restore_browser(&self, restore: Restore) {
        let Restore {
            session_id,
            snapshot,
            epoch,
        } = restore;
        if self.inner.state.borrow().browser_epoch != epoch {
            debug!("skipping stale directory restore for {session_id}");
            return;
        }

        match self.inner.browser.restore(snapshot, &session_id).await {
            Ok(()) => {
                let mut state = self.inner.state.borrow_mut();
                if state.browser_epoch == epoch {
                    state.browser_bound = Some(session_id);
                }
            }
            Err(err) => warn!("directory listing for {session_id} failed to load: {err}"),
        }
    }

    /// Tear down `session_id` locally, activate a neighbour if it was the
    /// active tab, then tell the backend. Idempotent.
    pub async fn close_session(&self, session_id: &str) {
        if let Some(pending) = self.begin_close(session_id) {
            self.finish_close(pending).await;
        }
    }

    /// Release the session's surfaces, drop it from the registry and
    /// activate its replacement, all without suspending. `None` when the
    /// session is already gone.
    pub(crate) fn begin_close(&self, session_id: &str) -> Option<PendingClose> {
        let Some(teardown) = self.teardown(session_id) else {
            debug!("ignoring close of unknown session {session_id}");
            return None;
        };

        let restore = match teardown.replacement {
            Some(next) => self.activate(&next),
            None => {
                self.emit_tabs();
                if teardown.was_active {
                    self.emit_status();
                }
                None
            }
        };
        Some(PendingClose {
            session_id: session_id.to_string(),
            restore,
        })
    }

    pub(crate) async fn finish_close(&self, pending: PendingClose) {
        let PendingClose {
            session_id,
            restore,
        } = pending;
        if let Some(restore) = restore {
            self.restore_browser(restore).await;
        }
        if let Err(err) = self.inner.backend.disconnect(&session_id).await {
            warn!("disconnect notice for {session_id} failed after local teardown: {err}");
        }
    }

    fn teardown(&self, session_id: &str) -> Option<Teardown> {
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;

        let position = state.registry.position(session_id)?;
        let record = state.registry.remove(session_id)?;
        record.close(state.host.as_mut());
        state.faulted.remove(session_id);
        info!("session {session_id} closed");

        let was_active = state.active.as_deref() == Some(session_id);
        let mut replacement = None;
        if was_active {
            state.active = None;
            state.browser_bound = None;
            state.browser_epoch += 1;
            // Prefer the tab to the left; the first tab falls back to the new first.
            replacement = state
                .registry
                .id_at(position.saturating_sub(1))
                .map(str::to_owned);
            if replacement.is_none() {
                state.host.show_placeholder(true);
                state.status = Status::Disconnected;
            }
        }

        Some(Teardown {
            was_active,
            replacement,
        })
    }

    /// Refit the active terminal after a window or split resize. Background
    /// terminals are refit when they are next activated.
    pub fn propagate_resize(&self) {
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;
        let Some(active) = state.active.as_deref() else {
            return;
        };
        if let Some(record) = state.registry.find_mut(active) {
            if let Err(err) = record.terminal_mut().refit() {
                debug!("refit of {active} skipped: {err}");
            }
        }
    }

    /// Forward keystrokes from a terminal to its remote shell.
    pub async fn send_input(&self, session_id: &str, data: &[u8]) {
        if !self.contains(session_id) {
            debug!("dropping input for unknown session {session_id}");
            return;
        }
        if let Err(err) = self.inner.backend.write(session_id, data).await {
            warn!("write to {session_id} failed: {err}");
        }
    }

    /// Forward a terminal's new grid size to the remote PTY.
    pub async fn resize_terminal(&self, session_id: &str, cols: u16, rows: u16) {
        if !self.contains(session_id) {
            return;
        }
        if let Err(err) = self.inner.backend.resize(session_id, cols, rows).await {
            debug!("resize of {session_id} to {cols}x{rows} failed: {err}");
        }
    }

    /// Render `data` in the session's terminal. Returns `false` when the
    /// session no longer exists.
    pub(crate) fn deliver_output(&self, session_id: &str, data: &[u8]) -> bool {
        let mut state = self.inner.state.borrow_mut();
        match state.registry.find_mut(session_id) {
            Some(record) => {
                record.terminal_mut().write(data);
                true
            }
            None => false,
        }
    }

    /// Route a backend error notice. The active session shows it in the
    /// status indicator; a background session only gets its tab flagged.
    pub(crate) fn report_fault(&self, session_id: &str, message: String) {
        let is_active = {
            let mut state = self.inner.state.borrow_mut();
            if !state.registry.contains(session_id) {
                debug!("dropping error for unknown session {session_id}: {message}");
                return;
            }
            let is_active = state.active.as_deref() == Some(session_id);
            if !is_active {
                state.faulted.insert(session_id.to_string());
            }
            is_active
        };

        if is_active {
            warn!("session {session_id}: {message}");
            self.set_status(Status::Error { message });
        } else {
            warn!("background session {session_id}: {message}");
            self.emit_tabs();
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.state.borrow().registry.contains(session_id)
    }

    /// The active session, if any.
    pub fn active_session(&self) -> Option<SessionId> {
        self.inner.state.borrow().active.clone()
    }

    /// Ids in tab order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.inner.state.borrow().registry.ordered_ids()
    }

    pub fn tabs(&self) -> Vec<TabInfo> {
        let state = self.inner.state.borrow();
        state
            .registry
            .iter()
            .map(|record| TabInfo {
                id: record.id().to_string(),
                label: record.display_name().to_string(),
                active: state.active.as_deref() == Some(record.id()),
                faulted: state.faulted.contains(record.id()),
            })
            .collect()
    }

    pub fn status(&self) -> Status {
        self.inner.state.borrow().status.clone()
    }

    /// The parked browser state of `session_id`. For the active session this
    /// is the state it was activated with, not the live browser state.
    pub fn browser_snapshot(&self, session_id: &str) -> Option<BrowserSnapshot> {
        let state = self.inner.state.borrow();
        state
            .registry
            .find(session_id)
            .map(|record| record.browser_snapshot().clone())
    }

    fn set_status(&self, status: Status) {
        self.inner.state.borrow_mut().status = status;
        self.emit_status();
    }

    fn emit_status(&self) {
        let status = self.status();
        let _ = self.inner.signals.send(UiSignal::StatusChanged { status });
    }

    fn emit_tabs(&self) {
        let tabs = self.tabs();
        let active = self.active_session();
        let _ = self.inner.signals.send(UiSignal::TabsChanged { tabs, active });
    }
}
