//! Recording fakes for the collaborator traits.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use crate::bridge::{AuthMethod, Backend, BridgeError, ConnectionProfile, SessionId};
use crate::config::OrchestratorConfig;
use crate::orchestrator::Orchestrator;
use crate::signals::UiSignal;
use crate::snapshot::{BrowserSnapshot, DirectoryBrowser};
use crate::surface::{SurfaceError, SurfaceHandle, SurfaceHost, TerminalSurface};

pub(crate) const DEFAULT_HOME: &str = "/home/tester";

pub(crate) fn profile(name: &str) -> ConnectionProfile {
    ConnectionProfile {
        id: format!("profile-{name}"),
        name: name.to_string(),
        host: format!("{name}.example.net"),
        port: 22,
        username: "tester".to_string(),
        auth: AuthMethod::Password {
            password: Some("secret".to_string()),
        },
    }
}

// ── Backend ─────────────────────────────────────────────────────────

pub(crate) struct FakeBackend {
    next_id: Cell<u32>,
    forced_id: RefCell<Option<String>>,
    connect_error: RefCell<Option<String>>,
    disconnect_error: RefCell<Option<String>>,
    home: RefCell<Result<String, String>>,
    home_gate: RefCell<Option<Rc<Notify>>>,
    disconnect_gate: RefCell<Option<Rc<Notify>>>,
    home_requests: Cell<usize>,
    disconnects: RefCell<Vec<SessionId>>,
    writes: RefCell<Vec<(SessionId, Vec<u8>)>>,
    resizes: RefCell<Vec<(SessionId, u16, u16)>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            forced_id: RefCell::new(None),
            connect_error: RefCell::new(None),
            disconnect_error: RefCell::new(None),
            home: RefCell::new(Ok(DEFAULT_HOME.to_string())),
            home_gate: RefCell::new(None),
            disconnect_gate: RefCell::new(None),
            home_requests: Cell::new(0),
            disconnects: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
            resizes: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn force_next_id(&self, id: &str) {
        *self.forced_id.borrow_mut() = Some(id.to_string());
    }

    pub(crate) fn fail_next_connect(&self, message: &str) {
        *self.connect_error.borrow_mut() = Some(message.to_string());
    }

    pub(crate) fn fail_disconnect(&self, message: &str) {
        *self.disconnect_error.borrow_mut() = Some(message.to_string());
    }

    pub(crate) fn set_home(&self, path: &str) {
        *self.home.borrow_mut() = Ok(path.to_string());
    }

    pub(crate) fn fail_home(&self, message: &str) {
        *self.home.borrow_mut() = Err(message.to_string());
    }

    /// Make `resolve_home` wait until the returned gate is notified.
    pub(crate) fn gate_home(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        *self.home_gate.borrow_mut() = Some(Rc::clone(&gate));
        gate
    }

    /// Make `disconnect` wait until the returned gate is notified. The call
    /// is recorded before it waits.
    pub(crate) fn gate_disconnect(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        *self.disconnect_gate.borrow_mut() = Some(Rc::clone(&gate));
        gate
    }

    /// Yield until some task has called `resolve_home`.
    pub(crate) async fn wait_for_home_request(&self) {
        for _ in 0..1000 {
            if self.home_requests.get() > 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("resolve_home was never called");
    }

    pub(crate) fn disconnects(&self) -> Vec<SessionId> {
        self.disconnects.borrow().clone()
    }

    pub(crate) fn writes(&self) -> Vec<(SessionId, Vec<u8>)> {
        self.writes.borrow().clone()
    }

    pub(crate) fn resizes(&self) -> Vec<(SessionId, u16, u16)> {
        self.resizes.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Backend for FakeBackend {
    async fn connect(&self, _profile: &ConnectionProfile) -> Result<SessionId, BridgeError> {
        tokio::task::yield_now().await;
        if let Some(message) = self.connect_error.borrow_mut().take() {
            return Err(BridgeError(message));
        }
        if let Some(id) = self.forced_id.borrow_mut().take() {
            return Ok(id);
        }
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        Ok(format!("session-{n}"))
    }

    async fn disconnect(&self, session_id: &str) -> Result<(), BridgeError> {
        self.disconnects.borrow_mut().push(session_id.to_string());
        let gate = self.disconnect_gate.borrow().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        tokio::task::yield_now().await;
        match self.disconnect_error.borrow().as_ref() {
            Some(message) => Err(BridgeError(message.clone())),
            None => Ok(()),
        }
    }

    async fn resolve_home(&self, _session_id: &str) -> Result<String, BridgeError> {
        self.home_requests.set(self.home_requests.get() + 1);
        let gate = self.home_gate.borrow().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.home.borrow().clone().map_err(BridgeError)
    }

    async fn write(&self, session_id: &str, data: &[u8]) -> Result<(), BridgeError> {
        self.writes
            .borrow_mut()
            .push((session_id.to_string(), data.to_vec()));
        Ok(())
    }

    async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<(), BridgeError> {
        self.resizes
            .borrow_mut()
            .push((session_id.to_string(), cols, rows));
        Ok(())
    }
}

// ── Surfaces ────────────────────────────────────────────────────────

#[derive(Default)]
struct TerminalLog {
    session_id: String,
    mounted_on: Option<u64>,
    written: Vec<u8>,
    refits: usize,
    focuses: usize,
    disposed: bool,
    fail_refit: bool,
}

struct SurfaceLog {
    session_id: String,
    visible: bool,
}

#[derive(Default)]
struct HostLog {
    next_handle: u64,
    surfaces: HashMap<u64, SurfaceLog>,
    terminals: Vec<TerminalLog>,
    placeholder: bool,
    fail_all_refits: bool,
}

impl HostLog {
    fn live_terminal(&mut self, session_id: &str) -> Option<&mut TerminalLog> {
        self.terminals
            .iter_mut()
            .find(|t| t.session_id == session_id && !t.disposed)
    }
}

struct FakeTerminal {
    log: Rc<RefCell<HostLog>>,
    index: usize,
}

impl TerminalSurface for FakeTerminal {
    fn mount(&mut self, surface: &SurfaceHandle) {
        self.log.borrow_mut().terminals[self.index].mounted_on = Some(surface.raw());
    }

    fn write(&mut self, data: &[u8]) {
        let mut log = self.log.borrow_mut();
        let terminal = &mut log.terminals[self.index];
        assert!(!terminal.disposed, "write to disposed terminal");
        terminal.written.extend_from_slice(data);
    }

    fn refit(&mut self) -> Result<(), SurfaceError> {
        let mut log = self.log.borrow_mut();
        let fail_all = log.fail_all_refits;
        let terminal = &mut log.terminals[self.index];
        terminal.refits += 1;
        if fail_all || terminal.fail_refit {
            Err(SurfaceError::NotLaidOut)
        } else {
            Ok(())
        }
    }

    fn focus(&mut self) {
        self.log.borrow_mut().terminals[self.index].focuses += 1;
    }

    fn dispose(&mut self) {
        let mut log = self.log.borrow_mut();
        let terminal = &mut log.terminals[self.index];
        assert!(!terminal.disposed, "terminal disposed twice");
        terminal.disposed = true;
    }
}

/// Records surface lifecycles. Clones share the same log, so a test keeps
/// one handle while the orchestrator owns a boxed clone.
#[derive(Clone)]
pub(crate) struct FakeHost {
    log: Rc<RefCell<HostLog>>,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(HostLog::default())),
        }
    }

    pub(crate) fn boxed(&self) -> Box<dyn SurfaceHost> {
        Box::new(self.clone())
    }

    pub(crate) fn live_terminals(&self, session_id: &str) -> usize {
        self.log
            .borrow()
            .terminals
            .iter()
            .filter(|t| t.session_id == session_id && !t.disposed)
            .count()
    }

    pub(crate) fn disposed_terminals(&self, session_id: &str) -> usize {
        self.log
            .borrow()
            .terminals
            .iter()
            .filter(|t| t.session_id == session_id && t.disposed)
            .count()
    }

    pub(crate) fn total_terminals(&self) -> usize {
        self.log.borrow().terminals.len()
    }

    pub(crate) fn total_live_terminals(&self) -> usize {
        self.log
            .borrow()
            .terminals
            .iter()
            .filter(|t| !t.disposed)
            .count()
    }

    pub(crate) fn mounted_surfaces(&self, session_id: &str) -> usize {
        self.log
            .borrow()
            .surfaces
            .values()
            .filter(|s| s.session_id == session_id)
            .count()
    }

    pub(crate) fn total_mounted_surfaces(&self) -> usize {
        self.log.borrow().surfaces.len()
    }

    pub(crate) fn is_visible(&self, surface: &SurfaceHandle) -> bool {
        self.log
            .borrow()
            .surfaces
            .get(&surface.raw())
            .map(|s| s.visible)
            .unwrap_or(false)
    }

    pub(crate) fn session_visible(&self, session_id: &str) -> bool {
        self.visible_sessions().iter().any(|id| id == session_id)
    }

    pub(crate) fn visible_sessions(&self) -> Vec<String> {
        self.log
            .borrow()
            .surfaces
            .values()
            .filter(|s| s.visible)
            .map(|s| s.session_id.clone())
            .collect()
    }

    pub(crate) fn placeholder_visible(&self) -> bool {
        self.log.borrow().placeholder
    }

    pub(crate) fn terminal_mount(&self, session_id: &str) -> Option<u64> {
        self.log
            .borrow_mut()
            .live_terminal(session_id)
            .and_then(|t| t.mounted_on)
    }

    pub(crate) fn focus_count(&self, session_id: &str) -> usize {
        self.log
            .borrow_mut()
            .live_terminal(session_id)
            .map(|t| t.focuses)
            .unwrap_or(0)
    }

    pub(crate) fn refit_count(&self, session_id: &str) -> usize {
        self.log
            .borrow_mut()
            .live_terminal(session_id)
            .map(|t| t.refits)
            .unwrap_or(0)
    }

    pub(crate) fn written(&self, session_id: &str) -> Vec<u8> {
        self.log
            .borrow_mut()
            .live_terminal(session_id)
            .map(|t| t.written.clone())
            .unwrap_or_default()
    }

    pub(crate) fn fail_refit(&self, session_id: &str) {
        if let Some(t) = self.log.borrow_mut().live_terminal(session_id) {
            t.fail_refit = true;
        }
    }

    pub(crate) fn fail_refit_all(&self) {
        self.log.borrow_mut().fail_all_refits = true;
    }
}

impl SurfaceHost for FakeHost {
    fn create_terminal(&mut self, session_id: &str) -> Box<dyn TerminalSurface> {
        let mut log = self.log.borrow_mut();
        log.terminals.push(TerminalLog {
            session_id: session_id.to_string(),
            ..TerminalLog::default()
        });
        Box::new(FakeTerminal {
            log: Rc::clone(&self.log),
            index: log.terminals.len() - 1,
        })
    }

    fn mount_surface(&mut self, session_id: &str) -> SurfaceHandle {
        let mut log = self.log.borrow_mut();
        log.next_handle += 1;
        let raw = log.next_handle;
        log.surfaces.insert(
            raw,
            SurfaceLog {
                session_id: session_id.to_string(),
                visible: false,
            },
        );
        SurfaceHandle::new(raw)
    }

    fn set_visible(&mut self, surface: &SurfaceHandle, visible: bool) {
        self.log
            .borrow_mut()
            .surfaces
            .get_mut(&surface.raw())
            .expect("set_visible on unmounted surface")
            .visible = visible;
    }

    fn unmount_surface(&mut self, surface: SurfaceHandle) {
        self.log
            .borrow_mut()
            .surfaces
            .remove(&surface.raw())
            .expect("unmount of unknown surface");
    }

    fn show_placeholder(&mut self, visible: bool) {
        self.log.borrow_mut().placeholder = visible;
    }
}

// ── Directory browser ───────────────────────────────────────────────

pub(crate) struct FakeBrowser {
    current: RefCell<BrowserSnapshot>,
    fetches: RefCell<Vec<(SessionId, String)>>,
}

impl FakeBrowser {
    pub(crate) fn new() -> Self {
        Self {
            current: RefCell::new(BrowserSnapshot::at("/")),
            fetches: RefCell::new(Vec::new()),
        }
    }

    /// Simulate the user opening a directory.
    pub(crate) fn navigate(&self, path: &str) {
        let mut current = self.current.borrow_mut();
        if current.path == path {
            return;
        }
        let keep = current.history_cursor + 1;
        current.history.truncate(keep);
        current.history.push(path.to_string());
        current.history_cursor = current.history.len() - 1;
        current.path = path.to_string();
    }

    pub(crate) fn current(&self) -> BrowserSnapshot {
        self.current.borrow().clone()
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.borrow().len()
    }

    pub(crate) fn fetches_for(&self, session_id: &str) -> Vec<String> {
        self.fetches
            .borrow()
            .iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, path)| path.clone())
            .collect()
    }
}

#[async_trait(?Send)]
impl DirectoryBrowser for FakeBrowser {
    fn snapshot(&self) -> BrowserSnapshot {
        self.current()
    }

    async fn restore(
        &self,
        snapshot: BrowserSnapshot,
        session_id: &str,
    ) -> Result<(), BridgeError> {
        self.fetches
            .borrow_mut()
            .push((session_id.to_string(), snapshot.path.clone()));
        *self.current.borrow_mut() = snapshot;
        tokio::task::yield_now().await;
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub(crate) struct Harness {
    pub(crate) orchestrator: Orchestrator,
    pub(crate) backend: Rc<FakeBackend>,
    pub(crate) browser: Rc<FakeBrowser>,
    pub(crate) host: FakeHost,
    signals: RefCell<mpsc::UnboundedReceiver<UiSignal>>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let backend = Rc::new(FakeBackend::new());
        let browser = Rc::new(FakeBrowser::new());
        let host = FakeHost::new();
        let (orchestrator, signals) = Orchestrator::new(
            OrchestratorConfig::default(),
            Rc::clone(&backend) as Rc<dyn Backend>,
            Rc::clone(&browser) as Rc<dyn DirectoryBrowser>,
            host.boxed(),
        );
        Self {
            orchestrator,
            backend,
            browser,
            host,
            signals: RefCell::new(signals),
        }
    }

    pub(crate) fn drain_signals(&self) -> Vec<UiSignal> {
        let mut rx = self.signals.borrow_mut();
        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        signals
    }

    /// Give spawned tasks on the current `LocalSet` a chance to run.
    pub(crate) async fn settle(&self) {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    /// Check the visibility and ownership invariants against the fakes.
    pub(crate) fn assert_invariants(&self) {
        let ids = self.orchestrator.session_ids();
        let visible = self.host.visible_sessions();

        match self.orchestrator.active_session() {
            Some(active) => {
                assert!(ids.contains(&active), "active {active} not in registry");
                assert_eq!(visible, vec![active], "only the active surface is visible");
                assert!(!self.host.placeholder_visible());
            }
            None => {
                assert!(visible.is_empty(), "no surface visible in empty state");
                assert!(self.host.placeholder_visible());
            }
        }

        for id in &ids {
            assert_eq!(self.host.live_terminals(id), 1, "terminals of {id}");
            assert_eq!(self.host.mounted_surfaces(id), 1, "surfaces of {id}");
        }
        assert_eq!(self.host.total_live_terminals(), ids.len());
        assert_eq!(self.host.total_mounted_surfaces(), ids.len());
    }
}
