use crate::bridge::SessionId;
use crate::snapshot::BrowserSnapshot;
use crate::surface::{SurfaceHandle, SurfaceHost, TerminalSurface};

/// One live remote session: its tab label, its terminal, the display surface
/// the terminal renders into, and its parked directory-browser state.
///
/// The terminal and surface are created together in [`SessionRecord::open`]
/// and released together in [`SessionRecord::close`].
pub struct SessionRecord {
    id: SessionId,
    display_name: String,
    terminal: Box<dyn TerminalSurface>,
    surface: SurfaceHandle,
    browser_snapshot: BrowserSnapshot,
}

impl SessionRecord {
    /// Mount a hidden surface for `id`, create its terminal and attach the two.
    pub fn open(
        id: SessionId,
        display_name: String,
        host: &mut dyn SurfaceHost,
        browser_snapshot: BrowserSnapshot,
    ) -> Self {
        let surface = host.mount_surface(&id);
        let mut terminal = host.create_terminal(&id);
        terminal.mount(&surface);

        Self {
            id,
            display_name,
            terminal,
            surface,
            browser_snapshot,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    pub fn terminal_mut(&mut self) -> &mut dyn TerminalSurface {
        self.terminal.as_mut()
    }

    pub fn browser_snapshot(&self) -> &BrowserSnapshot {
        &self.browser_snapshot
    }

    pub fn set_browser_snapshot(&mut self, snapshot: BrowserSnapshot) {
        self.browser_snapshot = snapshot;
    }

    /// Dispose the terminal and unmount its surface.
    pub fn close(mut self, host: &mut dyn SurfaceHost) {
        self.terminal.dispose();
        host.unmount_surface(self.surface);
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("surface", &self.surface)
            .field("browser_snapshot", &self.browser_snapshot)
            .finish_non_exhaustive()
    }
}
