//! Collaborator contracts for terminal rendering.
//!
//! A [`SurfaceHost`] is the container the tabs live in. For each session it
//! mounts one display surface and creates one [`TerminalSurface`] that renders
//! into it. Both belong to exactly one [`SessionRecord`](crate::SessionRecord).

/// Errors from terminal surface operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// The container has no measurable size yet (e.g. mid layout transition).
    #[error("surface has no layout yet")]
    NotLaidOut,
    #[error("surface refit failed: {0}")]
    RefitFailed(String),
}

/// Opaque handle to a mounted display surface.
///
/// Not `Clone`: the owner gives it back to [`SurfaceHost::unmount_surface`],
/// which consumes it, so a surface cannot be unmounted twice.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub fn new(raw: u64) -> Self {
        SurfaceHandle(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// One interactive terminal bound to one session.
///
/// Called while the orchestrator is mid-update: implementations must not call
/// back into the [`Orchestrator`](crate::Orchestrator). Keystrokes and grid
/// sizes go back through the host's own event loop.
pub trait TerminalSurface {
    /// Attach to the display surface it renders into.
    fn mount(&mut self, surface: &SurfaceHandle);

    /// Render raw bytes received from the remote shell.
    fn write(&mut self, data: &[u8]);

    /// Re-measure the container and resize the character grid to fit.
    fn refit(&mut self) -> Result<(), SurfaceError>;

    /// Take keyboard focus.
    fn focus(&mut self);

    /// Release rendering resources. Called exactly once.
    fn dispose(&mut self);
}

/// The container that owns display surfaces and the empty-state placeholder.
///
/// Same re-entrancy rule as [`TerminalSurface`].
pub trait SurfaceHost {
    /// Create a fresh, unmounted terminal for `session_id`.
    fn create_terminal(&mut self, session_id: &str) -> Box<dyn TerminalSurface>;

    /// Mount a new display surface for `session_id`. It starts hidden.
    fn mount_surface(&mut self, session_id: &str) -> SurfaceHandle;

    fn set_visible(&mut self, surface: &SurfaceHandle, visible: bool);

    fn unmount_surface(&mut self, surface: SurfaceHandle);

    /// Show or hide the "no session" placeholder.
    fn show_placeholder(&mut self, visible: bool);
}
