//! Demultiplexes backend push-events to their sessions.
//!
//! There is one router per process, fed by one channel. Events are handled one
//! at a time and each event's effect on local state is applied before the next
//! one is taken, so per-session ordering is exactly the order the backend sent.
//! The slow tail of a `closed` event (loading the replacement's listing and the
//! disconnect notice) runs as its own local task so other sessions keep
//! receiving output meanwhile.

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bridge::PushEvent;
use crate::orchestrator::Orchestrator;

pub struct EventRouter {
    orchestrator: Orchestrator,
}

/// Keeps a spawned router alive and lets the owner stop it. Dropping the
/// handle stops the router too.
pub struct RouterHandle {
    stop_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl RouterHandle {
    /// Stop the router after the event it is currently handling.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.join.await;
    }

    /// Wait for the router to finish on its own, i.e. for every sender of
    /// the push channel to be dropped.
    pub async fn finished(self) {
        let RouterHandle { stop_tx, join } = self;
        let _ = join.await;
        drop(stop_tx);
    }
}

impl EventRouter {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Handle a single push-event. Must run inside a `LocalSet`.
    pub fn dispatch(&self, event: PushEvent) {
        match event {
            PushEvent::Data { session_id, data } => {
                // Background sessions keep rendering so nothing is lost.
                if !self.orchestrator.deliver_output(&session_id, &data) {
                    debug!(
                        "dropping {} bytes for closed session {session_id}",
                        data.len()
                    );
                }
            }
            PushEvent::Error {
                session_id,
                message,
            } => self.orchestrator.report_fault(&session_id, message),
            PushEvent::Closed { session_id } => {
                if let Some(pending) = self.orchestrator.begin_close(&session_id) {
                    let orchestrator = self.orchestrator.clone();
                    tokio::task::spawn_local(async move {
                        orchestrator.finish_close(pending).await;
                    });
                }
            }
        }
    }

    /// Dispatch events until the channel closes or `stop_rx` fires.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<PushEvent>,
        mut stop_rx: mpsc::Receiver<()>,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = stop_rx.recv() => return,
                event = events.recv() => event,
            };
            match event {
                Some(event) => self.dispatch(event),
                None => return,
            }
        }
    }

    /// Run on the current `LocalSet`.
    pub fn spawn(self, events: mpsc::Receiver<PushEvent>) -> RouterHandle {
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let join = tokio::task::spawn_local(self.run(events, stop_rx));
        RouterHandle { stop_tx, join }
    }
}
