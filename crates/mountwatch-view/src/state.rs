/// View state: the consumer side of the watcher contract.
///
/// Holds the last reconciled snapshot and the tabs built from it. Each
/// change notification makes it fetch the watcher's current snapshot, diff
/// it against the previous one, and apply the resulting events to the
/// tabs. The error channel is terminal: once it fires (or both channels
/// disconnect) no further events are expected.
use crate::tabs::MountTabs;
use crossbeam_channel::{select, Receiver, TryRecvError};
use mountwatch_core::{diff, MountError, MountEvent, Snapshot, Watcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Maximum notifications handled per [`MountView::process_watcher_messages`]
/// call, so a frame-driven frontend never stalls on a burst.
pub const MAX_MESSAGES_PER_FRAME: usize = 32;

/// Lifecycle of the watcher as seen by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    /// Constructed; `start_watching` not called yet.
    Idle,
    /// The background loop is running.
    Watching,
    /// The platform cannot watch; the initial tabs are all there is.
    Unsupported,
    /// The watcher reported a terminal error.
    Failed,
    /// The watcher was stopped.
    Stopped,
}

pub struct MountView<W: Watcher> {
    watcher: W,
    mounts: Arc<Snapshot>,
    tabs: MountTabs,
    phase: WatchPhase,
    last_error: Option<String>,
    events: Receiver<()>,
    errors: Receiver<MountError>,
}

impl<W: Watcher> MountView<W> {
    /// Build tabs from the watcher's current snapshot.
    pub fn new(watcher: W) -> Self {
        let mounts = watcher.mounts();
        let tabs = MountTabs::from_snapshot(&mounts);
        let events = watcher.events();
        let errors = watcher.errors();

        Self {
            watcher,
            mounts,
            tabs,
            phase: WatchPhase::Idle,
            last_error: None,
            events,
            errors,
        }
    }

    /// Start the watcher's background loop.
    ///
    /// On an unsupported platform the phase becomes
    /// [`WatchPhase::Unsupported`] and the error is returned so the caller
    /// can tell the user; the tabs stay valid.
    pub fn start_watching(&mut self) -> Result<(), MountError> {
        match self.watcher.watch() {
            Ok(()) => {
                self.phase = WatchPhase::Watching;
                Ok(())
            }
            Err(e) if e.is_unsupported() => {
                info!("mount change notification unavailable on this platform");
                self.phase = WatchPhase::Unsupported;
                Err(e)
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    /// Drain pending notifications without blocking.
    ///
    /// Returns the events applied to the tabs, in order.
    pub fn process_watcher_messages(&mut self) -> Vec<MountEvent> {
        let mut applied = Vec::new();
        if self.phase != WatchPhase::Watching {
            return applied;
        }

        for _ in 0..MAX_MESSAGES_PER_FRAME {
            match self.errors.try_recv() {
                Ok(e) => {
                    self.record_failure(&e);
                    return applied;
                }
                Err(TryRecvError::Disconnected) => {
                    self.phase = WatchPhase::Stopped;
                    return applied;
                }
                Err(TryRecvError::Empty) => {}
            }

            match self.events.try_recv() {
                Ok(()) => applied.extend(self.resync()),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.phase = WatchPhase::Stopped;
                    break;
                }
            }
        }
        applied
    }

    /// Block until the next notification or error, or until `timeout`
    /// passes (`None` waits indefinitely).
    ///
    /// Returns the events applied to the tabs; empty on timeout, error or
    /// shutdown.
    pub fn wait_for_change(&mut self, timeout: Option<Duration>) -> Vec<MountEvent> {
        if self.phase != WatchPhase::Watching {
            return Vec::new();
        }

        let events = self.events.clone();
        let errors = self.errors.clone();
        let outcome = match timeout {
            Some(timeout) => select! {
                recv(events) -> msg => Some(msg.map_err(|_| None)),
                recv(errors) -> err => Some(Err(err.ok())),
                default(timeout) => None,
            },
            None => select! {
                recv(events) -> msg => Some(msg.map_err(|_| None)),
                recv(errors) -> err => Some(Err(err.ok())),
            },
        };

        match outcome {
            None => Vec::new(),
            Some(Ok(())) => self.resync(),
            Some(Err(Some(e))) => {
                self.record_failure(&e);
                Vec::new()
            }
            Some(Err(None)) => {
                self.phase = WatchPhase::Stopped;
                Vec::new()
            }
        }
    }

    /// Reconcile the tabs against the watcher's current snapshot.
    ///
    /// Called for every notification; also usable on platforms without
    /// notifications after re-reading the mount table by other means.
    pub fn resync(&mut self) -> Vec<MountEvent> {
        let next = self.watcher.mounts();
        let events = diff(&self.mounts, &next);
        for event in &events {
            self.tabs.apply(event);
        }
        if !events.is_empty() {
            info!(changes = events.len(), mounts = next.len(), "mount tabs updated");
        }
        self.mounts = next;
        events
    }

    /// Stop the watcher and wait for its loop to exit.
    pub fn stop(&mut self) {
        self.watcher.stop();
        if self.phase == WatchPhase::Watching {
            self.phase = WatchPhase::Stopped;
        }
    }

    fn record_failure(&mut self, e: &MountError) {
        error!(error = %e, "mount watcher failed");
        self.last_error = Some(e.to_string());
        self.phase = WatchPhase::Failed;
    }

    /// `true` while notifications can still arrive.
    pub fn is_active(&self) -> bool {
        self.phase == WatchPhase::Watching
    }

    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn tabs(&self) -> &MountTabs {
        &self.tabs
    }

    pub fn mounts(&self) -> &Snapshot {
        &self.mounts
    }

    pub fn watcher(&self) -> &W {
        &self.watcher
    }
}
