/// Background detection loop, independent of how the OS signals changes.
///
/// A [`ChangeSource`] knows how to block until the mount table may have
/// changed and how to re-read it. The loop around it is the same on every
/// platform that has such a source:
///
/// ```text
///   Armed ──wait()──▶ Interrupted ──▶ Armed
///     │                Changed ──reread()──▶ publish ──send event──▶ Armed
///     │                Stopped ──▶ exit
///     └── wait/reread error ──send error──▶ exit (terminal)
/// ```
///
/// Every exit drops the senders, which disconnects both receivers.
use super::{SnapshotCell, WATCHER_THREAD_NAME};
use crate::error::MountError;
use crate::model::Snapshot;
use crossbeam_channel::{bounded, select, Receiver, SendError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Outcome of one readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// The source signalled a possible change.
    Changed,
    /// The wait was interrupted by a signal; re-arm.
    Interrupted,
    /// A stop was requested while waiting.
    Stopped,
}

pub(crate) trait ChangeSource: Send + 'static {
    /// Block until the source may have changed.
    fn wait(&mut self) -> Result<Wake, MountError>;

    /// Read the whole source again.
    fn reread(&mut self) -> Result<Snapshot, MountError>;
}

/// Sending halves owned by the loop once it runs.
struct Outlets {
    events: Sender<()>,
    errors: Sender<MountError>,
    stop: Receiver<()>,
}

/// Channels, stop signal and thread handle of one watcher.
///
/// The senders stay parked here until [`Controller::start`] moves them into
/// the background thread, so a watcher that never starts keeps its
/// receivers connected but silent.
pub(crate) struct Controller {
    events_rx: Receiver<()>,
    errors_rx: Receiver<MountError>,
    parked: Mutex<Option<Outlets>>,
    stop_tx: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    pub(crate) fn new() -> Self {
        let (events_tx, events_rx) = bounded(0);
        let (errors_tx, errors_rx) = bounded(0);
        let (stop_tx, stop_rx) = bounded(0);

        Self {
            events_rx,
            errors_rx,
            parked: Mutex::new(Some(Outlets {
                events: events_tx,
                errors: errors_tx,
                stop: stop_rx,
            })),
            stop_tx: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(None),
        }
    }

    pub(crate) fn events(&self) -> Receiver<()> {
        self.events_rx.clone()
    }

    pub(crate) fn errors(&self) -> Receiver<MountError> {
        self.errors_rx.clone()
    }

    /// Move `source` and the senders into a new background thread.
    ///
    /// The thread is spawned first and receives both through a handoff
    /// channel, so on failure nothing has been consumed: the source comes
    /// back to the caller and the senders stay parked for a later start.
    pub(crate) fn start<S: ChangeSource>(
        &self,
        source: S,
        cell: Arc<SnapshotCell>,
    ) -> Result<(), (S, MountError)> {
        let mut parked = self.parked.lock();
        let Some(outlets) = parked.take() else {
            return Err((source, MountError::AlreadyWatching));
        };

        let (handoff_tx, handoff_rx) = bounded::<(S, Outlets)>(1);
        let spawned = thread::Builder::new()
            .name(WATCHER_THREAD_NAME.to_owned())
            .spawn(move || {
                if let Ok((source, outlets)) = handoff_rx.recv() {
                    run(source, &cell, outlets);
                }
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                *parked = Some(outlets);
                return Err((source, MountError::Spawn(e)));
            }
        };

        if let Err(SendError((source, outlets))) = handoff_tx.send((source, outlets)) {
            *parked = Some(outlets);
            return Err((
                source,
                MountError::Spawn(io::Error::other("watcher thread exited before start")),
            ));
        }

        // Stored before `parked` unlocks so a concurrent stop finds it.
        *self.thread.lock() = Some(handle);
        Ok(())
    }

    /// Signal the loop, call `wake` to interrupt a blocked wait, then join.
    pub(crate) fn stop_with(&self, wake: impl FnOnce()) {
        drop(self.stop_tx.lock().take());
        drop(self.parked.lock().take());
        wake();

        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                warn!("mount watcher thread panicked");
            }
            debug!("mount watcher stopped");
        }
    }
}

fn run<S: ChangeSource>(mut source: S, cell: &SnapshotCell, outlets: Outlets) {
    debug!("mount watcher armed");

    loop {
        if matches!(outlets.stop.try_recv(), Err(TryRecvError::Disconnected)) {
            debug!("mount watcher: stop requested");
            return;
        }

        match source.wait() {
            Ok(Wake::Changed) => {}
            Ok(Wake::Interrupted) => {
                trace!("mount watcher: wait interrupted, re-arming");
                continue;
            }
            Ok(Wake::Stopped) => {
                debug!("mount watcher: stop requested");
                return;
            }
            Err(e) => return fail(&outlets, e),
        }

        let snapshot = match source.reread() {
            Ok(snapshot) => snapshot,
            Err(e) => return fail(&outlets, e),
        };

        info!(mounts = snapshot.len(), "mount table changed");
        cell.replace(snapshot);

        // Blocks until the consumer takes the notification. Changes that
        // happen meanwhile are picked up by the next wait and re-read.
        select! {
            send(outlets.events, ()) -> res => {
                if res.is_err() {
                    debug!("mount watcher: event receiver gone");
                    return;
                }
            }
            recv(outlets.stop) -> _ => {
                debug!("mount watcher: stop requested");
                return;
            }
        }
    }
}

fn fail(outlets: &Outlets, err: MountError) {
    warn!(error = %err, "mount watcher failed");
    select! {
        send(outlets.errors, err) -> _ => {}
        recv(outlets.stop) -> _ => {}
    }
}
