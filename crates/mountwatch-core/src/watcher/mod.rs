/// The platform-neutral watcher interface.
///
/// Exactly one implementation is compiled per target (see
/// [`crate::platform`]). The consumer reads the current snapshot with
/// [`Watcher::mounts`], starts change detection with [`Watcher::watch`],
/// and selects over the two receivers:
///
/// ```ignore
/// let watcher = mountwatch_core::new_watcher()?;
/// watcher.watch()?;
/// crossbeam_channel::select! {
///     recv(watcher.events()) -> _ => { let now = watcher.mounts(); /* diff */ }
///     recv(watcher.errors()) -> err => { /* terminal */ }
/// }
/// ```
#[cfg_attr(
    not(any(target_os = "linux", target_os = "android")),
    allow(dead_code)
)]
pub(crate) mod worker;

use crate::error::MountError;
use crate::model::Snapshot;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::sync::Arc;

/// Name given to the background detection thread.
pub const WATCHER_THREAD_NAME: &str = "mountwatch-watcher";

pub trait Watcher: Send + Sync {
    /// The most recently captured snapshot. Never blocks on the background
    /// loop; a concurrent re-read is seen either completely or not at all.
    fn mounts(&self) -> Arc<Snapshot>;

    /// Start the background detection loop.
    ///
    /// Returns [`MountError::WatchUnsupported`] without starting anything
    /// when the platform has no change notification, and
    /// [`MountError::AlreadyWatching`] on a second call.
    fn watch(&self) -> Result<(), MountError>;

    /// Fires once per detected change, without payload. Sends are
    /// rendezvous: the loop does not read ahead of the consumer.
    fn events(&self) -> Receiver<()>;

    /// Fires at most once with the error that ended the loop. Both
    /// receivers report disconnection afterwards.
    fn errors(&self) -> Receiver<MountError>;

    /// Ask the background loop to exit and wait until it has. Both
    /// receivers are disconnected once this returns. Idempotent.
    fn stop(&self);
}

/// Holder of the current snapshot. Replacement swaps the whole `Arc`
/// under a short write lock; readers clone the `Arc` under a read lock.
#[derive(Debug, Default)]
pub(crate) struct SnapshotCell {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotCell {
    pub(crate) fn new(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub(crate) fn load(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub(crate) fn replace(&self, snapshot: Snapshot) {
        *self.current.write() = Arc::new(snapshot);
    }
}
