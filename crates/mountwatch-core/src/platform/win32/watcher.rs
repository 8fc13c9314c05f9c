/// Mount watcher for Windows.
///
/// Windows gives no blocking wait on "the set of mounted volumes changed",
/// so [`Watcher::watch`] reports [`MountError::WatchUnsupported`] instead of
/// polling. Snapshots are still available: one at construction, and more
/// on demand through [`WindowsWatcher::refresh`].
use super::volumes::{enumerate_volumes, DiskFreeSpaceProbe};
use crate::error::MountError;
use crate::model::Snapshot;
use crate::probe::CapacityProbe;
use crate::watcher::worker::Controller;
use crate::watcher::{SnapshotCell, Watcher};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use tracing::debug;

pub struct WindowsWatcher<P: CapacityProbe + 'static = DiskFreeSpaceProbe> {
    probe: P,
    cell: SnapshotCell,
    controller: Controller,
}

impl WindowsWatcher<DiskFreeSpaceProbe> {
    /// Enumerate all volumes for the initial snapshot.
    pub fn new() -> Result<Self, MountError> {
        Self::with_probe(DiskFreeSpaceProbe)
    }
}

impl<P: CapacityProbe + 'static> WindowsWatcher<P> {
    pub fn with_probe(probe: P) -> Result<Self, MountError> {
        let snapshot = enumerate_volumes(&probe)?;
        debug!(mounts = snapshot.len(), "initial volume enumeration");

        Ok(Self {
            probe,
            cell: SnapshotCell::new(snapshot),
            controller: Controller::new(),
        })
    }

    /// Enumerate again and replace the current snapshot.
    pub fn refresh(&self) -> Result<Arc<Snapshot>, MountError> {
        self.cell.replace(enumerate_volumes(&self.probe)?);
        Ok(self.cell.load())
    }
}

impl<P: CapacityProbe + 'static> Watcher for WindowsWatcher<P> {
    fn mounts(&self) -> Arc<Snapshot> {
        self.cell.load()
    }

    fn watch(&self) -> Result<(), MountError> {
        Err(MountError::WatchUnsupported)
    }

    fn events(&self) -> Receiver<()> {
        self.controller.events()
    }

    fn errors(&self) -> Receiver<MountError> {
        self.controller.errors()
    }

    fn stop(&self) {
        self.controller.stop_with(|| {});
    }
}
