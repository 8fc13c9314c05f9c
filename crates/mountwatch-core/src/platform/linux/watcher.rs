/// Mount watcher for Linux-family systems.
///
/// `/proc/mounts` raises `POLLPRI` (with `POLLERR`) on an open descriptor
/// whenever the mount namespace changes. The background thread blocks in
/// `poll(2)` on that descriptor plus the read end of a wake pipe, so a
/// stop request can interrupt the wait without a timeout.
use super::statfs::StatfsProbe;
use super::table::{open_mount_table, read_snapshot, MountFilter, MountTableConfig};
use crate::error::MountError;
use crate::model::Snapshot;
use crate::probe::CapacityProbe;
use crate::watcher::worker::{ChangeSource, Controller, Wake};
use crate::watcher::{SnapshotCell, Watcher};
use crossbeam_channel::Receiver;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::pipe2;
use parking_lot::Mutex;
use std::fs::File;
use std::io;
use std::os::fd::AsFd;
use std::sync::Arc;
use tracing::debug;

pub struct LinuxWatcher<P: CapacityProbe + 'static = StatfsProbe> {
    filter: MountFilter,
    probe: Arc<P>,
    cell: Arc<SnapshotCell>,
    /// Open mount table; moved into the background thread by `watch`.
    table: Mutex<Option<File>>,
    /// Write end of the wake pipe while the loop runs; dropping it wakes
    /// the loop.
    wake: Mutex<Option<File>>,
    controller: Controller,
}

impl LinuxWatcher<StatfsProbe> {
    /// Open `/proc/mounts` and read the initial snapshot.
    pub fn new() -> Result<Self, MountError> {
        Self::with_config(MountTableConfig::default(), StatfsProbe)
    }
}

impl<P: CapacityProbe + 'static> LinuxWatcher<P> {
    /// Open `config.path` and read the initial snapshot with `probe`.
    pub fn with_config(config: MountTableConfig, probe: P) -> Result<Self, MountError> {
        let mut table = open_mount_table(&config.path)?;
        let snapshot = read_snapshot(&mut table, &config.filter, &probe)?;
        debug!(
            path = %config.path.display(),
            mounts = snapshot.len(),
            "initial mount table read"
        );

        Ok(Self {
            filter: config.filter,
            probe: Arc::new(probe),
            cell: Arc::new(SnapshotCell::new(snapshot)),
            table: Mutex::new(Some(table)),
            wake: Mutex::new(None),
            controller: Controller::new(),
        })
    }
}

impl<P: CapacityProbe + 'static> Watcher for LinuxWatcher<P> {
    fn mounts(&self) -> Arc<Snapshot> {
        self.cell.load()
    }

    fn watch(&self) -> Result<(), MountError> {
        // `stop` takes the wake end first, so holding it here keeps a
        // concurrent stop from joining a loop it cannot wake.
        let mut wake = self.wake.lock();
        let mut table = self.table.lock();

        let (wake_rx, wake_tx) =
            pipe2(OFlag::O_CLOEXEC).map_err(|errno| MountError::Wait(io::Error::from(errno)))?;
        let Some(file) = table.take() else {
            return Err(MountError::AlreadyWatching);
        };
        let source = ProcMountsSource {
            table: file,
            wake: File::from(wake_rx),
            filter: self.filter.clone(),
            probe: Arc::clone(&self.probe),
        };

        if let Err((source, e)) = self.controller.start(source, Arc::clone(&self.cell)) {
            *table = Some(source.table);
            return Err(e);
        }
        *wake = Some(File::from(wake_tx));
        debug!("watching /proc/mounts for changes");
        Ok(())
    }

    fn events(&self) -> Receiver<()> {
        self.controller.events()
    }

    fn errors(&self) -> Receiver<MountError> {
        self.controller.errors()
    }

    fn stop(&self) {
        // Closing the write end raises POLLHUP on the read end.
        let wake = self.wake.lock().take();
        self.controller.stop_with(move || drop(wake));
    }
}

impl<P: CapacityProbe + 'static> Drop for LinuxWatcher<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ProcMountsSource<P: CapacityProbe + 'static> {
    table: File,
    wake: File,
    filter: MountFilter,
    probe: Arc<P>,
}

impl<P: CapacityProbe + 'static> ChangeSource for ProcMountsSource<P> {
    fn wait(&mut self) -> Result<Wake, MountError> {
        let mut fds = [
            PollFd::new(self.table.as_fd(), PollFlags::POLLPRI),
            PollFd::new(self.wake.as_fd(), PollFlags::POLLIN),
        ];

        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Wake::Interrupted),
            Err(errno) => return Err(MountError::Wait(io::Error::from(errno))),
        }

        let revents = |fd: &PollFd| fd.revents().unwrap_or(PollFlags::empty());
        let (table, wake) = (revents(&fds[0]), revents(&fds[1]));

        if wake.intersects(PollFlags::POLLHUP | PollFlags::POLLIN) {
            return Ok(Wake::Stopped);
        }
        if table.contains(PollFlags::POLLNVAL) {
            return Err(MountError::Wait(io::Error::from(Errno::EBADF)));
        }
        if table.intersects(PollFlags::POLLPRI | PollFlags::POLLERR) {
            return Ok(Wake::Changed);
        }
        // Woken without a change: arm again.
        Ok(Wake::Interrupted)
    }

    fn reread(&mut self) -> Result<Snapshot, MountError> {
        read_snapshot(&mut self.table, &self.filter, &*self.probe)
    }
}
