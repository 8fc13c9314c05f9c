/// Error type shared by every part of the core.
///
/// Construction errors (`Open`, `Read`, `Enumerate`) surface synchronously.
/// Runtime failures of the background loop (`Wait`, `Read`) are delivered
/// once on the watcher's error channel. `WatchUnsupported` is only ever
/// returned from `Watcher::watch` and is never sent on a channel.
use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    /// The mount-table source could not be opened.
    #[error("failed to open mount table {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Seeking or reading the mount-table source failed.
    #[error("failed to read mount table: {0}")]
    Read(#[source] io::Error),

    /// The capacity of a single mount point could not be queried.
    #[error("failed to query capacity of {}: {source}", mount_point.display())]
    Probe {
        mount_point: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A volume-enumeration call failed.
    #[error("{call} failed: {source}")]
    Enumerate {
        call: &'static str,
        #[source]
        source: io::Error,
    },

    /// The OS returned a volume name that is not a `\\?\Volume{..}\` path.
    #[error("unexpected volume name {0:?}")]
    BadVolumePath(String),

    /// The readiness wait failed with something other than an interruption.
    #[error("failed to wait for mount table changes: {0}")]
    Wait(#[source] io::Error),

    /// This platform has no change notification for the mount table.
    #[error("watching for mount changes is not supported on this platform")]
    WatchUnsupported,

    /// `watch` was called on a watcher whose loop already started.
    #[error("the mount watcher is already running")]
    AlreadyWatching,

    /// The background thread could not be started.
    #[error("failed to spawn the mount watcher thread: {0}")]
    Spawn(#[source] io::Error),
}

impl MountError {
    /// `true` for the platform-unsupported signal, which is not a runtime
    /// failure and leaves the watcher usable for on-demand reads.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::WatchUnsupported)
    }
}
