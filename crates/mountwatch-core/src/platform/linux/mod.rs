/// Linux-family implementation: `/proc/mounts` parsing, `statfs`
/// capacity probing and a `poll(2)`-driven watcher.
pub mod statfs;
pub mod table;
pub mod watcher;

pub use statfs::StatfsProbe;
pub use table::{
    open_mount_table, read_snapshot, MountFilter, MountTableConfig, DEFAULT_ALLOWED_PREFIXES,
    PROC_MOUNTS,
};
pub use watcher::LinuxWatcher;
