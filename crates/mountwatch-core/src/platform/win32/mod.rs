/// Windows implementation: volume enumeration, `GetDiskFreeSpaceW`
/// capacity probing and a watcher without change notification.
pub mod volumes;
pub mod watcher;

pub use volumes::{enumerate_volumes, DiskFreeSpaceProbe};
pub use watcher::WindowsWatcher;
