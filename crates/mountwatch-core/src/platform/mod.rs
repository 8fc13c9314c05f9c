/// Platform-specific functionality: one mount-table source and watcher
/// per OS family, chosen at compile time.
///
/// - Linux family: `/proc/mounts` + `statfs`, watched with `poll(2)`.
/// - Windows: volume enumeration + `GetDiskFreeSpaceW`, no watching.
use crate::error::MountError;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod linux;
#[cfg(windows)]
pub mod win32;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use linux::{LinuxWatcher as PlatformWatcher, StatfsProbe as PlatformProbe};
#[cfg(windows)]
pub use win32::{DiskFreeSpaceProbe as PlatformProbe, WindowsWatcher as PlatformWatcher};

#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
compile_error!("mountwatch supports Linux-family and Windows targets only");

/// Build this platform's watcher with its default mount-table source.
pub fn new_watcher() -> Result<PlatformWatcher, MountError> {
    PlatformWatcher::new()
}
