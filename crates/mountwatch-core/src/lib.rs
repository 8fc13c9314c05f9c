/// MountWatch Core: mount-table snapshots, capacity probing, change
/// watching and snapshot reconciliation.
///
/// This crate contains all business logic with zero UI dependencies.
/// Any frontend (GUI, TUI, console) consumes it through the [`Watcher`]
/// trait and [`reconcile::diff`].
///
/// # Modules
///
/// - [`model`]: Mount records, capacity, snapshots, size formatting.
/// - [`probe`]: The capacity-probe seam.
/// - [`platform`]: Per-OS mount-table sources and watchers.
/// - [`watcher`]: The platform-neutral watcher interface.
/// - [`reconcile`]: Add/update/remove events between two snapshots.
pub mod error;
pub mod model;
pub mod platform;
pub mod probe;
pub mod reconcile;
pub mod watcher;

pub use error::MountError;
pub use model::{Capacity, MountRecord, Snapshot};
pub use platform::{new_watcher, PlatformProbe, PlatformWatcher};
pub use probe::CapacityProbe;
pub use reconcile::{diff, MountEvent};
pub use watcher::Watcher;
