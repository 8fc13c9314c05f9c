/// MountWatch View: presentation state for mount tabs.
///
/// This crate turns watcher notifications into tab changes. Mount logic
/// lives in `mountwatch-core`; rendering here is plain text and JSON.
pub mod render;
pub mod state;
pub mod tabs;

pub use state::{MountView, WatchPhase};
pub use tabs::{MountTabs, Tab};
