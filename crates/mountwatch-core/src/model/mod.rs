/// Data model for MountWatch.
///
/// Mount records, their capacity, and immutable snapshots of the mount table.
pub mod mount;
pub mod size;

pub use mount::{Capacity, MountRecord, Snapshot, UNKNOWN_SIZE};
pub use size::format_size;
