/// Capacity probing: block size and block counts for a mount point.
///
/// The platform modules provide the real implementations
/// (`statfs` on Linux, `GetDiskFreeSpaceW` on Windows). Any
/// `Fn(&Path) -> Result<Capacity, MountError>` is also a probe, which is
/// how tests feed fixed geometry to the snapshot reader.
use crate::error::MountError;
use crate::model::Capacity;
use std::path::Path;

pub trait CapacityProbe: Send + Sync {
    fn probe(&self, mount_point: &Path) -> Result<Capacity, MountError>;
}

impl<F> CapacityProbe for F
where
    F: Fn(&Path) -> Result<Capacity, MountError> + Send + Sync,
{
    fn probe(&self, mount_point: &Path) -> Result<Capacity, MountError> {
        self(mount_point)
    }
}
