/// Capacity probe backed by `statfs(2)`.
use crate::error::MountError;
use crate::model::Capacity;
use crate::probe::CapacityProbe;
use nix::sys::statfs::statfs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct StatfsProbe;

impl CapacityProbe for StatfsProbe {
    fn probe(&self, mount_point: &Path) -> Result<Capacity, MountError> {
        let stat = statfs(mount_point).map_err(|errno| MountError::Probe {
            mount_point: mount_point.to_path_buf(),
            source: io::Error::from(errno),
        })?;

        Ok(Capacity {
            block_size: stat.block_size() as i64,
            total_blocks: stat.blocks() as u64,
            available_blocks: stat.blocks_available() as u64,
        })
    }
}
