use super::size::format_size;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Rendering used for sizes of mounts whose capacity probe failed.
pub const UNKNOWN_SIZE: &str = "unknown";

/// Block geometry of a mounted filesystem as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capacity {
    /// Bytes per allocation block. Signed because `statfs` reports it that
    /// way; never negative in practice.
    pub block_size: i64,
    /// Total number of blocks on the filesystem.
    pub total_blocks: u64,
    /// Blocks available to unprivileged users.
    pub available_blocks: u64,
}

impl Capacity {
    pub fn total_bytes(&self) -> u64 {
        self.bytes(self.total_blocks)
    }

    pub fn available_bytes(&self) -> u64 {
        self.bytes(self.available_blocks)
    }

    fn bytes(&self, blocks: u64) -> u64 {
        let block_size = u64::try_from(self.block_size).unwrap_or(0);
        block_size.saturating_mul(blocks)
    }
}

/// One observed mount.
///
/// `device` is the identity key: two records with the same device are the
/// same mount, and field-for-field equality tells whether it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRecord {
    /// Block device path (Linux) or DOS device name (Windows).
    pub device: String,
    /// Where the device is attached.
    pub mount_point: PathBuf,
    /// Filesystem type label, e.g. "ext4" or "NTFS".
    pub filesystem: String,
    /// `None` when the capacity probe failed for this mount point.
    pub capacity: Option<Capacity>,
}

impl MountRecord {
    pub fn total_bytes(&self) -> Option<u64> {
        self.capacity.map(|c| c.total_bytes())
    }

    pub fn available_bytes(&self) -> Option<u64> {
        self.capacity.map(|c| c.available_bytes())
    }

    /// Human-readable total size, or [`UNKNOWN_SIZE`].
    pub fn size(&self) -> String {
        self.total_bytes()
            .map(format_size)
            .unwrap_or_else(|| UNKNOWN_SIZE.to_owned())
    }

    /// Human-readable available space, or [`UNKNOWN_SIZE`].
    pub fn available(&self) -> String {
        self.available_bytes()
            .map(format_size)
            .unwrap_or_else(|| UNKNOWN_SIZE.to_owned())
    }
}

/// One complete read of the mount table, in discovery order.
///
/// Snapshots are never mutated after they are built; the watcher replaces
/// its current snapshot wholesale on every re-read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<MountRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<MountRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MountRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MountRecord] {
        &self.records
    }

    /// The record for `device`, if present.
    pub fn find(&self, device: &str) -> Option<&MountRecord> {
        self.records.iter().find(|r| r.device == device)
    }

    /// Index of the record for `device`, if present.
    pub fn position(&self, device: &str) -> Option<usize> {
        self.records.iter().position(|r| r.device == device)
    }

    /// Device identities in discovery order.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.device.as_str())
    }
}

impl From<Vec<MountRecord>> for Snapshot {
    fn from(records: Vec<MountRecord>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<MountRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = MountRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a MountRecord;
    type IntoIter = std::slice::Iter<'a, MountRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
