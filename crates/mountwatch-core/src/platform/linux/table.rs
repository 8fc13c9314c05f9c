/// `/proc/mounts` reader.
///
/// Each line is `device mount_point fstype options dump pass`, separated by
/// spaces, with spaces, tabs, newlines and backslashes inside a field
/// written as three-digit octal escapes (`\040`, `\011`, `\012`, `\134`).
/// Only the first three columns are used.
use crate::error::MountError;
use crate::model::{MountRecord, Snapshot};
use crate::probe::CapacityProbe;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// The kernel's per-process view of the mount table.
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Mount-point prefixes, besides `/` itself, that hold user-relevant storage.
pub const DEFAULT_ALLOWED_PREFIXES: [&str; 4] = ["/mnt", "/media", "/run/media", "/run/mount"];

/// Decides which mount-table lines become records.
///
/// A line is kept when its device is an absolute path (which rules out
/// `proc`, `sysfs`, `tmpfs` and friends) and its mount point is `/` or
/// starts with one of the allowed prefixes. Prefixes are compared as plain
/// strings, so `/mnt` also admits `/mnt2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountFilter {
    allowed_prefixes: Vec<String>,
}

impl Default for MountFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_PREFIXES)
    }
}

impl MountFilter {
    pub fn new<I, S>(allowed_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_prefixes: allowed_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed_prefixes(&self) -> &[String] {
        &self.allowed_prefixes
    }

    pub fn accepts(&self, device: &str, mount_point: &str) -> bool {
        device.starts_with('/')
            && (mount_point == "/"
                || self
                    .allowed_prefixes
                    .iter()
                    .any(|prefix| mount_point.starts_with(prefix.as_str())))
    }
}

/// Where to read the mount table from and which entries to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTableConfig {
    pub path: PathBuf,
    pub filter: MountFilter,
}

impl Default for MountTableConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(PROC_MOUNTS),
            filter: MountFilter::default(),
        }
    }
}

/// Open the mount table read-only.
pub fn open_mount_table(path: &Path) -> Result<File, MountError> {
    File::open(path).map_err(|source| MountError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Rewind `handle` and read it to the end into a snapshot.
///
/// Malformed lines and lines rejected by `filter` are skipped. A device
/// mounted more than once (bind mounts, btrfs subvolumes) is recorded at
/// its first mount point only, so `device` stays unique within the
/// snapshot. A mount point whose capacity cannot be probed is still
/// recorded, with `capacity: None`. Only a failure to seek or read the
/// handle is an error.
pub fn read_snapshot<R, P>(
    handle: &mut R,
    filter: &MountFilter,
    probe: &P,
) -> Result<Snapshot, MountError>
where
    R: Read + Seek,
    P: CapacityProbe + ?Sized,
{
    handle.seek(SeekFrom::Start(0)).map_err(MountError::Read)?;

    let mut reader = BufReader::new(handle);
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).map_err(MountError::Read)? == 0 {
            break;
        }

        let text = String::from_utf8_lossy(&line);
        let Some(entry) = parse_line(text.trim_end_matches('\n'), filter) else {
            continue;
        };
        if !seen.insert(entry.device.clone()) {
            debug!(
                device = %entry.device,
                mount_point = %entry.mount_point.display(),
                "skipping repeated mount of device"
            );
            continue;
        }
        records.push(entry.into_record(probe));
    }

    Ok(Snapshot::new(records))
}

/// The columns of one accepted line, before probing.
struct MountEntry {
    device: String,
    mount_point: PathBuf,
    filesystem: String,
}

impl MountEntry {
    fn into_record<P>(self, probe: &P) -> MountRecord
    where
        P: CapacityProbe + ?Sized,
    {
        let capacity = match probe.probe(&self.mount_point) {
            Ok(capacity) => Some(capacity),
            Err(e) => {
                warn!(error = %e, "capacity unknown");
                None
            }
        };

        MountRecord {
            device: self.device,
            mount_point: self.mount_point,
            filesystem: self.filesystem,
            capacity,
        }
    }
}

fn parse_line(line: &str, filter: &MountFilter) -> Option<MountEntry> {
    let mut fields = line.split_whitespace();
    let (Some(device), Some(mount_point), Some(filesystem)) =
        (fields.next(), fields.next(), fields.next())
    else {
        if !line.trim().is_empty() {
            debug!(line, "skipping malformed mount table line");
        }
        return None;
    };

    let device = unescape(device);
    let mount_point = unescape(mount_point);
    if !filter.accepts(&device, &mount_point) {
        trace!(%device, %mount_point, "mount filtered out");
        return None;
    }

    Some(MountEntry {
        device: device.into_owned(),
        mount_point: PathBuf::from(mount_point.into_owned()),
        filesystem: unescape(filesystem).into_owned(),
    })
}

/// Decode the kernel's `\ooo` octal escapes. Anything that is not a valid
/// three-digit escape is kept as written.
fn unescape(field: &str) -> Cow<'_, str> {
    if !field.contains('\\') {
        return Cow::Borrowed(field);
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Capacity;
    use std::io::{self, Cursor};
    use std::sync::Mutex;

    const SAMPLE: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev,size=3256888k,mode=755 0 0
/dev/nvme0n1p1 /boot/efi vfat rw,relatime 0 0
/dev/sdb1 /run/media/alice/USB\\040STICK vfat rw,nosuid,nodev 0 0
/dev/sdc1 /mnt/backup btrfs rw,relatime 0 0
/dev/loop3 /snap/core/1234 squashfs ro,nodev,relatime 0 0
";

    fn geometry() -> Capacity {
        Capacity {
            block_size: 4096,
            total_blocks: 1000,
            available_blocks: 250,
        }
    }

    fn fixed(_: &Path) -> Result<Capacity, MountError> {
        Ok(geometry())
    }

    fn read(table: &str) -> Snapshot {
        read_snapshot(&mut Cursor::new(table.as_bytes()), &MountFilter::default(), &fixed).unwrap()
    }

    #[test]
    fn keeps_root_and_removable_mounts_in_order() {
        let snap = read(SAMPLE);
        assert_eq!(
            snap.devices().collect::<Vec<_>>(),
            ["/dev/nvme0n1p2", "/dev/sdb1", "/dev/sdc1"]
        );
        let root = snap.find("/dev/nvme0n1p2").unwrap();
        assert_eq!(root.mount_point, PathBuf::from("/"));
        assert_eq!(root.filesystem, "ext4");
        assert_eq!(root.capacity, Some(geometry()));
    }

    #[test]
    fn decodes_octal_escapes() {
        let snap = read(SAMPLE);
        assert_eq!(
            snap.find("/dev/sdb1").unwrap().mount_point,
            PathBuf::from("/run/media/alice/USB STICK")
        );
        assert_eq!(unescape(r"a\011b\012c\134d"), "a\tb\nc\\d");
        assert_eq!(unescape(r"plain"), "plain");
        assert_eq!(unescape(r"trailing\04"), r"trailing\04");
        assert_eq!(unescape(r"not\999octal"), r"not\999octal");
    }

    #[test]
    fn filter_predicate() {
        let filter = MountFilter::default();
        assert!(filter.accepts("/dev/sda1", "/"));
        assert!(filter.accepts("/dev/sda1", "/mnt"));
        assert!(filter.accepts("/dev/sda1", "/mnt/data"));
        assert!(filter.accepts("/dev/sda1", "/media/usb"));
        assert!(filter.accepts("/dev/sda1", "/run/media/bob/disk"));
        assert!(filter.accepts("/dev/sda1", "/run/mount/x"));
        assert!(filter.accepts("/dev/sda1", "/mntextra"));
        assert!(!filter.accepts("/dev/sda1", "/home"));
        assert!(!filter.accepts("/dev/sda1", "/run/user/1000"));
        assert!(!filter.accepts("tmpfs", "/mnt/ram"));
        assert!(!filter.accepts("proc", "/"));
    }

    #[test]
    fn custom_prefixes_replace_defaults() {
        let filter = MountFilter::new(["/srv"]);
        assert!(filter.accepts("/dev/sda1", "/srv/data"));
        assert!(filter.accepts("/dev/sda1", "/"));
        assert!(!filter.accepts("/dev/sda1", "/mnt/data"));
        assert_eq!(filter.allowed_prefixes(), ["/srv".to_owned()]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let snap = read("\n/dev/sda1\n/dev/sdb1 /mnt\n   \n/dev/sdc1 /mnt/c ext4 rw 0 0\n");
        assert_eq!(snap.devices().collect::<Vec<_>>(), ["/dev/sdc1"]);
    }

    #[test]
    fn repeated_device_keeps_first_mount_point() {
        let probed = Mutex::new(Vec::new());
        let probe = |mount_point: &Path| -> Result<Capacity, MountError> {
            probed.lock().unwrap().push(mount_point.to_path_buf());
            Ok(geometry())
        };
        let table = "\
/dev/sda2 / btrfs rw,subvol=/@ 0 0
/dev/sda2 /mnt/snapshots btrfs rw,subvol=/@snapshots 0 0
/dev/sdb1 /media/usb vfat rw 0 0
/dev/sda2 /media/bind btrfs rw 0 0
";
        let snap = read_snapshot(&mut Cursor::new(table.as_bytes()), &MountFilter::default(), &probe)
            .unwrap();

        assert_eq!(snap.devices().collect::<Vec<_>>(), ["/dev/sda2", "/dev/sdb1"]);
        assert_eq!(snap.find("/dev/sda2").unwrap().mount_point, PathBuf::from("/"));
        assert_eq!(
            *probed.lock().unwrap(),
            [PathBuf::from("/"), PathBuf::from("/media/usb")]
        );
    }

    #[test]
    fn bind_mounts_do_not_disturb_reconciliation() {
        use crate::reconcile::{diff, MountEvent};

        let plain = read("/dev/sda2 / btrfs rw 0 0\n");
        let bound = read("/dev/sda2 / btrfs rw 0 0\n/dev/sda2 /mnt/snapshots btrfs rw 0 0\n");

        assert!(diff(&plain, &bound).is_empty());
        assert!(diff(&bound, &plain).is_empty());

        // Unmounting the first mount point leaves the device at the second.
        let moved = read("/dev/sda2 /mnt/snapshots btrfs rw 0 0\n");
        let events = diff(&bound, &moved);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            MountEvent::Update(rec) if rec.mount_point == PathBuf::from("/mnt/snapshots")
        ));
    }

    #[test]
    fn last_line_without_newline_is_read() {
        let snap = read("/dev/sda1 / ext4 rw 0 0");
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn empty_table_is_an_empty_snapshot() {
        assert!(read("").is_empty());
    }

    #[test]
    fn probe_failure_keeps_record_with_unknown_capacity() {
        let probe = |mount_point: &Path| {
            if mount_point == Path::new("/mnt/backup") {
                Err(MountError::Probe {
                    mount_point: mount_point.to_path_buf(),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                })
            } else {
                Ok(geometry())
            }
        };
        let snap = read_snapshot(
            &mut Cursor::new(SAMPLE.as_bytes()),
            &MountFilter::default(),
            &probe,
        )
        .unwrap();

        assert_eq!(snap.len(), 3);
        assert_eq!(snap.find("/dev/sdc1").unwrap().capacity, None);
        assert_eq!(snap.find("/dev/sdb1").unwrap().capacity, Some(geometry()));
    }

    #[test]
    fn rewinds_before_reading() {
        let mut cursor = Cursor::new(SAMPLE.as_bytes());
        let first = read_snapshot(&mut cursor, &MountFilter::default(), &fixed).unwrap();
        let second = read_snapshot(&mut cursor, &MountFilter::default(), &fixed).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.len(), 3);
    }

    /// Reader that fails after the first chunk, standing in for an I/O
    /// error half-way through the pseudo-file.
    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.served = true;
            let chunk = b"/dev/sda1 / ext4 rw 0 0\n";
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    impl Seek for FailingReader {
        fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn read_error_aborts() {
        let result = read_snapshot(
            &mut FailingReader { served: false },
            &MountFilter::default(),
            &fixed,
        );
        assert!(matches!(result, Err(MountError::Read(_))));
    }

    #[test]
    fn missing_table_is_an_open_error() {
        let err = open_mount_table(Path::new("/nonexistent/mounts")).unwrap_err();
        assert!(matches!(err, MountError::Open { .. }));
    }
}
