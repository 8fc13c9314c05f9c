/// Volume enumeration using the Windows API.
///
/// Walks every volume with `FindFirstVolumeW`/`FindNextVolumeW`, resolves
/// its DOS device name (the record's identity) and its first mount path,
/// then queries filesystem name and cluster geometry. Volumes without a
/// mount path are skipped.
///
/// Any failure of the enumeration calls themselves aborts the whole read.
/// Per-volume information queries do not: an unreadable volume (e.g. an
/// empty card reader) is still listed, with no filesystem name and unknown
/// capacity.
use crate::error::MountError;
use crate::model::{Capacity, MountRecord, Snapshot};
use crate::probe::CapacityProbe;
use std::io;
use std::iter;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{ERROR_MORE_DATA, ERROR_NO_MORE_FILES, HANDLE, MAX_PATH};
use windows::Win32::Storage::FileSystem::{
    FindFirstVolumeW, FindNextVolumeW, FindVolumeClose, GetDiskFreeSpaceW,
    GetVolumeInformationW, GetVolumePathNamesForVolumeNameW, QueryDosDeviceW,
};

/// Buffer length, in UTF-16 units, for names returned by the volume APIs.
const NAME_LEN: usize = MAX_PATH as usize + 1;

/// Capacity probe backed by `GetDiskFreeSpaceW`. One block is one cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFreeSpaceProbe;

impl CapacityProbe for DiskFreeSpaceProbe {
    fn probe(&self, mount_point: &Path) -> Result<Capacity, MountError> {
        let root = to_wide(mount_point);
        let mut sectors_per_cluster = 0u32;
        let mut bytes_per_sector = 0u32;
        let mut free_clusters = 0u32;
        let mut total_clusters = 0u32;

        unsafe {
            GetDiskFreeSpaceW(
                PCWSTR(root.as_ptr()),
                Some(&mut sectors_per_cluster as *mut u32),
                Some(&mut bytes_per_sector as *mut u32),
                Some(&mut free_clusters as *mut u32),
                Some(&mut total_clusters as *mut u32),
            )
        }
        .map_err(|e| MountError::Probe {
            mount_point: mount_point.to_path_buf(),
            source: io::Error::from(e),
        })?;

        Ok(Capacity {
            block_size: i64::from(sectors_per_cluster) * i64::from(bytes_per_sector),
            total_blocks: u64::from(total_clusters),
            available_blocks: u64::from(free_clusters),
        })
    }
}

/// Closes the `FindFirstVolumeW` search handle on every exit path.
struct VolumeSearch(HANDLE);

impl Drop for VolumeSearch {
    fn drop(&mut self) {
        unsafe {
            let _ = FindVolumeClose(self.0);
        }
    }
}

/// Enumerate every mounted volume into a snapshot.
pub fn enumerate_volumes<P>(probe: &P) -> Result<Snapshot, MountError>
where
    P: CapacityProbe + ?Sized,
{
    let mut name = [0u16; NAME_LEN];
    let search = unsafe { FindFirstVolumeW(&mut name) }
        .map(VolumeSearch)
        .map_err(|e| enumerate_error("FindFirstVolumeW", e))?;

    let mut records = Vec::new();
    loop {
        if let Some(record) = read_volume(&name, probe)? {
            records.push(record);
        }

        match unsafe { FindNextVolumeW(search.0, &mut name) } {
            Ok(()) => {}
            Err(e) if e.code() == ERROR_NO_MORE_FILES.to_hresult() => break,
            Err(e) => return Err(enumerate_error("FindNextVolumeW", e)),
        }
    }

    Ok(Snapshot::new(records))
}

fn read_volume<P>(name: &[u16], probe: &P) -> Result<Option<MountRecord>, MountError>
where
    P: CapacityProbe + ?Sized,
{
    let volume = from_wide_nul(name);
    if !is_volume_guid_path(&volume) {
        return Err(MountError::BadVolumePath(volume));
    }

    let device = dos_device_name(&volume)?;
    let Some(mount_point) = volume_path_names(name)?.into_iter().next() else {
        trace!(%volume, "volume has no mount path");
        return Ok(None);
    };
    let mount_point = PathBuf::from(mount_point);

    let filesystem = filesystem_name(&mount_point).unwrap_or_else(|e| {
        warn!(error = %e, mount_point = %mount_point.display(), "filesystem name unknown");
        String::new()
    });
    let capacity = match probe.probe(&mount_point) {
        Ok(capacity) => Some(capacity),
        Err(e) => {
            warn!(error = %e, "capacity unknown");
            None
        }
    };

    Ok(Some(MountRecord {
        device,
        mount_point,
        filesystem,
        capacity,
    }))
}

/// `\\?\Volume{GUID}\`: the only shape `FindFirstVolumeW` is documented
/// to return.
fn is_volume_guid_path(volume: &str) -> bool {
    volume.len() > 5 && volume.starts_with(r"\\?\") && volume.ends_with('\\')
}

/// `\\?\Volume{GUID}\` -> `\Device\HarddiskVolume3`.
fn dos_device_name(volume: &str) -> Result<String, MountError> {
    let inner = &volume[4..volume.len() - 1];
    let wide: Vec<u16> = inner.encode_utf16().chain(iter::once(0)).collect();
    let mut target = [0u16; NAME_LEN];

    let len = unsafe { QueryDosDeviceW(PCWSTR(wide.as_ptr()), Some(&mut target)) };
    if len == 0 {
        return Err(enumerate_error(
            "QueryDosDeviceW",
            windows::core::Error::from_win32(),
        ));
    }

    Ok(from_wide_nul(&target))
}

/// All mount paths of a volume; `name` is the nul-terminated volume name.
fn volume_path_names(name: &[u16]) -> Result<Vec<String>, MountError> {
    let mut buffer = vec![0u16; NAME_LEN];
    let mut needed = 0u32;

    loop {
        let result = unsafe {
            GetVolumePathNamesForVolumeNameW(
                PCWSTR(name.as_ptr()),
                Some(&mut buffer),
                &mut needed,
            )
        };
        match result {
            Ok(()) => return Ok(split_multi_sz(&buffer)),
            Err(e) if e.code() == ERROR_MORE_DATA.to_hresult() && needed as usize > buffer.len() => {
                buffer.resize(needed as usize, 0);
            }
            Err(e) => return Err(enumerate_error("GetVolumePathNamesForVolumeNameW", e)),
        }
    }
}

fn filesystem_name(mount_point: &Path) -> windows::core::Result<String> {
    let root = to_wide(mount_point);
    let mut fs_buf = [0u16; NAME_LEN];
    unsafe {
        GetVolumeInformationW(
            PCWSTR(root.as_ptr()),
            None,
            None,
            None,
            None,
            Some(&mut fs_buf),
        )?;
    }
    Ok(from_wide_nul(&fs_buf))
}

fn enumerate_error(call: &'static str, e: windows::core::Error) -> MountError {
    MountError::Enumerate {
        call,
        source: io::Error::from(e),
    }
}

fn to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str()
        .encode_wide()
        .chain(iter::once(0))
        .collect()
}

fn from_wide_nul(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

/// Split a double-nul-terminated list of strings.
fn split_multi_sz(buf: &[u16]) -> Vec<String> {
    buf.split(|&c| c == 0)
        .take_while(|s| !s.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}
