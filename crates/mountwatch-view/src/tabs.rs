/// Mount tabs: one form per mounted device, keyed by device identity.
///
/// Tabs keep discovery order: the initial snapshot's order, then each
/// newly mounted device appended at the end. Updates change a tab in
/// place and removals close it without reordering the rest.
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use mountwatch_core::{MountEvent, MountRecord, Snapshot};
use serde::Serialize;

/// Labels of the form rows, in display order.
pub const FORM_LABELS: [&str; 5] = ["Mount Point", "Device", "File System", "Size", "Available"];

/// The rendered form of one mount.
#[derive(Debug, Clone, Serialize)]
pub struct Tab {
    pub mount_point: String,
    pub device: String,
    pub filesystem: String,
    pub size: String,
    pub available: String,
    /// When this tab was created or last changed.
    pub updated_at: DateTime<Local>,
}

impl Tab {
    pub fn from_record(record: &MountRecord) -> Self {
        Self {
            mount_point: record.mount_point.display().to_string(),
            device: record.device.clone(),
            filesystem: record.filesystem.clone(),
            size: record.size(),
            available: record.available(),
            updated_at: Local::now(),
        }
    }

    /// `(label, value)` pairs in [`FORM_LABELS`] order.
    pub fn rows(&self) -> [(&'static str, &str); 5] {
        [
            (FORM_LABELS[0], self.mount_point.as_str()),
            (FORM_LABELS[1], self.device.as_str()),
            (FORM_LABELS[2], self.filesystem.as_str()),
            (FORM_LABELS[3], self.size.as_str()),
            (FORM_LABELS[4], self.available.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct MountTabs {
    tabs: IndexMap<String, Tab>,
}

impl MountTabs {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            tabs: snapshot
                .iter()
                .map(|rec| (rec.device.clone(), Tab::from_record(rec)))
                .collect(),
        }
    }

    /// Apply one reconciler event. Returns `false` when the event did not
    /// match the current tabs (update or removal of an unknown device).
    pub fn apply(&mut self, event: &MountEvent) -> bool {
        match event {
            MountEvent::Add(rec) => {
                self.tabs.insert(rec.device.clone(), Tab::from_record(rec));
                true
            }
            MountEvent::Update(rec) => match self.tabs.get_mut(&rec.device) {
                Some(tab) => {
                    *tab = Tab::from_record(rec);
                    true
                }
                None => false,
            },
            MountEvent::Remove(device) => self.tabs.shift_remove(device).is_some(),
        }
    }

    pub fn get(&self, device: &str) -> Option<&Tab> {
        self.tabs.get(device)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.values()
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.tabs.keys().map(String::as_str)
    }
}
