/// Snapshot reconciliation: turns two snapshots into add/update/remove
/// events keyed by device identity.
///
/// Removals and updates come first (in old-snapshot order), additions last
/// (in new-snapshot order), so applying the events in sequence always ends
/// with the new membership.
use crate::model::{MountRecord, Snapshot};
use serde::{Deserialize, Serialize};

/// One change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountEvent {
    /// A device present in both snapshots whose record changed. Carries
    /// the new record.
    Update(MountRecord),
    /// A device that disappeared. Carries its identity.
    Remove(String),
    /// A device that appeared.
    Add(MountRecord),
}

impl MountEvent {
    /// The device this event refers to.
    pub fn device(&self) -> &str {
        match self {
            Self::Update(rec) | Self::Add(rec) => &rec.device,
            Self::Remove(device) => device,
        }
    }
}

/// Compare `old` against `new` and list the events that turn one into the
/// other. Identical snapshots produce no events.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<MountEvent> {
    let mut events = Vec::new();

    for old_rec in old {
        match new.find(&old_rec.device) {
            Some(new_rec) if new_rec == old_rec => {}
            Some(new_rec) => events.push(MountEvent::Update(new_rec.clone())),
            None => events.push(MountEvent::Remove(old_rec.device.clone())),
        }
    }

    events.extend(
        new.iter()
            .filter(|rec| old.find(&rec.device).is_none())
            .cloned()
            .map(MountEvent::Add),
    );

    events
}
