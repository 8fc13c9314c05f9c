/// Text and JSON rendering of tabs and events for console frontends.
use crate::tabs::{MountTabs, Tab, FORM_LABELS};
use mountwatch_core::MountEvent;

/// Render one tab as a labelled form:
///
/// ```text
/// [/dev/sda1]
///   Mount Point  /
///   Device       /dev/sda1
///   ...
/// ```
pub fn render_tab(tab: &Tab) -> String {
    let width = FORM_LABELS.iter().map(|l| l.len()).max().unwrap_or(0);
    let mut out = format!("[{}]\n", tab.device);
    for (label, value) in tab.rows() {
        out.push_str(&format!("  {label:<width$}  {value}\n"));
    }
    out
}

/// Render every tab, separated by blank lines.
pub fn render_tabs(tabs: &MountTabs) -> String {
    tabs.iter().map(render_tab).collect::<Vec<_>>().join("\n")
}

/// One-line summary of an event for logs and status bars.
pub fn describe(event: &MountEvent) -> String {
    match event {
        MountEvent::Add(rec) => format!(
            "mounted {} at {} ({})",
            rec.device,
            rec.mount_point.display(),
            rec.filesystem
        ),
        MountEvent::Update(rec) => format!(
            "{} at {}: {} available of {}",
            rec.device,
            rec.mount_point.display(),
            rec.available(),
            rec.size()
        ),
        MountEvent::Remove(device) => format!("unmounted {device}"),
    }
}

/// Serialise an event as a single JSON line.
pub fn to_json(event: &MountEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

/// Serialise all tabs as a JSON array, in tab order.
pub fn tabs_to_json(tabs: &MountTabs) -> serde_json::Result<String> {
    serde_json::to_string(&tabs.iter().collect::<Vec<_>>())
}
