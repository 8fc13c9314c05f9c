/// End-to-end tests for `MountView`: the consumer side of the watcher.
///
/// A scripted watcher stands in for the platform one so every lifecycle
/// path (notification, terminal error, unsupported platform, stop) is
/// deterministic. It follows the same channel contract: rendezvous
/// channels, snapshot swapped before the notification is sent, senders
/// dropped on shutdown.
use crossbeam_channel::{bounded, Receiver, Sender};
use mountwatch_core::{Capacity, MountError, MountEvent, MountRecord, Snapshot, Watcher};
use mountwatch_view::{MountView, WatchPhase};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Senders {
    events: Sender<()>,
    errors: Sender<MountError>,
}

struct Script {
    current: Mutex<Arc<Snapshot>>,
    events: Receiver<()>,
    errors: Receiver<MountError>,
    senders: Mutex<Option<Senders>>,
    supported: bool,
}

/// Cheap handle shared between the test and the view under test.
#[derive(Clone)]
struct ScriptedWatcher(Arc<Script>);

impl ScriptedWatcher {
    fn new(initial: Snapshot, supported: bool) -> Self {
        let (events_tx, events) = bounded(0);
        let (errors_tx, errors) = bounded(0);
        Self(Arc::new(Script {
            current: Mutex::new(Arc::new(initial)),
            events,
            errors,
            senders: Mutex::new(Some(Senders {
                events: events_tx,
                errors: errors_tx,
            })),
            supported,
        }))
    }

    fn set_mounts(&self, snapshot: Snapshot) {
        *self.0.current.lock().unwrap() = Arc::new(snapshot);
    }

    /// Swap the snapshot, then hand the notification over (blocking until
    /// the view receives it) on a helper thread.
    fn change_to(&self, snapshot: Snapshot) -> thread::JoinHandle<()> {
        self.set_mounts(snapshot);
        let events = self.0.senders.lock().unwrap().as_ref().unwrap().events.clone();
        thread::spawn(move || events.send(()).unwrap())
    }

    fn fail(&self) -> thread::JoinHandle<()> {
        let senders = self.0.senders.lock().unwrap().take().unwrap();
        thread::spawn(move || {
            // Capture the whole struct so the events sender lives until the
            // error is delivered (edition 2021 closures capture fields).
            let senders = senders;
            senders
                .errors
                .send(MountError::Wait(io::Error::from(io::ErrorKind::InvalidInput)))
                .unwrap();
        })
    }
}

impl Watcher for ScriptedWatcher {
    fn mounts(&self) -> Arc<Snapshot> {
        self.0.current.lock().unwrap().clone()
    }

    fn watch(&self) -> Result<(), MountError> {
        if self.0.supported {
            Ok(())
        } else {
            Err(MountError::WatchUnsupported)
        }
    }

    fn events(&self) -> Receiver<()> {
        self.0.events.clone()
    }

    fn errors(&self) -> Receiver<MountError> {
        self.0.errors.clone()
    }

    fn stop(&self) {
        self.0.senders.lock().unwrap().take();
    }
}

fn record(device: &str, mount_point: &str) -> MountRecord {
    MountRecord {
        device: device.to_owned(),
        mount_point: PathBuf::from(mount_point),
        filesystem: "ext4".to_owned(),
        capacity: Some(Capacity {
            block_size: 4096,
            total_blocks: 262_144,
            available_blocks: 131_072,
        }),
    }
}

fn snapshot(records: &[MountRecord]) -> Snapshot {
    records.to_vec().into()
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

/// Tabs exist before watching starts.
#[test]
fn initial_tabs_come_from_the_watcher() {
    let watcher = ScriptedWatcher::new(snapshot(&[record("/dev/sda1", "/")]), true);
    let view = MountView::new(watcher.clone());

    assert_eq!(view.phase(), WatchPhase::Idle);
    assert_eq!(view.tabs().len(), 1);
    assert_eq!(view.tabs().get("/dev/sda1").unwrap().size, "1.00 GiB");
}

/// A notification is reconciled into add/update/remove tab changes.
#[test]
fn notification_updates_tabs() {
    let watcher = ScriptedWatcher::new(
        snapshot(&[record("/dev/sda1", "/"), record("/dev/sdb1", "/mnt/a")]),
        true,
    );
    let mut view = MountView::new(watcher.clone());
    view.start_watching().unwrap();
    assert!(view.is_active());

    let sender = watcher.change_to(snapshot(&[
        record("/dev/sda1", "/"),
        record("/dev/sdc1", "/media/usb"),
    ]));
    let events = view.wait_for_change(TIMEOUT);
    sender.join().unwrap();

    assert_eq!(
        events,
        vec![
            MountEvent::Remove("/dev/sdb1".to_owned()),
            MountEvent::Add(record("/dev/sdc1", "/media/usb")),
        ]
    );
    assert_eq!(
        view.tabs().devices().collect::<Vec<_>>(),
        ["/dev/sda1", "/dev/sdc1"]
    );
    assert_eq!(view.mounts().len(), 2);
}

/// The moved-mount case yields exactly one update.
#[test]
fn moved_mount_updates_its_tab() {
    let watcher = ScriptedWatcher::new(snapshot(&[record("/dev/sda1", "/mnt/a")]), true);
    let mut view = MountView::new(watcher.clone());
    view.start_watching().unwrap();

    let sender = watcher.change_to(snapshot(&[record("/dev/sda1", "/mnt/b")]));
    let events = view.wait_for_change(TIMEOUT);
    sender.join().unwrap();

    assert_eq!(events, vec![MountEvent::Update(record("/dev/sda1", "/mnt/b"))]);
    assert_eq!(view.tabs().get("/dev/sda1").unwrap().mount_point, "/mnt/b");
}

/// Non-blocking draining picks up a pending notification.
#[test]
fn process_messages_drains_without_blocking() {
    let watcher = ScriptedWatcher::new(Snapshot::default(), true);
    let mut view = MountView::new(watcher.clone());
    view.start_watching().unwrap();

    assert!(view.process_watcher_messages().is_empty());

    let sender = watcher.change_to(snapshot(&[record("/dev/sdb1", "/media/b")]));
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let mut applied = Vec::new();
    while applied.is_empty() {
        assert!(std::time::Instant::now() < deadline, "notification never drained");
        applied = view.process_watcher_messages();
        thread::sleep(Duration::from_millis(5));
    }
    sender.join().unwrap();

    assert_eq!(applied, vec![MountEvent::Add(record("/dev/sdb1", "/media/b"))]);
}

/// A terminal error flips the phase and stops further processing.
#[test]
fn error_is_terminal() {
    let watcher = ScriptedWatcher::new(snapshot(&[record("/dev/sda1", "/")]), true);
    let mut view = MountView::new(watcher.clone());
    view.start_watching().unwrap();

    let sender = watcher.fail();
    assert!(view.wait_for_change(TIMEOUT).is_empty());
    sender.join().unwrap();

    assert_eq!(view.phase(), WatchPhase::Failed);
    assert!(!view.is_active());
    assert!(view.last_error().unwrap().contains("wait"));
    assert!(view.wait_for_change(TIMEOUT).is_empty());
    assert_eq!(view.tabs().len(), 1, "tabs survive the failure");
}

/// Unsupported platforms keep their initial tabs and report the condition.
#[test]
fn unsupported_platform_keeps_initial_tabs() {
    let watcher = ScriptedWatcher::new(snapshot(&[record("C:", r"C:\")]), false);
    let mut view = MountView::new(watcher.clone());

    let err = view.start_watching().unwrap_err();
    assert!(err.is_unsupported());
    assert_eq!(view.phase(), WatchPhase::Unsupported);
    assert!(view.last_error().is_none());
    assert!(view.process_watcher_messages().is_empty());
    assert_eq!(view.tabs().len(), 1);
}

/// Manual resync reconciles against whatever the watcher holds now.
#[test]
fn resync_reconciles_without_notification() {
    let watcher = ScriptedWatcher::new(Snapshot::default(), false);
    let mut view = MountView::new(watcher.clone());

    watcher.set_mounts(snapshot(&[record("C:", r"C:\")]));
    assert_eq!(view.resync(), vec![MountEvent::Add(record("C:", r"C:\"))]);
    assert!(view.resync().is_empty());
}

/// Stopping disconnects the channels and the view notices.
#[test]
fn stop_ends_watching() {
    let watcher = ScriptedWatcher::new(Snapshot::default(), true);
    let mut view = MountView::new(watcher.clone());
    view.start_watching().unwrap();

    view.stop();
    assert_eq!(view.phase(), WatchPhase::Stopped);
    assert!(view.wait_for_change(TIMEOUT).is_empty());
}

/// Channels closing underneath the view (watcher shut down elsewhere) end
/// the watching phase.
#[test]
fn disconnect_is_observed() {
    let watcher = ScriptedWatcher::new(Snapshot::default(), true);
    let mut view = MountView::new(watcher.clone());
    view.start_watching().unwrap();

    watcher.stop();
    assert!(view.wait_for_change(TIMEOUT).is_empty());
    assert_eq!(view.phase(), WatchPhase::Stopped);
}
