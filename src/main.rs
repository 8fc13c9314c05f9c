//! MountWatch: live view of mounted volumes and their free space.
//!
//! Thin binary entry point. All logic lives in the `mountwatch-core`
//! and `mountwatch-view` crates. Tabs are printed once at startup; each
//! later change is logged and written to stdout as one JSON line.

use anyhow::Context;
use mountwatch_view::{render, MountView, WatchPhase};

fn main() -> anyhow::Result<()> {
    // Initialise structured logging on stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("MountWatch starting");

    let watcher = mountwatch_core::new_watcher().context("failed to read the mount table")?;
    let mut view = MountView::new(watcher);
    println!("{}", render::render_tabs(view.tabs()));

    match view.start_watching() {
        Ok(()) => {}
        Err(e) if e.is_unsupported() => {
            tracing::warn!("{e}; showing the current mounts only");
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to start watching mounts"),
    }

    while view.is_active() {
        for event in view.wait_for_change(None) {
            tracing::info!("{}", render::describe(&event));
            println!("{}", render::to_json(&event)?);
        }
    }

    if view.phase() == WatchPhase::Failed {
        anyhow::bail!(
            "mount watcher stopped: {}",
            view.last_error().unwrap_or("unknown error")
        );
    }
    Ok(())
}
