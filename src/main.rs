//! rectwm - a minimal full-screen X11 window manager.
//!
//! Every mapped window is sized to cover the screen; windows form a ring
//! that the keyboard cycles through, and Mod4+drag moves the focused one.

mod bindings;
mod focus;
mod gateway;
mod registry;
mod spawn;
mod state;
mod tracing;
mod wm;

use anyhow::Result;

use bindings::KeyBindingTable;
use gateway::x11::X11Gateway;
use spawn::ProcessLauncher;
use wm::Wm;

/// Number of trace entries logged when the manager dies
const TRACE_TAIL_ON_ERROR: usize = 20;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    log::info!("Starting rectwm");

    let gateway = X11Gateway::connect()?;
    gateway.become_wm()?;
    if let Err(e) = gateway.set_root_cursor() {
        log::warn!("Failed to set root cursor: {}", e);
    }
    let existing = gateway.existing_windows()?;

    let mut wm = Wm::new(gateway, ProcessLauncher::new(), KeyBindingTable::defaults());
    wm.grab_chords()?;
    wm.adopt(&existing)?;

    if let Err(e) = wm.run() {
        log::error!("Window manager stopped: {:#}", e);
        wm.tracer().dump_tail(TRACE_TAIL_ON_ERROR);
        return Err(e);
    }

    Ok(())
}
