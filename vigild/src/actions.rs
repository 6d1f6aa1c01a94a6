//! External screen-control commands.

use std::process::Command;

use log::{debug, warn};

// xscreensaver owns the actual locking; the daemon only tells it when.
const LOCK_COMMAND: &[&str] = &["xscreensaver-command", "-lock"];
const DEACTIVATE_COMMAND: &[&str] = &["xscreensaver-command", "-deactivate"];
const DISPLAY_ON_COMMAND: &[&str] = &["xset", "dpms", "force", "on"];

/// The three screen-control actions the engine can fire. Each runs to
/// completion before returning; the exit status is only interesting for
/// logging, so failures never propagate.
pub trait Actions {
    /// Tells the screen saver to lock now. Returns whether the command
    /// ran and exited cleanly.
    fn lock_screen(&mut self) -> bool;

    /// Forces the unlock prompt up / resets the screen saver's idle timer.
    fn deactivate_screen(&mut self);

    /// Powers the display back on after a resume.
    fn force_display_on(&mut self);
}

/// Runs the real commands as blocking child processes.
pub struct CommandActions;

impl Actions for CommandActions {
    fn lock_screen(&mut self) -> bool {
        run_command(LOCK_COMMAND)
    }

    fn deactivate_screen(&mut self) {
        run_command(DEACTIVATE_COMMAND);
    }

    fn force_display_on(&mut self) {
        run_command(DISPLAY_ON_COMMAND);
    }
}

fn run_command(argv: &[&str]) -> bool {
    debug!("Running {:?}", argv);
    match Command::new(argv[0]).args(&argv[1..]).status() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!("{} exited with {}", argv[0], status);
            false
        }
        Err(e) => {
            warn!("Could not run {}: {}", argv[0], e);
            false
        }
    }
}
