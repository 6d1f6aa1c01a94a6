//! Suspend/resume orchestration and the periodic deactivate heartbeat.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::actions::Actions;
use crate::inhibit::InhibitRegistry;
use crate::sleep_lock::{LockSource, SleepLock};

/// How often the screen saver must be poked while inhibited. Doubles as
/// the upper bound on how long the event loop may sleep, so an inhibited
/// session is serviced even when both buses stay quiet.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(50);

/// Pause between a successful lock command and releasing the delay lock,
/// giving the locker time to draw before the system suspends.
const LOCK_SETTLE: Duration = Duration::from_secs(1);

/// The daemon's protocol engine: reacts to sleep/resume notifications and
/// keeps the screen saver's idle timer reset while anything inhibits.
///
/// One instance is shared (behind a mutex) between the sleep-signal
/// callback on the system bus and the event loop; nothing here blocks
/// longer than the external commands it runs.
pub struct Engine {
    actions: Box<dyn Actions + Send>,
    sleep_lock: SleepLock,
    registry: Arc<Mutex<InhibitRegistry>>,
    last_heartbeat: Instant,
}

impl Engine {
    pub fn new(actions: Box<dyn Actions + Send>, registry: Arc<Mutex<InhibitRegistry>>) -> Engine {
        Engine {
            actions,
            sleep_lock: SleepLock::new(),
            registry,
            last_heartbeat: Instant::now(),
        }
    }

    /// Takes the initial delay lock. Without it the first suspend will not
    /// wait for the locker, so failure is loud, but the daemon keeps
    /// running and recovers on the first resume.
    pub fn startup(&mut self, source: &dyn LockSource) {
        self.acquire_lock(source);
    }

    /// Dispatches one `PrepareForSleep` notification.
    pub fn handle_sleep_signal(&mut self, before_sleep: bool, source: &dyn LockSource) {
        if before_sleep {
            self.on_sleep();
        } else {
            self.on_resume(source);
        }
    }

    /// The lock action and the release must both finish before this
    /// returns: logind is waiting on the release to let the suspend
    /// proceed.
    fn on_sleep(&mut self) {
        info!("System is about to sleep, locking screen");
        if self.actions.lock_screen() {
            thread::sleep(LOCK_SETTLE);
        }
        self.sleep_lock.release();
    }

    /// Wakes the display before touching the bus again so the unlock
    /// prompt shows up without waiting on a round trip, then re-arms the
    /// delay lock for the next suspend.
    fn on_resume(&mut self, source: &dyn LockSource) {
        info!("System resumed from sleep");
        self.actions.force_display_on();
        self.actions.deactivate_screen();
        self.acquire_lock(source);
    }

    fn acquire_lock(&mut self, source: &dyn LockSource) {
        if let Err(e) = self.sleep_lock.acquire(source) {
            error!(
                "Could not take sleep delay lock, the next suspend will not wait for us: {}",
                e
            );
        }
    }

    /// Called on every event-loop wake-up. Fires the deactivate action at
    /// most once per [`HEARTBEAT_INTERVAL`] while the registry is
    /// non-empty; with no inhibitors this does nothing and the screen
    /// saver idles as usual.
    pub fn tick(&mut self, now: Instant) {
        if now.duration_since(self.last_heartbeat) < HEARTBEAT_INTERVAL {
            return;
        }
        if self.registry.lock().unwrap().is_inhibited() {
            debug!("Idle lock inhibited, resetting the screen saver timer");
            self.actions.deactivate_screen();
            self.last_heartbeat = now;
        }
    }
}
