//! Ownership of the single delay lock held against logind.

use log::{debug, error, warn};

use vigil_logind::{DelayLock, InhibitEvent, InhibitMode, Logind, LogindError};

/// Identity and justification reported to logind when taking the lock.
pub const INHIBITOR_WHO: &str = "vigild";
pub const INHIBITOR_WHY: &str = "Locking screen before sleep";

/// Where fresh delay locks come from. The daemon hands the manager the
/// live logind connection; tests substitute their own source.
pub trait LockSource {
    fn delay_lock(&self, who: &str, why: &str) -> Result<DelayLock, LogindError>;
}

impl LockSource for Logind<'_> {
    fn delay_lock(&self, who: &str, why: &str) -> Result<DelayLock, LogindError> {
        self.inhibit(InhibitEvent::Sleep, InhibitMode::Delay, who, why)
    }
}

/// Holds the one sleep delay lock this process may own. While the lock is
/// held, logind gives the daemon a bounded window to lock the screen
/// before a suspend goes through; the window closes when [`SleepLock::release`]
/// runs (or logind's delay timeout expires).
pub struct SleepLock {
    held: Option<DelayLock>,
}

impl SleepLock {
    pub fn new() -> SleepLock {
        SleepLock { held: None }
    }

    /// Asks logind for a fresh delay lock. Any lock still held is released
    /// first, so at most one is ever outstanding. On failure the manager
    /// stays unlocked and the caller decides how loudly to complain.
    pub fn acquire(&mut self, source: &dyn LockSource) -> Result<(), LogindError> {
        if self.is_held() {
            warn!("Delay lock still held while acquiring a new one, releasing the old lock");
            self.release();
        }

        let lock = source.delay_lock(INHIBITOR_WHO, INHIBITOR_WHY)?;
        debug!("Took delay lock {}", lock);
        self.held = Some(lock);
        Ok(())
    }

    /// Releases the held lock, permitting a pending suspend to proceed.
    /// Releasing with nothing held indicates a sleep notification without
    /// a matching prior acquisition; it is logged and ignored.
    pub fn release(&mut self) {
        match self.held.take() {
            Some(lock) => {
                debug!("Releasing delay lock {}", lock);
                if let Err(e) = lock.release() {
                    error!("Could not release delay lock: {}", e);
                }
            }
            None => warn!("No delay lock held, nothing to release"),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::os::unix::io::FromRawFd;

    use nix::unistd;

    use super::*;

    struct FakeLocks {
        calls: Cell<usize>,
        fail: bool,
    }

    impl FakeLocks {
        fn new(fail: bool) -> FakeLocks {
            FakeLocks {
                calls: Cell::new(0),
                fail,
            }
        }
    }

    impl LockSource for FakeLocks {
        fn delay_lock(&self, _who: &str, _why: &str) -> Result<DelayLock, LogindError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(LogindError::inhibit_failed(
                    "sleep",
                    "delay",
                    dbus::Error::new_custom("org.freedesktop.DBus.Error.Failed", "refused"),
                ));
            }

            let (read_end, write_end) = unistd::pipe().unwrap();
            unistd::close(write_end).unwrap();
            Ok(unsafe { DelayLock::from_raw_fd(read_end) })
        }
    }

    #[test]
    fn acquire_then_release() {
        let source = FakeLocks::new(false);
        let mut sleep_lock = SleepLock::new();

        sleep_lock.acquire(&source).unwrap();
        assert!(sleep_lock.is_held());

        sleep_lock.release();
        assert!(!sleep_lock.is_held());
    }

    #[test]
    fn release_without_lock_is_a_no_op() {
        let mut sleep_lock = SleepLock::new();
        sleep_lock.release();
        sleep_lock.release();
        assert!(!sleep_lock.is_held());
    }

    #[test]
    fn acquire_keeps_at_most_one_lock() {
        let source = FakeLocks::new(false);
        let mut sleep_lock = SleepLock::new();

        sleep_lock.acquire(&source).unwrap();
        sleep_lock.acquire(&source).unwrap();

        assert!(sleep_lock.is_held());
        assert_eq!(source.calls.get(), 2);

        sleep_lock.release();
        assert!(!sleep_lock.is_held());
    }

    #[test]
    fn failed_acquire_leaves_the_manager_unlocked() {
        let source = FakeLocks::new(true);
        let mut sleep_lock = SleepLock::new();

        assert!(sleep_lock.acquire(&source).is_err());
        assert!(!sleep_lock.is_held());
        assert_eq!(source.calls.get(), 1);
    }
}
