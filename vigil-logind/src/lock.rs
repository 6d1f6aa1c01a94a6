//! Model for logind inhibitor locks

use std::fmt;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};

use dbus::arg::OwnedFd;
use nix::unistd;

use crate::error::LogindError;

/// A category of power-state transition that an inhibitor lock applies to.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum InhibitEvent {
    Sleep,
    Shutdown,
    Idle,
}

impl InhibitEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            InhibitEvent::Sleep => "sleep",
            InhibitEvent::Shutdown => "shutdown",
            InhibitEvent::Idle => "idle",
        }
    }
}

impl fmt::Display for InhibitEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum InhibitMode {
    /// A lock which prevents the event from occurring at all.
    Block,
    /// A lock which postpones the event until released or until logind's
    /// delay timeout expires.
    Delay,
}

impl InhibitMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InhibitMode::Block => "block",
            InhibitMode::Delay => "delay",
        }
    }
}

impl fmt::Display for InhibitMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A held inhibitor lock. logind considers the lock released once the
/// backing file descriptor (and every duplicate of it) is closed, so
/// dropping this releases the lock implicitly; call [`DelayLock::release`]
/// to release it explicitly and observe close errors.
#[derive(Debug)]
pub struct DelayLock {
    fd: OwnedFd,
}

impl DelayLock {
    pub(crate) fn new(fd: OwnedFd) -> DelayLock {
        DelayLock { fd }
    }

    pub fn release(self) -> Result<(), LogindError> {
        unistd::close(self.fd.into_fd()).map_err(LogindError::release_failed)
    }
}

impl FromRawFd for DelayLock {
    /// Wraps an already-open descriptor. The lock takes ownership and
    /// closes it on release or drop.
    unsafe fn from_raw_fd(fd: RawFd) -> DelayLock {
        DelayLock::new(OwnedFd::new(fd))
    }
}

impl fmt::Display for DelayLock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.fd.as_raw_fd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_and_mode_names_match_logind() {
        assert_eq!(InhibitEvent::Sleep.as_str(), "sleep");
        assert_eq!(InhibitEvent::Shutdown.as_str(), "shutdown");
        assert_eq!(InhibitEvent::Idle.as_str(), "idle");
        assert_eq!(InhibitMode::Block.as_str(), "block");
        assert_eq!(InhibitMode::Delay.as_str(), "delay");
    }

    #[test]
    fn release_closes_the_descriptor() {
        let (read_end, write_end) = unistd::pipe().unwrap();
        unistd::close(write_end).unwrap();

        let lock = unsafe { DelayLock::from_raw_fd(read_end) };
        assert_eq!(format!("{}", lock), format!("{}", read_end));
        lock.release().unwrap();

        // The descriptor is gone, so closing it again must fail.
        assert!(unistd::close(read_end).is_err());
    }
}
