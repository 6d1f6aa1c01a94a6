//! Dual-connection dispatch loop.
//!
//! Single-threaded and cooperative: every iteration drains both bus
//! connections, sleeps until one of their descriptors is readable (or the
//! combined timeout elapses), then gives the engine a chance to run its
//! heartbeat. Connection errors are fatal; the caller tears everything
//! down by letting both connections drop.

use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dbus::blocking::Connection;
use log::trace;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};

use crate::engine::{Engine, HEARTBEAT_INTERVAL};

/// A bus connection participating in the loop.
pub struct Bus {
    conn: Connection,
    label: &'static str,
}

impl Bus {
    pub fn new(conn: Connection, label: &'static str) -> Bus {
        Bus { conn, label }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Handles queued messages until the connection reports none pending.
    fn drain(&self) -> Result<()> {
        while self
            .conn
            .process(Duration::from_millis(0))
            .with_context(|| format!("Could not process {} bus", self.label))?
        {}
        Ok(())
    }

    /// When this connection next wants the loop to wake up: immediately if
    /// it still has outbound traffic to flush, otherwise no opinion.
    fn next_wake(&self) -> Option<Duration> {
        if self.conn.channel().has_messages_to_send() {
            Some(Duration::from_millis(0))
        } else {
            None
        }
    }

    fn fd(&self) -> RawFd {
        self.conn.channel().watch().fd
    }
}

/// Combines both connections' wake-up requests into one poll timeout.
/// `None` means "no deadline"; the soonest request wins, and everything is
/// capped at [`HEARTBEAT_INTERVAL`] so the heartbeat runs even when both
/// buses stay silent.
pub fn poll_timeout(a: Option<Duration>, b: Option<Duration>) -> Duration {
    let soonest = match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    match soonest {
        Some(deadline) => deadline.min(HEARTBEAT_INTERVAL),
        None => HEARTBEAT_INTERVAL,
    }
}

/// Runs the dispatch loop until a bus operation fails.
pub fn run(system: &Bus, session: &Bus, engine: &Arc<Mutex<Engine>>) -> Result<()> {
    loop {
        system.drain()?;
        session.drain()?;

        let timeout = poll_timeout(system.next_wake(), session.next_wake());
        wait_readable(&[system.fd(), session.fd()], timeout)?;

        engine.lock().unwrap().tick(Instant::now());
    }
}

/// Blocks until one of the descriptors is readable or the timeout elapses.
/// An interrupted wait counts as an early wake-up.
fn wait_readable(fds: &[RawFd], timeout: Duration) -> Result<()> {
    let mut poll_fds: Vec<PollFd> = fds
        .iter()
        .map(|&fd| PollFd::new(fd, PollFlags::POLLIN))
        .collect();
    trace!("Waiting up to {:?} for bus traffic", timeout);
    match poll(&mut poll_fds, timeout.as_millis() as i32) {
        Ok(_) => Ok(()),
        Err(nix::Error::Sys(Errno::EINTR)) => Ok(()),
        Err(e) => Err(e).context("Could not wait on bus descriptors"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_request_wins() {
        let immediate = Some(Duration::from_millis(0));
        assert_eq!(poll_timeout(immediate, None), Duration::from_millis(0));
        assert_eq!(poll_timeout(None, immediate), Duration::from_millis(0));
        assert_eq!(poll_timeout(immediate, immediate), Duration::from_millis(0));
    }

    #[test]
    fn soonest_deadline_wins() {
        assert_eq!(
            poll_timeout(Some(Duration::from_secs(10)), Some(Duration::from_secs(30))),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn idle_connections_wait_one_heartbeat() {
        assert_eq!(poll_timeout(None, None), HEARTBEAT_INTERVAL);
    }

    #[test]
    fn distant_deadlines_are_clamped() {
        assert_eq!(
            poll_timeout(Some(Duration::from_secs(120)), None),
            HEARTBEAT_INTERVAL
        );
    }
}
