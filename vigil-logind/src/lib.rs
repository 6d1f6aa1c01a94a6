//! Client for the `systemd-logind` sleep-inhibitor D-Bus API.
//!
//! Covers the two pieces of the
//! [logind API](https://www.freedesktop.org/wiki/Software/systemd/logind/)
//! a screen locker needs: taking inhibitor locks and hearing about
//! suspend/resume transitions.

use std::time::Duration;

use dbus::arg::OwnedFd;
use dbus::blocking::{Connection, Proxy};
use dbus::channel::MatchingReceiver;
use dbus::message::MatchRule;
use dbus::Message;
use log::warn;

pub use crate::error::LogindError;
pub use crate::lock::{DelayLock, InhibitEvent, InhibitMode};

mod error;
mod lock;

const LOGIND_BUS_NAME: &str = "org.freedesktop.login1";
const LOGIND_PATH: &str = "/org/freedesktop/login1";
const MANAGER_INTERFACE: &str = "org.freedesktop.login1.Manager";
const PREPARE_FOR_SLEEP: &str = "PrepareForSleep";

/// A logind client connection. This is a relatively thin wrapper over the
/// `org.freedesktop.login1.Manager` interface on the system bus.
pub struct Logind<'a> {
    conn: &'a Connection,
    timeout: Duration,
}

impl<'a> Logind<'a> {
    pub fn new(conn: &'a Connection) -> Logind<'a> {
        Logind {
            conn,
            timeout: Duration::from_secs(2),
        }
    }

    /// Takes an inhibitor lock for `event` on behalf of `who`, with `why`
    /// as the human-readable justification logind shows in
    /// `systemd-inhibit --list`.
    pub fn inhibit(
        &self,
        event: InhibitEvent,
        mode: InhibitMode,
        who: &str,
        why: &str,
    ) -> Result<DelayLock, LogindError> {
        let (fd,): (OwnedFd,) = self
            .manager()
            .method_call(
                MANAGER_INTERFACE,
                "Inhibit",
                (event.as_str(), who, why, mode.as_str()),
            )
            .map_err(|e| LogindError::inhibit_failed(event.as_str(), mode.as_str(), e))?;
        Ok(DelayLock::new(fd))
    }

    /// Subscribes to the `PrepareForSleep` signal. The callback receives
    /// `true` right before the system suspends and `false` once it has
    /// resumed, along with a logind handle on the same connection.
    ///
    /// A signal whose body is not a single boolean is logged and dropped
    /// without reaching the callback; other subscribers on the bus are
    /// unaffected either way.
    pub fn on_prepare_for_sleep<F>(&self, mut callback: F) -> Result<(), LogindError>
    where
        F: FnMut(bool, Logind) + Send + 'static,
    {
        let rule = MatchRule::new_signal(MANAGER_INTERFACE, PREPARE_FOR_SLEEP);
        self.conn
            .add_match_no_cb(&rule.match_str())
            .map_err(|e| LogindError::match_failed(PREPARE_FOR_SLEEP, e))?;
        self.conn.start_receive(
            rule,
            Box::new(move |msg: Message, conn: &Connection| {
                match msg.read1::<bool>() {
                    Ok(before_sleep) => callback(before_sleep, Logind::new(conn)),
                    Err(e) => warn!("Ignoring malformed {} signal: {}", PREPARE_FOR_SLEEP, e),
                }
                true
            }),
        );
        Ok(())
    }

    fn manager(&self) -> Proxy<'_, &'a Connection> {
        Proxy::new(LOGIND_BUS_NAME, LOGIND_PATH, self.timeout, self.conn)
    }
}
