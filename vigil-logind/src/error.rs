//! Logind error type

use dbus::Error as DBusError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogindError {
    #[error("Could not take {mode} inhibitor lock for {what}")]
    InhibitFailed {
        what: &'static str,
        mode: &'static str,
        #[source]
        source: DBusError,
    },

    #[error("Could not subscribe to {signal}")]
    MatchFailed {
        signal: &'static str,
        #[source]
        source: DBusError,
    },

    #[error("Could not release inhibitor lock")]
    ReleaseFailed {
        #[source]
        source: nix::Error,
    },
}

impl LogindError {
    pub fn inhibit_failed(what: &'static str, mode: &'static str, error: DBusError) -> LogindError {
        LogindError::InhibitFailed {
            what,
            mode,
            source: error,
        }
    }

    pub fn match_failed(signal: &'static str, error: DBusError) -> LogindError {
        LogindError::MatchFailed {
            signal,
            source: error,
        }
    }

    pub fn release_failed(error: nix::Error) -> LogindError {
        LogindError::ReleaseFailed { source: error }
    }
}
