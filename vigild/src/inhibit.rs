//! Bookkeeping for active screen-saver inhibitions.

use std::collections::HashMap;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

/// One active inhibition, keyed in the registry by the cookie handed back
/// to the caller.
#[derive(Debug)]
struct Inhibition {
    application: String,
    reason: String,
}

/// In-memory set of active "please don't idle-lock" requests.
///
/// Cookies are random 32-bit values, unique among the currently active
/// set. Callers are trusted: any client on the session bus may cancel any
/// cookie, and a client that exits without calling `UnInhibit` leaves its
/// inhibition in place for the rest of the daemon's lifetime.
pub struct InhibitRegistry {
    active: HashMap<u32, Inhibition>,
    fallback_rng: Option<StdRng>,
}

impl InhibitRegistry {
    pub fn new() -> InhibitRegistry {
        InhibitRegistry {
            active: HashMap::new(),
            fallback_rng: None,
        }
    }

    /// Registers a new inhibition and returns its cookie. Never fails; no
    /// limit is placed on how many inhibitions a caller may stack up.
    pub fn inhibit(&mut self, application: &str, reason: &str) -> u32 {
        let cookie = self.fresh_cookie();
        self.active.insert(
            cookie,
            Inhibition {
                application: application.to_string(),
                reason: reason.to_string(),
            },
        );
        info!(
            "Inhibiting idle lock for {} ({}), cookie {}, {} active",
            application,
            reason,
            cookie,
            self.count()
        );
        cookie
    }

    /// Drops the inhibition behind `cookie`. Unknown cookies are ignored;
    /// callers may retry or race their own cancellations.
    pub fn uninhibit(&mut self, cookie: u32) {
        match self.active.remove(&cookie) {
            Some(inhibition) => info!(
                "Uninhibited {} ({}), cookie {}, {} active",
                inhibition.application,
                inhibition.reason,
                cookie,
                self.count()
            ),
            None => warn!("UnInhibit for unknown cookie {}, ignoring", cookie),
        }
    }

    pub fn count(&self) -> usize {
        self.active.len()
    }

    pub fn is_inhibited(&self) -> bool {
        !self.active.is_empty()
    }

    /// Allocates a cookie no active inhibition is using.
    fn fresh_cookie(&mut self) -> u32 {
        loop {
            let cookie = self.random_u32();
            if !self.active.contains_key(&cookie) {
                return cookie;
            }
        }
    }

    fn random_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        match OsRng.try_fill_bytes(&mut bytes) {
            Ok(()) => u32::from_ne_bytes(bytes),
            Err(e) => {
                warn!("No entropy for cookie, using seeded generator: {}", e);
                self.fallback_rng().next_u32()
            }
        }
    }

    fn fallback_rng(&mut self) -> &mut StdRng {
        self.fallback_rng.get_or_insert_with(|| {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            StdRng::seed_from_u64(u64::from(process::id()) ^ nanos)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inhibit_returns_distinct_cookies() {
        let mut registry = InhibitRegistry::new();

        let first = registry.inhibit("vlc", "video");
        let second = registry.inhibit("firefox", "video");

        assert_ne!(first, second);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn uninhibit_matches_by_cookie_and_is_idempotent() {
        let mut registry = InhibitRegistry::new();

        let first = registry.inhibit("vlc", "video");
        let second = registry.inhibit("firefox", "video");
        assert_eq!(registry.count(), 2);

        registry.uninhibit(first);
        assert_eq!(registry.count(), 1);

        // A second cancellation of the same cookie changes nothing.
        registry.uninhibit(first);
        assert_eq!(registry.count(), 1);

        registry.uninhibit(second);
        assert_eq!(registry.count(), 0);
        assert!(!registry.is_inhibited());
    }

    #[test]
    fn uninhibit_unknown_cookie_is_a_no_op() {
        let mut registry = InhibitRegistry::new();

        let cookie = registry.inhibit("vlc", "video");
        registry.uninhibit(cookie.wrapping_add(1));

        assert_eq!(registry.count(), 1);
        assert!(registry.is_inhibited());
    }

    #[test]
    fn count_stays_balanced_over_many_requests() {
        let mut registry = InhibitRegistry::new();

        let cookies: Vec<u32> = (0..100)
            .map(|i| registry.inhibit("app", &format!("reason {}", i)))
            .collect();
        assert_eq!(registry.count(), 100);

        for cookie in &cookies {
            registry.uninhibit(*cookie);
        }
        assert_eq!(registry.count(), 0);

        // Draining an already-empty registry cannot go negative.
        registry.uninhibit(cookies[0]);
        assert_eq!(registry.count(), 0);
    }
}
