//! The `org.freedesktop.ScreenSaver` service surface.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use dbus::blocking::Connection;
use dbus::channel::MatchingReceiver;
use dbus::message::MatchRule;
use dbus_crossroads::{Crossroads, IfaceBuilder};
use log::debug;

use crate::inhibit::InhibitRegistry;

pub const SERVICE_NAME: &str = "org.freedesktop.ScreenSaver";

// Clients disagree on where the interface lives, so serve it from both
// conventional paths.
const SERVICE_PATHS: &[&str] = &["/ScreenSaver", "/org/freedesktop/ScreenSaver"];

/// Claims the well-known name and wires `Inhibit`/`UnInhibit` up to the
/// shared registry. Incoming calls are dispatched from the event loop's
/// drain of the session connection.
pub fn serve(conn: &Connection, registry: Arc<Mutex<InhibitRegistry>>) -> Result<()> {
    conn.request_name(SERVICE_NAME, false, true, false)
        .with_context(|| format!("Could not claim bus name {}", SERVICE_NAME))?;

    let mut cr = Crossroads::new();
    let iface = cr.register(
        SERVICE_NAME,
        |b: &mut IfaceBuilder<Arc<Mutex<InhibitRegistry>>>| {
            b.method(
                "Inhibit",
                ("application_name", "reason_for_inhibit"),
                ("cookie",),
                |_, registry, (application_name, reason_for_inhibit): (String, String)| {
                    let cookie = registry
                        .lock()
                        .unwrap()
                        .inhibit(&application_name, &reason_for_inhibit);
                    Ok((cookie,))
                },
            );
            b.method("UnInhibit", ("cookie",), (), |_, registry, (cookie,): (u32,)| {
                registry.lock().unwrap().uninhibit(cookie);
                Ok(())
            });
        },
    );
    for path in SERVICE_PATHS {
        cr.insert(*path, &[iface], registry.clone());
    }

    conn.start_receive(
        MatchRule::new_method_call(),
        Box::new(move |message, conn| {
            if cr.handle_message(message, conn).is_err() {
                debug!("Ignoring non-method-call message on the session bus");
            }
            true
        }),
    );
    Ok(())
}
