//! Session daemon tying a screen locker to systemd sleep handling.
//!
//! Two bus connections run from one poll loop: on the system bus the
//! daemon holds a logind sleep delay lock and locks the screen when
//! `PrepareForSleep` fires; on the session bus it serves the
//! `org.freedesktop.ScreenSaver` inhibit API so media players can keep
//! the screen from locking while they play.

use std::process;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use dbus::blocking::Connection;
use env_logger::Env;
use log::error;
use structopt::StructOpt;

use vigil_logind::Logind;

use crate::actions::CommandActions;
use crate::engine::Engine;
use crate::event_loop::Bus;
use crate::inhibit::InhibitRegistry;

mod actions;
mod engine;
mod event_loop;
mod inhibit;
mod service;
mod sleep_lock;

#[derive(Debug, StructOpt)]
#[structopt(name = "vigild")]
struct Options {
    /// Log at debug level
    #[structopt(short, long)]
    verbose: bool,
}

fn run() -> Result<()> {
    let system = Bus::new(
        Connection::new_system().context("Could not connect to system bus")?,
        "system",
    );
    let session = Bus::new(
        Connection::new_session().context("Could not connect to session bus")?,
        "session",
    );

    let registry = Arc::new(Mutex::new(InhibitRegistry::new()));
    let engine = Arc::new(Mutex::new(Engine::new(
        Box::new(CommandActions),
        registry.clone(),
    )));

    // Arm the delay lock before subscribing, so a suspend arriving between
    // the two still finds it held.
    engine
        .lock()
        .unwrap()
        .startup(&Logind::new(system.connection()));

    {
        let engine = engine.clone();
        Logind::new(system.connection())
            .on_prepare_for_sleep(move |before_sleep, logind: Logind| {
                engine
                    .lock()
                    .unwrap()
                    .handle_sleep_signal(before_sleep, &logind);
            })
            .context("Could not subscribe to sleep notifications")?;
    }

    service::serve(session.connection(), registry)?;

    event_loop::run(&system, &session, &engine)
}

fn main() {
    let options = Options::from_args();

    let default_level = if options.verbose { "debug" } else { "info" };
    let env = Env::new()
        .filter_or("VIGILD_LOG", default_level)
        .write_style("VIGILD_LOG_STYLE");
    env_logger::init_from_env(env);

    if let Err(e) = run() {
        error!("{:#}", e);
        process::exit(1);
    }
}
