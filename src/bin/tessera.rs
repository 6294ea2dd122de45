use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tessera_wm::actor::reactor::{self, Reactor};
use tessera_wm::common::config::Config;
use tessera_wm::common::log;
use tessera_wm::sys::process::{Launcher, ShellLauncher, reap_children_automatically};
use tessera_wm::sys::x11::Session;
use tracing::{error, info, warn};

#[derive(Parser)]
struct Cli {
    /// Read configuration from this file instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Check the configuration and exit without connecting to the X server.
    #[arg(long)]
    validate: bool,

    /// Switch to a window's workspace when it maps on a hidden one.
    #[arg(long)]
    auto_switch: bool,

    /// Only change focus on hotkeys and new windows.
    #[arg(long)]
    no_focus_follows_mouse: bool,
}

fn main() -> ExitCode {
    let opt: Cli = Parser::parse();

    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // SAFETY: We are single threaded at this point.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    log::init_logging();
    install_panic_hook();

    match run(opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(opt: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(opt.config.as_deref())?;
    config.settings.auto_switch_on_map |= opt.auto_switch;
    config.settings.focus_follows_mouse &= !opt.no_focus_follows_mouse;

    let issues = config.validate();
    for issue in &issues {
        warn!("Config: {issue}");
    }
    if opt.validate {
        if issues.is_empty() {
            println!("Configuration is valid");
            return Ok(());
        }
        anyhow::bail!("{} configuration issue(s) found", issues.len());
    }
    let fixes = config.auto_fix_values();
    if fixes > 0 {
        warn!(fixes, "Adjusted out-of-range config values");
    }

    reap_children_automatically().context("Could not ignore SIGCHLD")?;
    let session = Session::connect()?;

    let (events_tx, events_rx) = tessera_wm::actor::channel();
    // Adopted windows are queued before the pump starts so they are managed
    // ahead of any live event.
    for window in session.existing_windows()? {
        events_tx.send(reactor::Event::MapRequest(window));
    }
    let hotkeys = config.keys.iter().map(|(hotkey, _)| *hotkey).collect();
    session
        .event_pump(hotkeys, events_tx)?
        .spawn()
        .context("Could not start the event thread")?;

    let mut launcher = ShellLauncher;
    for command in &config.settings.run_on_start {
        launcher.spawn(command);
    }

    let mut reactor = Reactor::new(config, session.server(), Box::new(launcher), session.screen);
    reactor.run(events_rx)?;
    info!("Exiting");
    Ok(())
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // A panic on the event thread must take the whole process down.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
