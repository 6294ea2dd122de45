use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use tracing::{debug, error};

/// Launches external programs on behalf of the reactor.
pub trait Launcher {
    fn spawn(&mut self, command: &str);
}

/// Runs commands through `/bin/sh -c` in their own session. The child is
/// never waited on; SIGCHLD is ignored at the process level so it is reaped
/// by the kernel.
#[derive(Debug, Default)]
pub struct ShellLauncher;

impl Launcher for ShellLauncher {
    fn spawn(&mut self, command: &str) {
        if command.trim().is_empty() {
            error!("Refusing to spawn an empty command");
            return;
        }
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // SAFETY: setsid is async-signal-safe and touches no shared state.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }
        match cmd.spawn() {
            Ok(child) => debug!(pid = child.id(), command, "Spawned"),
            Err(e) => error!("Failed to execute command {command:?}: {e:?}"),
        }
    }
}

/// Ignore SIGCHLD so spawned programs never linger as zombies.
pub fn reap_children_automatically() -> nix::Result<()> {
    use nix::sys::signal::{SigHandler, Signal, signal};
    // SAFETY: SIG_IGN installs no Rust code as a handler.
    unsafe { signal(Signal::SIGCHLD, SigHandler::SigIgn) }.map(|_| ())
}
