use tracing::{debug, info};

use crate::actor::reactor::events::space::SpaceEventHandler;
use crate::actor::reactor::{Command, Flow, Reactor, ReactorError};
use crate::sys::hotkey::Hotkey;
use crate::sys::window_server::{ProtocolMessage, Protocols, WindowServer};

pub struct CommandEventHandler;

impl CommandEventHandler {
    pub fn handle_key_chord<S: WindowServer>(
        reactor: &mut Reactor<S>,
        hotkey: &Hotkey,
    ) -> Result<Flow, ReactorError> {
        let Some(command) = reactor.config.command_for(hotkey).cloned() else {
            debug!(%hotkey, "No command bound");
            return Ok(Flow::Continue);
        };
        Self::handle_command(reactor, command)
    }

    pub fn handle_command<S: WindowServer>(
        reactor: &mut Reactor<S>,
        command: Command,
    ) -> Result<Flow, ReactorError> {
        info!(?command);
        match command {
            Command::SpawnTerminal => {
                let terminal = reactor.config.settings.terminal.clone();
                reactor.launcher.spawn(&terminal);
            }
            Command::SpawnBrowser => {
                let browser = reactor.config.settings.browser.clone();
                reactor.launcher.spawn(&browser);
            }
            Command::Exec(cmd) => reactor.launcher.spawn(&cmd),
            Command::SwitchWorkspace(target) => {
                SpaceEventHandler::switch_workspace(reactor, target)?;
            }
            Command::FocusNext => {
                let colors = reactor.border_colors();
                let visible = reactor.registry.members_of(reactor.current_workspace);
                reactor.focus.focus_next(&mut reactor.server, visible, colors)?;
            }
            Command::FocusPrev => {
                let colors = reactor.border_colors();
                let visible = reactor.registry.members_of(reactor.current_workspace);
                reactor.focus.focus_prev(&mut reactor.server, visible, colors)?;
            }
            Command::KillFocused => Self::kill_focused(reactor)?,
            Command::Quit => {
                info!("Quit requested");
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Ask the focused client to close, or disconnect it if it does not
    /// speak WM_DELETE_WINDOW. The registry is updated when the server
    /// reports the window gone.
    fn kill_focused<S: WindowServer>(reactor: &mut Reactor<S>) -> Result<(), ReactorError> {
        let Some(window) = reactor.focused() else {
            debug!("Nothing focused");
            return Ok(());
        };
        if reactor.server.protocols(window)?.contains(Protocols::DELETE_WINDOW) {
            reactor.server.send_protocol_message(window, ProtocolMessage::DeleteWindow)?;
        } else {
            reactor.server.kill_client(window)?;
        }
        Ok(())
    }
}
