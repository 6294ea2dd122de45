//! The Reactor owns the engine state and applies display-server events to it.
//!
//! It is the only place where the client registry, the current workspace
//! and the focus state change. Each event is handled to completion before the
//! next one is read, and every handler leaves the displayed windows of the
//! current workspace tiled and mapped.

mod error;
mod events;
mod focus;

#[cfg(test)]
mod testing;

pub use error::ReactorError;
use events::command::CommandEventHandler;
use events::window::WindowEventHandler;
use focus::{BorderColors, FocusManager};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};

use crate::actor;
use crate::common::collections::HashMap;
use crate::common::config::Config;
use crate::layout_engine;
use crate::model::{AppRules, ClientRegistry, WorkspaceIndex};
use crate::sys::geometry::Rect;
use crate::sys::hotkey::Hotkey;
use crate::sys::process::Launcher;
use crate::sys::window_server::{ConfigureRequest, WindowServer, WindowServerId};

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A client asked to be mapped. Startup adoption of already-mapped
    /// windows goes through this event too.
    MapRequest(WindowServerId),
    /// A window was unmapped. `synthetic` is set for the client-sent
    /// notification that signals withdrawal.
    UnmapNotify {
        window: WindowServerId,
        synthetic: bool,
    },
    DestroyNotify(WindowServerId),
    ConfigureRequest(WindowServerId, ConfigureRequest),
    /// The pointer entered a window.
    EnterNotify(WindowServerId),
    /// A grabbed key combination was pressed.
    KeyChord(Hotkey),
    Command(Command),
    /// The event source failed. This is always the last event.
    ConnectionLost(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    SpawnTerminal,
    SpawnBrowser,
    SwitchWorkspace(WorkspaceIndex),
    FocusNext,
    FocusPrev,
    KillFocused,
    Quit,
    Exec(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Reactor<S: WindowServer> {
    config: Config,
    server: S,
    launcher: Box<dyn Launcher>,
    screen: Rect,
    app_rules: AppRules,
    registry: ClientRegistry,
    current_workspace: WorkspaceIndex,
    focus: FocusManager,
    /// Unmaps issued by the reactor that the server has not reported back
    /// yet. A reported unmap is only a withdrawal once this count is zero.
    pending_unmaps: HashMap<WindowServerId, u32>,
    /// Set when a retile moved windows under the pointer. The crossing the
    /// server reports for it is not a request for focus.
    suppress_enter_focus: bool,
}

impl<S: WindowServer> Reactor<S> {
    pub fn new(config: Config, server: S, launcher: Box<dyn Launcher>, screen: Rect) -> Self {
        let app_rules = AppRules::new(&config.policy);
        let registry = ClientRegistry::new(config.settings.workspace_count);
        Reactor {
            config,
            server,
            launcher,
            screen,
            app_rules,
            registry,
            current_workspace: 0,
            focus: FocusManager::default(),
            pending_unmaps: HashMap::default(),
            suppress_enter_focus: false,
        }
    }

    /// Process events until a quit command, a fatal error, or the end of the
    /// event stream. The registry is released on every exit path.
    pub fn run(&mut self, mut events: Receiver) -> Result<(), ReactorError> {
        let result = loop {
            let Some((span, event)) = events.blocking_recv() else {
                break Err(ReactorError::EventSourceClosed);
            };
            let _guard = span.enter();
            match self.handle_event(event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break Ok(()),
                Err(e) if e.is_fatal() => break Err(e),
                Err(e) => error!("{e}"),
            }
        };
        self.release_clients();
        result
    }

    fn log_event(&self, event: &Event) {
        match event {
            Event::EnterNotify(..) | Event::ConfigureRequest(..) => trace!(?event, "Event"),
            _ => debug!(?event, "Event"),
        }
    }

    #[instrument(name = "reactor::handle_event", skip(self), fields(event=?event))]
    pub fn handle_event(&mut self, event: Event) -> Result<Flow, ReactorError> {
        self.log_event(&event);
        let flow = match event {
            Event::MapRequest(window) => {
                WindowEventHandler::handle_map_request(self, window)?;
                Flow::Continue
            }
            Event::UnmapNotify { window, synthetic } => {
                WindowEventHandler::handle_unmap_notify(self, window, synthetic)?;
                Flow::Continue
            }
            Event::DestroyNotify(window) => {
                WindowEventHandler::handle_destroy_notify(self, window)?;
                Flow::Continue
            }
            Event::ConfigureRequest(window, request) => {
                WindowEventHandler::handle_configure_request(self, window, &request)?;
                Flow::Continue
            }
            Event::EnterNotify(window) => {
                WindowEventHandler::handle_enter_notify(self, window)?;
                Flow::Continue
            }
            Event::KeyChord(hotkey) => CommandEventHandler::handle_key_chord(self, &hotkey)?,
            Event::Command(command) => CommandEventHandler::handle_command(self, command)?,
            Event::ConnectionLost(reason) => {
                return Err(crate::sys::window_server::ServerError::ConnectionLost(reason).into());
            }
        };
        self.server.flush()?;
        Ok(flow)
    }

    pub fn current_workspace(&self) -> WorkspaceIndex { self.current_workspace }

    pub fn focused(&self) -> Option<WindowServerId> { self.focus.focused() }

    pub fn registry(&self) -> &ClientRegistry { &self.registry }

    /// Lay out and map every member of the current workspace.
    fn retile(&mut self) -> Result<(), ReactorError> {
        let members = self.registry.members_of(self.current_workspace);
        let border_width = self.config.settings.border_width;
        let tiles = layout_engine::calculate_columns(members, self.screen, border_width);
        trace!(workspace = self.current_workspace, count = tiles.len(), "Retiling");
        if !tiles.is_empty() {
            self.suppress_enter_focus = true;
        }
        for tile in tiles {
            self.server.move_resize(tile.window, tile.frame, border_width)?;
            self.server.map(tile.window)?;
        }
        Ok(())
    }

    /// Unmap a window and remember that the resulting notification is ours.
    fn hide(&mut self, window: WindowServerId) -> Result<(), ReactorError> {
        self.server.unmap(window)?;
        *self.pending_unmaps.entry(window).or_default() += 1;
        Ok(())
    }

    fn focus_window(&mut self, target: Option<WindowServerId>) -> Result<(), ReactorError> {
        let colors = self.border_colors();
        let visible = self.registry.members_of(self.current_workspace);
        self.focus.focus(&mut self.server, visible, target, colors)?;
        Ok(())
    }

    fn border_colors(&self) -> BorderColors {
        BorderColors {
            focused: self.config.settings.focused_border_color.0,
            unfocused: self.config.settings.unfocused_border_color.0,
        }
    }

    fn release_clients(&mut self) {
        let released = self.registry.clear();
        self.focus.clear();
        self.pending_unmaps.clear();
        info!(count = released.len(), "Released all clients");
    }
}
