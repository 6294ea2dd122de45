use tracing::{debug, info, trace, warn};

use crate::actor::reactor::events::space::SpaceEventHandler;
use crate::actor::reactor::{Reactor, ReactorError};
use crate::model::Classification;
use crate::sys::window_server::{ConfigureRequest, WindowServer, WindowServerId};

pub struct WindowEventHandler;

impl WindowEventHandler {
    pub fn handle_map_request<S: WindowServer>(
        reactor: &mut Reactor<S>,
        window: WindowServerId,
    ) -> Result<(), ReactorError> {
        if reactor.registry.contains(window) {
            debug!(?window, "Ignoring map request for a managed window");
            return Ok(());
        }

        let (class, workspace) = match reactor.app_rules.classify_window(&reactor.server, window)? {
            Classification::Managed { class, workspace } => (class, workspace),
            Classification::Reject => {
                info!(?window, "Killing window that is not allowed on screen");
                reactor.server.kill_client(window)?;
                return Ok(());
            }
        };
        let workspace = if reactor.registry.is_valid_workspace(workspace) {
            workspace
        } else {
            warn!(?window, workspace, "Rule names a missing workspace; using the current one");
            reactor.current_workspace
        };

        reactor.registry.insert(window, workspace)?;
        reactor.server.select_client_events(window)?;
        info!(?window, ?class, workspace, "Managing window");

        if workspace == reactor.current_workspace {
            reactor.retile()?;
            reactor.focus_window(Some(window))?;
        } else if reactor.config.settings.auto_switch_on_map {
            SpaceEventHandler::switch_workspace(reactor, workspace)?;
            reactor.focus_window(Some(window))?;
        } else {
            debug!(?window, workspace, "Window stays hidden until its workspace is shown");
            if reactor.server.is_mapped(window)? {
                reactor.hide(window)?;
            }
        }
        Ok(())
    }

    pub fn handle_unmap_notify<S: WindowServer>(
        reactor: &mut Reactor<S>,
        window: WindowServerId,
        synthetic: bool,
    ) -> Result<(), ReactorError> {
        if !synthetic {
            if let Some(pending) = reactor.pending_unmaps.get_mut(&window) {
                *pending -= 1;
                if *pending == 0 {
                    reactor.pending_unmaps.remove(&window);
                }
                trace!(?window, "Unmap was ours");
                return Ok(());
            }
        }
        Self::unmanage(reactor, window)
    }

    pub fn handle_destroy_notify<S: WindowServer>(
        reactor: &mut Reactor<S>,
        window: WindowServerId,
    ) -> Result<(), ReactorError> {
        Self::unmanage(reactor, window)
    }

    /// Client-initiated geometry changes are granted as asked, with our
    /// border width. The next retile overrides them for managed windows.
    pub fn handle_configure_request<S: WindowServer>(
        reactor: &mut Reactor<S>,
        window: WindowServerId,
        request: &ConfigureRequest,
    ) -> Result<(), ReactorError> {
        reactor.server.configure(window, request, reactor.config.settings.border_width)?;
        Ok(())
    }

    pub fn handle_enter_notify<S: WindowServer>(
        reactor: &mut Reactor<S>,
        window: WindowServerId,
    ) -> Result<(), ReactorError> {
        if std::mem::take(&mut reactor.suppress_enter_focus) {
            trace!(?window, "Ignoring crossing caused by a retile");
            return Ok(());
        }
        if !reactor.config.settings.focus_follows_mouse || reactor.focused() == Some(window) {
            return Ok(());
        }
        let visible =
            reactor.registry.lookup(window).is_some_and(|c| c.workspace == reactor.current_workspace);
        if visible {
            reactor.focus_window(Some(window))?;
        }
        Ok(())
    }

    fn unmanage<S: WindowServer>(
        reactor: &mut Reactor<S>,
        window: WindowServerId,
    ) -> Result<(), ReactorError> {
        reactor.pending_unmaps.remove(&window);
        let Some(removed) = reactor.registry.remove(window) else {
            trace!(?window, "Window was not managed");
            return Ok(());
        };
        info!(?window, workspace = removed.client.workspace, "Window withdrawn");
        let was_focused = reactor.focus.forget(window);
        if removed.client.workspace != reactor.current_workspace {
            return Ok(());
        }

        reactor.retile()?;
        if was_focused {
            let members = reactor.registry.members_of(reactor.current_workspace);
            let successor = members.get(removed.position).or(members.last()).copied();
            reactor.focus_window(successor)?;
        }
        Ok(())
    }
}
