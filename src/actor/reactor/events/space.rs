use tracing::{debug, info};

use crate::actor::reactor::{Reactor, ReactorError};
use crate::model::WorkspaceIndex;
use crate::sys::window_server::WindowServer;

pub struct SpaceEventHandler;

impl SpaceEventHandler {
    /// Hide the current workspace and show `target`, focusing its first
    /// window. Switching to the current workspace or to one that does not
    /// exist does nothing.
    pub fn switch_workspace<S: WindowServer>(
        reactor: &mut Reactor<S>,
        target: WorkspaceIndex,
    ) -> Result<(), ReactorError> {
        if target == reactor.current_workspace {
            debug!(target, "Already on workspace");
            return Ok(());
        }
        if !reactor.registry.is_valid_workspace(target) {
            debug!(target, count = reactor.registry.workspace_count(), "No such workspace");
            return Ok(());
        }

        let outgoing = reactor.registry.members_of(reactor.current_workspace).to_vec();
        for window in outgoing {
            reactor.hide(window)?;
        }
        let previous = std::mem::replace(&mut reactor.current_workspace, target);
        info!(from = previous, to = target, "Switched workspace");

        reactor.retile()?;
        let first = reactor.registry.members_of(target).first().copied();
        reactor.focus_window(first)?;
        Ok(())
    }
}
