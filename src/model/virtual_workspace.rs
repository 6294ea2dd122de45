//! The client registry: which windows are managed and the order they occupy
//! in their workspace.

use thiserror::Error;
use tracing::trace;

use crate::common::collections::HashMap;
use crate::sys::window_server::WindowServerId;

pub type WorkspaceIndex = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    #[error("window {0:?} is already managed")]
    AlreadyManaged(WindowServerId),
    #[error("workspace index {0} is out of range")]
    InvalidWorkspaceIndex(WorkspaceIndex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Client {
    pub handle: WindowServerId,
    pub workspace: WorkspaceIndex,
}

/// A client that was just taken out of the registry, with the position it
/// held in its workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removed {
    pub client: Client,
    pub position: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VirtualWorkspace {
    windows: Vec<WindowServerId>,
}

impl VirtualWorkspace {
    pub fn windows(&self) -> &[WindowServerId] { &self.windows }

    pub fn position(&self, window: WindowServerId) -> Option<usize> {
        self.windows.iter().position(|&w| w == window)
    }
}

#[derive(Debug)]
pub struct ClientRegistry {
    workspaces: Vec<VirtualWorkspace>,
    window_to_workspace: HashMap<WindowServerId, WorkspaceIndex>,
}

impl ClientRegistry {
    pub fn new(workspace_count: usize) -> Self {
        Self {
            workspaces: vec![VirtualWorkspace::default(); workspace_count.max(1)],
            window_to_workspace: HashMap::default(),
        }
    }

    pub fn workspace_count(&self) -> usize { self.workspaces.len() }

    pub fn is_valid_workspace(&self, workspace: WorkspaceIndex) -> bool {
        workspace < self.workspaces.len()
    }

    /// Append `handle` to the tail of `workspace`.
    pub fn insert(
        &mut self,
        handle: WindowServerId,
        workspace: WorkspaceIndex,
    ) -> Result<(), WorkspaceError> {
        if self.window_to_workspace.contains_key(&handle) {
            return Err(WorkspaceError::AlreadyManaged(handle));
        }
        let Some(ws) = self.workspaces.get_mut(workspace) else {
            return Err(WorkspaceError::InvalidWorkspaceIndex(workspace));
        };
        ws.windows.push(handle);
        self.window_to_workspace.insert(handle, workspace);
        trace!(?handle, workspace, "Registered client");
        Ok(())
    }

    /// Forget `handle`. Absent handles are not an error since destroy and
    /// unmap notifications can arrive twice for the same window.
    pub fn remove(&mut self, handle: WindowServerId) -> Option<Removed> {
        let workspace = self.window_to_workspace.remove(&handle)?;
        let ws = &mut self.workspaces[workspace];
        let position = ws.position(handle)?;
        ws.windows.remove(position);
        trace!(?handle, workspace, position, "Unregistered client");
        Some(Removed {
            client: Client { handle, workspace },
            position,
        })
    }

    pub fn lookup(&self, handle: WindowServerId) -> Option<Client> {
        self.window_to_workspace
            .get(&handle)
            .map(|&workspace| Client { handle, workspace })
    }

    pub fn contains(&self, handle: WindowServerId) -> bool {
        self.window_to_workspace.contains_key(&handle)
    }

    /// The ordered members of `workspace`; empty for an invalid index.
    pub fn members_of(&self, workspace: WorkspaceIndex) -> &[WindowServerId] {
        self.workspaces.get(workspace).map(|ws| ws.windows()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize { self.window_to_workspace.len() }

    pub fn is_empty(&self) -> bool { self.window_to_workspace.is_empty() }

    /// Drop every client, returning them in workspace order.
    pub fn clear(&mut self) -> Vec<Client> {
        self.window_to_workspace.clear();
        self.workspaces
            .iter_mut()
            .enumerate()
            .flat_map(|(workspace, ws)| {
                std::mem::take(&mut ws.windows)
                    .into_iter()
                    .map(move |handle| Client { handle, workspace })
            })
            .collect()
    }
}
