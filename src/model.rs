pub mod app_rules;
pub mod virtual_workspace;

pub use app_rules::{AppClass, AppRules, Classification};
pub use virtual_workspace::{
    Client, ClientRegistry, Removed, VirtualWorkspace, WorkspaceError, WorkspaceIndex,
};
