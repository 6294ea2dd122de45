use thiserror::Error;

use crate::model::WorkspaceError;
use crate::sys::window_server::ServerError;

#[derive(Debug, Error)]
pub enum ReactorError {
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("Client registry rejected an update: {0}")]
    Registry(#[from] WorkspaceError),
    #[error("Event source closed without reporting an error")]
    EventSourceClosed,
}

impl ReactorError {
    /// Whether the reactor must stop. Registry errors are logic errors
    /// confined to a single event; everything else means the display server
    /// is gone.
    pub fn is_fatal(&self) -> bool { !matches!(self, ReactorError::Registry(_)) }
}
