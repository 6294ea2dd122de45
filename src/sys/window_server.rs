//! The seam between the reactor and the display server.
//!
//! Every request here may target a window the server has already destroyed.
//! Implementations swallow those failures: queries come back empty and void
//! requests are dropped. The only error that crosses this boundary is the
//! loss of the connection itself.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::Rect;

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct WindowServerId(pub u32);

impl WindowServerId {
    #[inline]
    pub fn new(id: u32) -> Self { Self(id) }

    #[inline]
    pub fn as_u32(self) -> u32 { self.0 }
}

impl From<WindowServerId> for u32 {
    #[inline]
    fn from(id: WindowServerId) -> Self { id.0 }
}

impl fmt::Debug for WindowServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "0x{:x}", self.0) }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("connection to the display server was lost: {0}")]
    ConnectionLost(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// The two strings of `WM_CLASS`. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassHint {
    pub res_name: Option<String>,
    pub res_class: Option<String>,
}

bitflags! {
    /// The subset of `WM_PROTOCOLS` the engine cares about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Protocols: u8 {
        const TAKE_FOCUS = 0b01;
        const DELETE_WINDOW = 0b10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMessage {
    TakeFocus,
    DeleteWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackMode {
    Above,
    Below,
    TopIf,
    BottomIf,
    Opposite,
}

/// The fields a client asked to change in a ConfigureRequest. Fields the
/// client did not set are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureRequest {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sibling: Option<WindowServerId>,
    pub stack_mode: Option<StackMode>,
}

pub trait WindowServer {
    fn class_hint(&self, window: WindowServerId) -> Result<Option<ClassHint>>;

    fn protocols(&self, window: WindowServerId) -> Result<Protocols>;

    /// The window currently holding input focus, if it is a real window.
    fn input_focus(&self) -> Result<Option<WindowServerId>>;

    /// Whether the window is currently mapped. Only windows adopted at
    /// startup can be mapped before we manage them.
    fn is_mapped(&self, window: WindowServerId) -> Result<bool>;

    /// Subscribe to the per-client events the reactor relies on.
    fn select_client_events(&mut self, window: WindowServerId) -> Result<()>;

    fn map(&mut self, window: WindowServerId) -> Result<()>;

    fn unmap(&mut self, window: WindowServerId) -> Result<()>;

    fn raise(&mut self, window: WindowServerId) -> Result<()>;

    fn move_resize(
        &mut self,
        window: WindowServerId,
        frame: Rect,
        border_width: u32,
    ) -> Result<()>;

    fn configure(
        &mut self,
        window: WindowServerId,
        request: &ConfigureRequest,
        border_width: u32,
    ) -> Result<()>;

    fn set_border_color(&mut self, window: WindowServerId, color: u32) -> Result<()>;

    /// Assign input focus. `None` returns focus to the root.
    fn set_input_focus(&mut self, window: Option<WindowServerId>) -> Result<()>;

    fn send_protocol_message(
        &mut self,
        window: WindowServerId,
        message: ProtocolMessage,
    ) -> Result<()>;

    fn kill_client(&mut self, window: WindowServerId) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}
