//! Input focus and border colors for the current workspace.

use tracing::{debug, trace};

use crate::sys::window_server::{
    ProtocolMessage, Protocols, Result, WindowServer, WindowServerId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderColors {
    pub focused: u32,
    pub unfocused: u32,
}

#[derive(Debug, Default)]
pub struct FocusManager {
    focused: Option<WindowServerId>,
}

impl FocusManager {
    pub fn focused(&self) -> Option<WindowServerId> { self.focused }

    /// Give `target` input focus and the focused border.
    ///
    /// `visible` is the member list of the current workspace; a target outside
    /// it is ignored. `None` hands focus back to the root without touching
    /// any border.
    pub fn focus<S: WindowServer + ?Sized>(
        &mut self,
        server: &mut S,
        visible: &[WindowServerId],
        target: Option<WindowServerId>,
        colors: BorderColors,
    ) -> Result<()> {
        let Some(target) = target else {
            debug!("Focusing root");
            server.set_input_focus(None)?;
            self.focused = None;
            return Ok(());
        };
        if !visible.contains(&target) {
            trace!(?target, "Not focusing window outside the current workspace");
            return Ok(());
        }

        for &window in visible {
            server.set_border_color(window, colors.unfocused)?;
        }
        server.set_border_color(target, colors.focused)?;
        server.set_input_focus(Some(target))?;
        server.raise(target)?;
        if server.protocols(target)?.contains(Protocols::TAKE_FOCUS) {
            server.send_protocol_message(target, ProtocolMessage::TakeFocus)?;
        }
        debug!(?target, "Focused window");
        self.focused = Some(target);
        Ok(())
    }

    pub fn focus_next<S: WindowServer + ?Sized>(
        &mut self,
        server: &mut S,
        visible: &[WindowServerId],
        colors: BorderColors,
    ) -> Result<()> {
        let Some(target) = Self::neighbor(server, visible, Direction::Next)? else {
            return Ok(());
        };
        self.focus(server, visible, Some(target), colors)
    }

    pub fn focus_prev<S: WindowServer + ?Sized>(
        &mut self,
        server: &mut S,
        visible: &[WindowServerId],
        colors: BorderColors,
    ) -> Result<()> {
        let Some(target) = Self::neighbor(server, visible, Direction::Prev)? else {
            return Ok(());
        };
        self.focus(server, visible, Some(target), colors)
    }

    /// Drop a window that no longer exists. Returns whether it held focus.
    pub fn forget(&mut self, window: WindowServerId) -> bool {
        if self.focused == Some(window) {
            self.focused = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) { self.focused = None; }

    /// Cycling starts from whatever the server says is focused, so a focus
    /// change made behind our back (click-to-focus in a client) is honored.
    fn neighbor<S: WindowServer + ?Sized>(
        server: &S,
        visible: &[WindowServerId],
        direction: Direction,
    ) -> Result<Option<WindowServerId>> {
        if visible.is_empty() {
            return Ok(None);
        }
        let len = visible.len();
        let current = server.input_focus()?.and_then(|w| visible.iter().position(|&v| v == w));
        let index = match (current, direction) {
            (Some(i), Direction::Next) => (i + 1) % len,
            (Some(i), Direction::Prev) => (i + len - 1) % len,
            (None, Direction::Next) => 0,
            (None, Direction::Prev) => len - 1,
        };
        Ok(Some(visible[index]))
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Next,
    Prev,
}
