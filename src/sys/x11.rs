//! The X11 side of the engine: the `WindowServer` implementation the reactor
//! drives, and the thread that turns X events into reactor events.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use tracing::{debug, error, info, trace, warn};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::Event as XEvent;
use x11rb::protocol::xproto::{
    self, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConfigWindow,
    ConfigureWindowAux, ConnectionExt as _, EventMask, GrabMode, InputFocus, MapState, Mapping,
    ModMask, NotifyDetail, NotifyMode, Window,
};
use x11rb::rust_connection::RustConnection;
use x11rb::{CURRENT_TIME, NONE};

use super::geometry::Rect;
use super::hotkey::{Hotkey, KeyCode, Modifiers};
use super::window_server::{
    self, ClassHint, ConfigureRequest, ProtocolMessage, Protocols, ServerError, StackMode,
    WindowServer, WindowServerId,
};
use crate::actor::reactor::{self, Event};

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        WM_TAKE_FOCUS,
    }
}

/// `PointerRoot` as a focus window, see `SetInputFocus`.
const POINTER_ROOT: Window = 1;
const SYNTHETIC_EVENT_BIT: u8 = 0x80;

fn lost(e: ConnectionError) -> ServerError { ServerError::ConnectionLost(e.to_string()) }

/// Requests on a window that died are answered with an X error. Those are
/// expected and turn into `None`; only a broken connection is an error.
fn tolerate<T>(result: Result<T, ReplyError>) -> window_server::Result<Option<T>> {
    match result {
        Ok(reply) => Ok(Some(reply)),
        Err(ReplyError::X11Error(e)) => {
            trace!(?e, "Ignoring X11 error");
            Ok(None)
        }
        Err(ReplyError::ConnectionError(e)) => Err(lost(e)),
    }
}

/// Void requests are not checked. Their errors come back as events and are
/// logged by the event pump.
fn sent<C>(result: Result<C, ConnectionError>) -> window_server::Result<()> {
    result.map(drop).map_err(lost)
}

/// A connection on which we are the window manager.
pub struct Session {
    pub conn: Arc<RustConnection>,
    pub root: Window,
    pub screen: Rect,
    pub atoms: Atoms,
}

impl Session {
    pub fn connect() -> anyhow::Result<Session> {
        let (conn, screen_num) = x11rb::connect(None).context("Could not connect to the X server")?;
        let (root, screen) = {
            let screen = &conn.setup().roots[screen_num];
            let rect = Rect::new(
                0,
                0,
                screen.width_in_pixels.into(),
                screen.height_in_pixels.into(),
            );
            (screen.root, rect)
        };

        // Only one client may select SubstructureRedirect on the root.
        let mask = EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY;
        conn.change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(mask))?
            .check()
            .context("Another window manager is already running")?;
        let atoms = Atoms::new(&conn)?.reply()?;
        info!(root, ?screen, "Connected to the X server");

        Ok(Session { conn: Arc::new(conn), root, screen, atoms })
    }

    /// Mapped top-level windows that existed before we started. They are
    /// managed the same way as newly mapped windows.
    pub fn existing_windows(&self) -> anyhow::Result<Vec<WindowServerId>> {
        let tree = self.conn.query_tree(self.root)?.reply()?;
        let mut windows = Vec::new();
        for window in tree.children {
            let attrs = match self.conn.get_window_attributes(window)?.reply() {
                Ok(attrs) => attrs,
                Err(ReplyError::X11Error(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            if !attrs.override_redirect && attrs.map_state == MapState::VIEWABLE {
                windows.push(WindowServerId::new(window));
            }
        }
        debug!(count = windows.len(), "Found existing windows");
        Ok(windows)
    }

    pub fn server(&self) -> X11Server {
        X11Server {
            conn: self.conn.clone(),
            root: self.root,
            atoms: self.atoms,
        }
    }

    /// Load the keyboard mapping and grab `hotkeys` on the root window.
    pub fn event_pump(
        &self,
        hotkeys: Vec<Hotkey>,
        events_tx: reactor::Sender,
    ) -> anyhow::Result<EventPump> {
        let keymap = Keymap::load(&self.conn).context("Could not read the keyboard mapping")?;
        grab_keys(&self.conn, self.root, &keymap, &hotkeys)?;
        Ok(EventPump {
            conn: self.conn.clone(),
            root: self.root,
            keymap,
            hotkeys,
            events_tx,
        })
    }
}

pub struct X11Server {
    conn: Arc<RustConnection>,
    root: Window,
    atoms: Atoms,
}

impl WindowServer for X11Server {
    fn class_hint(&self, window: WindowServerId) -> window_server::Result<Option<ClassHint>> {
        let cookie = self
            .conn
            .get_property(false, window.as_u32(), AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)
            .map_err(lost)?;
        Ok(tolerate(cookie.reply())?.and_then(|reply| parse_wm_class(&reply.value)))
    }

    fn protocols(&self, window: WindowServerId) -> window_server::Result<Protocols> {
        let cookie = self
            .conn
            .get_property(false, window.as_u32(), self.atoms.WM_PROTOCOLS, AtomEnum::ATOM, 0, 64)
            .map_err(lost)?;
        let Some(reply) = tolerate(cookie.reply())? else {
            return Ok(Protocols::empty());
        };
        let mut protocols = Protocols::empty();
        for atom in reply.value32().into_iter().flatten() {
            if atom == self.atoms.WM_TAKE_FOCUS {
                protocols |= Protocols::TAKE_FOCUS;
            } else if atom == self.atoms.WM_DELETE_WINDOW {
                protocols |= Protocols::DELETE_WINDOW;
            }
        }
        Ok(protocols)
    }

    fn input_focus(&self) -> window_server::Result<Option<WindowServerId>> {
        let cookie = self.conn.get_input_focus().map_err(lost)?;
        let focus = tolerate(cookie.reply())?.map(|reply| reply.focus);
        let Some(mut window) = focus.filter(|&w| w != NONE && w != POINTER_ROOT && w != self.root)
        else {
            return Ok(None);
        };
        // Clients may focus one of their own subwindows. Walk up to the
        // child of the root, which is what we manage.
        loop {
            let cookie = self.conn.query_tree(window).map_err(lost)?;
            let Some(tree) = tolerate(cookie.reply())? else {
                return Ok(None);
            };
            if tree.parent == self.root || tree.parent == NONE {
                return Ok(Some(WindowServerId::new(window)));
            }
            window = tree.parent;
        }
    }

    fn is_mapped(&self, window: WindowServerId) -> window_server::Result<bool> {
        let cookie = self.conn.get_window_attributes(window.as_u32()).map_err(lost)?;
        Ok(tolerate(cookie.reply())?.is_some_and(|attrs| attrs.map_state != MapState::UNMAPPED))
    }

    fn select_client_events(&mut self, window: WindowServerId) -> window_server::Result<()> {
        let mask = EventMask::ENTER_WINDOW | EventMask::PROPERTY_CHANGE;
        sent(self.conn.change_window_attributes(
            window.as_u32(),
            &ChangeWindowAttributesAux::new().event_mask(mask),
        ))
    }

    fn map(&mut self, window: WindowServerId) -> window_server::Result<()> {
        sent(self.conn.map_window(window.as_u32()))
    }

    fn unmap(&mut self, window: WindowServerId) -> window_server::Result<()> {
        sent(self.conn.unmap_window(window.as_u32()))
    }

    fn raise(&mut self, window: WindowServerId) -> window_server::Result<()> {
        let aux = ConfigureWindowAux::new().stack_mode(xproto::StackMode::ABOVE);
        sent(self.conn.configure_window(window.as_u32(), &aux))
    }

    fn move_resize(
        &mut self,
        window: WindowServerId,
        frame: Rect,
        border_width: u32,
    ) -> window_server::Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(frame.x)
            .y(frame.y)
            .width(frame.width)
            .height(frame.height)
            .border_width(border_width);
        sent(self.conn.configure_window(window.as_u32(), &aux))
    }

    fn configure(
        &mut self,
        window: WindowServerId,
        request: &ConfigureRequest,
        border_width: u32,
    ) -> window_server::Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(request.x)
            .y(request.y)
            .width(request.width)
            .height(request.height)
            .sibling(request.sibling.map(WindowServerId::as_u32))
            .stack_mode(request.stack_mode.map(to_x_stack_mode))
            .border_width(border_width);
        sent(self.conn.configure_window(window.as_u32(), &aux))
    }

    fn set_border_color(&mut self, window: WindowServerId, color: u32) -> window_server::Result<()> {
        sent(self.conn.change_window_attributes(
            window.as_u32(),
            &ChangeWindowAttributesAux::new().border_pixel(color),
        ))
    }

    fn set_input_focus(&mut self, window: Option<WindowServerId>) -> window_server::Result<()> {
        let target = window.map_or(self.root, WindowServerId::as_u32);
        sent(self.conn.set_input_focus(InputFocus::POINTER_ROOT, target, CURRENT_TIME))
    }

    fn send_protocol_message(
        &mut self,
        window: WindowServerId,
        message: ProtocolMessage,
    ) -> window_server::Result<()> {
        let protocol = match message {
            ProtocolMessage::TakeFocus => self.atoms.WM_TAKE_FOCUS,
            ProtocolMessage::DeleteWindow => self.atoms.WM_DELETE_WINDOW,
        };
        let event = ClientMessageEvent::new(32, window.as_u32(), self.atoms.WM_PROTOCOLS, [
            protocol,
            CURRENT_TIME,
            0,
            0,
            0,
        ]);
        sent(self.conn.send_event(false, window.as_u32(), EventMask::NO_EVENT, event))
    }

    fn kill_client(&mut self, window: WindowServerId) -> window_server::Result<()> {
        sent(self.conn.kill_client(window.as_u32()))
    }

    fn flush(&mut self) -> window_server::Result<()> { self.conn.flush().map_err(lost) }
}

/// `WM_CLASS` is two NUL-terminated strings: instance name, then class.
fn parse_wm_class(value: &[u8]) -> Option<ClassHint> {
    if value.is_empty() {
        return None;
    }
    let mut parts = value
        .split(|&b| b == 0)
        .map(|s| (!s.is_empty()).then(|| String::from_utf8_lossy(s).into_owned()));
    let res_name = parts.next().flatten();
    let res_class = parts.next().flatten();
    Some(ClassHint { res_name, res_class })
}

fn to_x_stack_mode(mode: StackMode) -> xproto::StackMode {
    match mode {
        StackMode::Above => xproto::StackMode::ABOVE,
        StackMode::Below => xproto::StackMode::BELOW,
        StackMode::TopIf => xproto::StackMode::TOP_IF,
        StackMode::BottomIf => xproto::StackMode::BOTTOM_IF,
        StackMode::Opposite => xproto::StackMode::OPPOSITE,
    }
}

fn from_x_stack_mode(mode: xproto::StackMode) -> Option<StackMode> {
    Some(match mode {
        xproto::StackMode::ABOVE => StackMode::Above,
        xproto::StackMode::BELOW => StackMode::Below,
        xproto::StackMode::TOP_IF => StackMode::TopIf,
        xproto::StackMode::BOTTOM_IF => StackMode::BottomIf,
        xproto::StackMode::OPPOSITE => StackMode::Opposite,
        _ => return None,
    })
}

/// Keycode to keysym table, first column only.
#[derive(Debug, Clone)]
pub struct Keymap {
    min_keycode: u8,
    keysyms_per_keycode: usize,
    keysyms: Vec<u32>,
}

impl Keymap {
    pub fn load(conn: &RustConnection) -> Result<Keymap, ReplyError> {
        let setup = conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = conn.get_keyboard_mapping(min, max - min + 1)?.reply()?;
        Ok(Keymap {
            min_keycode: min,
            keysyms_per_keycode: reply.keysyms_per_keycode.into(),
            keysyms: reply.keysyms,
        })
    }

    fn rows(&self) -> impl Iterator<Item = (u8, &[u32])> {
        let per = self.keysyms_per_keycode.max(1);
        self.keysyms
            .chunks(per)
            .enumerate()
            .map(move |(i, row)| (self.min_keycode.wrapping_add(i as u8), row))
    }

    /// The first keycode producing `keysym` unshifted or shifted.
    pub fn keycode_for(&self, keysym: u32) -> Option<u8> {
        self.rows().find(|(_, row)| row.iter().take(2).any(|&s| s == keysym)).map(|(code, _)| code)
    }

    pub fn keysym_for(&self, keycode: u8) -> Option<u32> {
        let row = keycode.checked_sub(self.min_keycode)? as usize;
        let sym = *self.keysyms.get(row * self.keysyms_per_keycode)?;
        (sym != 0).then_some(sym)
    }
}

/// Grab every hotkey on the root window, once per Lock/NumLock combination
/// so the bindings work regardless of either.
fn grab_keys(
    conn: &RustConnection,
    root: Window,
    keymap: &Keymap,
    hotkeys: &[Hotkey],
) -> Result<(), ConnectionError> {
    conn.ungrab_key(xproto::Grab::ANY, root, ModMask::ANY)?;
    let ignored = [ModMask::from(0u16), ModMask::LOCK, ModMask::M2, ModMask::LOCK | ModMask::M2];
    for hotkey in hotkeys {
        let Some(keycode) = keymap.keycode_for(hotkey.key_code.keysym()) else {
            warn!(%hotkey, "No keycode produces this key; binding ignored");
            continue;
        };
        let modifiers = ModMask::from(hotkey.modifiers.to_x_mask());
        for extra in ignored {
            conn.grab_key(false, root, modifiers | extra, keycode, GrabMode::ASYNC, GrabMode::ASYNC)?;
        }
        trace!(%hotkey, keycode, "Grabbed key");
    }
    Ok(())
}

/// Reads X events on its own thread and forwards the ones the reactor cares
/// about. Ends with a `ConnectionLost` event when the connection breaks.
pub struct EventPump {
    conn: Arc<RustConnection>,
    root: Window,
    keymap: Keymap,
    hotkeys: Vec<Hotkey>,
    events_tx: reactor::Sender,
}

impl EventPump {
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new().name("x11-events".into()).spawn(move || self.run())
    }

    fn run(mut self) {
        loop {
            let event = match self.conn.wait_for_event() {
                Ok(event) => event,
                Err(e) => {
                    error!("Lost the X server connection: {e}");
                    self.events_tx.send(Event::ConnectionLost(e.to_string()));
                    return;
                }
            };
            let Some(event) = self.translate(event) else {
                continue;
            };
            if self.events_tx.try_send(event).is_err() {
                debug!("Reactor stopped; exiting event pump");
                return;
            }
        }
    }

    fn translate(&mut self, event: XEvent) -> Option<Event> {
        match event {
            XEvent::MapRequest(e) => Some(Event::MapRequest(WindowServerId::new(e.window))),
            XEvent::UnmapNotify(e) => {
                let synthetic = e.response_type & SYNTHETIC_EVENT_BIT != 0;
                // Each unmap is reported once on the root through
                // SubstructureNotify.
                (e.event == self.root || synthetic).then(|| Event::UnmapNotify {
                    window: WindowServerId::new(e.window),
                    synthetic,
                })
            }
            XEvent::DestroyNotify(e) => (e.event == self.root)
                .then(|| Event::DestroyNotify(WindowServerId::new(e.window))),
            XEvent::ConfigureRequest(e) => {
                let has = |flag: ConfigWindow| e.value_mask.contains(flag);
                let request = ConfigureRequest {
                    x: has(ConfigWindow::X).then_some(e.x.into()),
                    y: has(ConfigWindow::Y).then_some(e.y.into()),
                    width: has(ConfigWindow::WIDTH).then_some(e.width.into()),
                    height: has(ConfigWindow::HEIGHT).then_some(e.height.into()),
                    sibling: has(ConfigWindow::SIBLING).then_some(WindowServerId::new(e.sibling)),
                    stack_mode: has(ConfigWindow::STACK_MODE)
                        .then(|| from_x_stack_mode(e.stack_mode))
                        .flatten(),
                };
                Some(Event::ConfigureRequest(WindowServerId::new(e.window), request))
            }
            XEvent::EnterNotify(e) => (e.mode == NotifyMode::NORMAL
                && e.detail != NotifyDetail::INFERIOR)
                .then(|| Event::EnterNotify(WindowServerId::new(e.event))),
            XEvent::KeyPress(e) => {
                let keysym = self.keymap.keysym_for(e.detail)?;
                let Some(key_code) = KeyCode::from_keysym(keysym) else {
                    trace!(keysym, "Key press for an unsupported keysym");
                    return None;
                };
                let modifiers = Modifiers::from_x_state(u16::from(e.state));
                Some(Event::KeyChord(Hotkey::new(modifiers, key_code)))
            }
            XEvent::MappingNotify(e) if e.request == Mapping::KEYBOARD => {
                self.reload_keymap();
                None
            }
            XEvent::Error(e) => {
                debug!(?e, "X11 request failed");
                None
            }
            _ => None,
        }
    }

    fn reload_keymap(&mut self) {
        match Keymap::load(&self.conn) {
            Ok(keymap) => self.keymap = keymap,
            Err(e) => {
                warn!("Could not reload the keyboard mapping: {e}");
                return;
            }
        }
        if let Err(e) = grab_keys(&self.conn, self.root, &self.keymap, &self.hotkeys) {
            warn!("Could not grab keys after a keyboard mapping change: {e}");
        }
        info!("Keyboard mapping changed; hotkeys grabbed again");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn wm_class_has_name_then_class() {
        assert_eq!(
            parse_wm_class(b"Navigator\0firefox\0"),
            Some(ClassHint {
                res_name: Some("Navigator".into()),
                res_class: Some("firefox".into()),
            })
        );
    }

    #[test]
    fn wm_class_tolerates_missing_parts() {
        assert_eq!(parse_wm_class(b""), None);
        assert_eq!(
            parse_wm_class(b"xterm"),
            Some(ClassHint { res_name: Some("xterm".into()), res_class: None })
        );
        assert_eq!(
            parse_wm_class(b"\0XTerm\0"),
            Some(ClassHint { res_name: None, res_class: Some("XTerm".into()) })
        );
    }

    #[test]
    fn stack_modes_survive_conversion() {
        for mode in [
            StackMode::Above,
            StackMode::Below,
            StackMode::TopIf,
            StackMode::BottomIf,
            StackMode::Opposite,
        ] {
            assert_eq!(from_x_stack_mode(to_x_stack_mode(mode)), Some(mode));
        }
    }

    fn keymap() -> Keymap {
        // Keycodes 8..=11, two columns each.
        Keymap {
            min_keycode: 8,
            keysyms_per_keycode: 2,
            keysyms: vec![0x0061, 0x0041, 0xff0d, 0, 0x0031, 0x0021, 0, 0],
        }
    }

    #[test]
    fn keymap_lookups() {
        let keymap = keymap();
        assert_eq!(keymap.keycode_for(KeyCode::KeyA.keysym()), Some(8));
        assert_eq!(keymap.keycode_for(KeyCode::Enter.keysym()), Some(9));
        assert_eq!(keymap.keycode_for(KeyCode::Digit1.keysym()), Some(10));
        assert_eq!(keymap.keycode_for(KeyCode::KeyZ.keysym()), None);

        assert_eq!(keymap.keysym_for(8), Some(0x0061));
        assert_eq!(keymap.keysym_for(11), None);
        assert_eq!(keymap.keysym_for(7), None);
        assert_eq!(keymap.keysym_for(200), None);
    }
}
