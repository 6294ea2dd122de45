use std::cell::RefCell;
use std::rc::Rc;

use super::{Event, Reactor};
use crate::common::collections::HashMap;
use crate::common::config::Config;
use crate::sys::geometry::Rect;
use crate::sys::process::Launcher;
use crate::sys::window_server::{
    ClassHint, ConfigureRequest, ProtocolMessage, Protocols, Result, WindowServer, WindowServerId,
};

pub const SCREEN: Rect = Rect { x: 0, y: 0, width: 1920, height: 1080 };

/// Everything the reactor asked of the server, in order. Flushes are left
/// out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ClassHint(WindowServerId),
    Protocols(WindowServerId),
    InputFocus,
    IsMapped(WindowServerId),
    SelectClientEvents(WindowServerId),
    Map(WindowServerId),
    Unmap(WindowServerId),
    Raise(WindowServerId),
    MoveResize(WindowServerId, Rect, u32),
    Configure(WindowServerId, ConfigureRequest, u32),
    SetBorderColor(WindowServerId, u32),
    SetInputFocus(Option<WindowServerId>),
    SendProtocolMessage(WindowServerId, ProtocolMessage),
    KillClient(WindowServerId),
}

#[derive(Debug, Clone, Default)]
pub struct FakeWindow {
    pub hint: Option<ClassHint>,
    pub protocols: Protocols,
    pub mapped: bool,
    pub frame: Option<Rect>,
    pub border_width: Option<u32>,
    pub border_color: Option<u32>,
}

/// An in-memory display server. Requests for windows that do not exist are
/// recorded and otherwise ignored, the same way a real server's errors are.
#[derive(Debug, Default)]
pub struct FakeServer {
    windows: HashMap<WindowServerId, FakeWindow>,
    /// Subwindows created by clients, mapped to their parent.
    parents: HashMap<WindowServerId, WindowServerId>,
    pub input_focus: Option<WindowServerId>,
    requests: RefCell<Vec<Request>>,
}

impl FakeServer {
    pub fn add_window(
        &mut self,
        id: WindowServerId,
        res_name: Option<&str>,
        res_class: Option<&str>,
    ) -> WindowServerId {
        let hint = (res_name.is_some() || res_class.is_some()).then(|| ClassHint {
            res_name: res_name.map(String::from),
            res_class: res_class.map(String::from),
        });
        self.windows.insert(id, FakeWindow { hint, ..Default::default() });
        id
    }

    pub fn add_terminal(&mut self, id: WindowServerId) -> WindowServerId {
        self.add_window(id, Some("xterm"), Some("XTerm"))
    }

    pub fn add_browser(&mut self, id: WindowServerId) -> WindowServerId {
        self.add_window(id, Some("Navigator"), Some("firefox"))
    }

    pub fn add_child(&mut self, id: WindowServerId, parent: WindowServerId) -> WindowServerId {
        self.parents.insert(id, parent);
        id
    }

    /// The client went away; later requests for it become no-ops.
    pub fn destroy(&mut self, id: WindowServerId) {
        self.windows.remove(&id);
        if self.input_focus == Some(id) {
            self.input_focus = None;
        }
    }

    #[track_caller]
    pub fn window(&self, id: WindowServerId) -> &FakeWindow {
        self.windows.get(&id).unwrap_or_else(|| panic!("no window {id:?}"))
    }

    #[track_caller]
    pub fn window_mut(&mut self, id: WindowServerId) -> &mut FakeWindow {
        self.windows.get_mut(&id).unwrap_or_else(|| panic!("no window {id:?}"))
    }

    pub fn take_requests(&mut self) -> Vec<Request> { self.requests.take() }

    fn record(&self, request: Request) { self.requests.borrow_mut().push(request); }

    fn update(&mut self, id: WindowServerId, request: Request, f: impl FnOnce(&mut FakeWindow)) {
        self.record(request);
        if let Some(window) = self.windows.get_mut(&id) {
            f(window);
        }
    }
}

impl WindowServer for FakeServer {
    fn class_hint(&self, window: WindowServerId) -> Result<Option<ClassHint>> {
        self.record(Request::ClassHint(window));
        Ok(self.windows.get(&window).and_then(|w| w.hint.clone()))
    }

    fn protocols(&self, window: WindowServerId) -> Result<Protocols> {
        self.record(Request::Protocols(window));
        Ok(self.windows.get(&window).map(|w| w.protocols).unwrap_or_default())
    }

    fn input_focus(&self) -> Result<Option<WindowServerId>> {
        self.record(Request::InputFocus);
        let mut focus = self.input_focus;
        while let Some(parent) = focus.and_then(|w| self.parents.get(&w)) {
            focus = Some(*parent);
        }
        Ok(focus)
    }

    fn is_mapped(&self, window: WindowServerId) -> Result<bool> {
        self.record(Request::IsMapped(window));
        Ok(self.windows.get(&window).is_some_and(|w| w.mapped))
    }

    fn select_client_events(&mut self, window: WindowServerId) -> Result<()> {
        self.record(Request::SelectClientEvents(window));
        Ok(())
    }

    fn map(&mut self, window: WindowServerId) -> Result<()> {
        self.update(window, Request::Map(window), |w| w.mapped = true);
        Ok(())
    }

    fn unmap(&mut self, window: WindowServerId) -> Result<()> {
        self.update(window, Request::Unmap(window), |w| w.mapped = false);
        Ok(())
    }

    fn raise(&mut self, window: WindowServerId) -> Result<()> {
        self.record(Request::Raise(window));
        Ok(())
    }

    fn move_resize(&mut self, window: WindowServerId, frame: Rect, border_width: u32) -> Result<()> {
        self.update(window, Request::MoveResize(window, frame, border_width), |w| {
            w.frame = Some(frame);
            w.border_width = Some(border_width);
        });
        Ok(())
    }

    fn configure(
        &mut self,
        window: WindowServerId,
        request: &ConfigureRequest,
        border_width: u32,
    ) -> Result<()> {
        self.record(Request::Configure(window, *request, border_width));
        Ok(())
    }

    fn set_border_color(&mut self, window: WindowServerId, color: u32) -> Result<()> {
        self.update(window, Request::SetBorderColor(window, color), |w| {
            w.border_color = Some(color)
        });
        Ok(())
    }

    fn set_input_focus(&mut self, window: Option<WindowServerId>) -> Result<()> {
        self.record(Request::SetInputFocus(window));
        self.input_focus = window.filter(|w| self.windows.contains_key(w));
        Ok(())
    }

    fn send_protocol_message(
        &mut self,
        window: WindowServerId,
        message: ProtocolMessage,
    ) -> Result<()> {
        self.record(Request::SendProtocolMessage(window, message));
        Ok(())
    }

    fn kill_client(&mut self, window: WindowServerId) -> Result<()> {
        self.record(Request::KillClient(window));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> { Ok(()) }
}

/// Commands handed to the launcher, shared with the test body.
pub type SpawnLog = Rc<RefCell<Vec<String>>>;

#[derive(Default)]
pub struct RecordingLauncher {
    spawned: SpawnLog,
}

impl Launcher for RecordingLauncher {
    fn spawn(&mut self, command: &str) { self.spawned.borrow_mut().push(command.to_string()); }
}

impl Reactor<FakeServer> {
    pub fn new_for_test(config: Config) -> (Self, SpawnLog) {
        let launcher = RecordingLauncher::default();
        let spawned = launcher.spawned.clone();
        let reactor = Reactor::new(config, FakeServer::default(), Box::new(launcher), SCREEN);
        (reactor, spawned)
    }

    #[track_caller]
    pub fn handle_events(&mut self, events: Vec<Event>) {
        for event in events {
            if let Err(e) = self.handle_event(event) {
                panic!("event failed: {e}");
            }
        }
    }
}
