//! Interfaces to the operating system and the display server.

pub mod geometry;
pub mod hotkey;
pub mod process;
pub mod window_server;
pub mod x11;
