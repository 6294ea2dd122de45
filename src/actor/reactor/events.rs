pub mod command;
pub mod space;
pub mod window;
