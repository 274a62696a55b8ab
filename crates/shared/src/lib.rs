//! Shared wire protocol between the Storyloom engine and its clients.

pub mod messages;

pub use messages::{ClientMessage, OptionView, ServerMessage};
