//! Command implementations.

mod decode;
mod events;
mod send;

pub use decode::{DecodeCommand, DecodedReport};
pub use events::EventsCommand;
pub use send::SendCommand;
