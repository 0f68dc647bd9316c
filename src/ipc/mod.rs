//! Host-process communication: message schema and stdio transport.

pub mod channel;
pub mod protocol;
