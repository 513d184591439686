pub mod frame;
pub mod handshake;
pub mod server;

pub use frame::{Frame, Opcode};
pub use server::{serve, WsHandler, MAX_CLIENTS};
