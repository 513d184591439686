pub mod allow;
pub mod client;
pub mod handler;

pub use allow::is_allowed;
pub use client::TelegramClient;
pub use handler::{poll_loop, IncomingMessage, TelegramHandler};
