//! Network facades
//!
//! Only the WebSocket facade lives here. It wraps any host socket that offers
//! the stream contract; `compio_host_io::MemorySocket` is the one shipped.

pub mod websocket;

pub use websocket::WebSocket;
