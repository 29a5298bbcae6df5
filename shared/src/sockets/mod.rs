//! Realtime channel: websocket connections, subscriptions and change fan-out.

pub mod broadcast;
pub mod connections;
pub mod handler;

pub use handler::{handle_websocket_event, is_websocket_event};
