//! The board-side server process: one room, one WebSocket endpoint, one
//! session task that owns all mutable state.

pub mod config;
pub mod server;
pub mod session_task;

pub use config::ServerConfig;
pub use server::{GameServer, ServerError, ServerHandle};
pub use session_task::SessionCommand;
