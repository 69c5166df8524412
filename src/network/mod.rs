//! Network Layer
//!
//! The arena runtime task and the WebSocket server observers connect to.
//! Round state only changes inside the runtime; this layer carries it out.

pub mod protocol;
pub mod runtime;
pub mod server;

pub use protocol::{
    ClientMessage, ServerMessage, MinigameChangedInfo, RoundClockUpdate, WelcomeInfo,
    ProtocolError, ErrorCode,
};
pub use runtime::{ArenaCommand, ArenaHandle, ArenaRuntime, RuntimeError, RuntimeStats};
pub use server::{ObserverServer, ServerConfig, ServerError};
