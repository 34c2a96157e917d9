//! Game simulation modules

pub mod control;
pub mod engine;
pub mod entities;
pub mod metadata;
pub mod physics;
pub mod session;
pub mod snapshot;
pub mod world;

pub use engine::{EngineConfig, GameEngine};
pub use session::{GameSession, SessionConfig, SessionHandle, SessionStatus};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Player message received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: Uuid,
    pub msg: ClientMsg,
}
