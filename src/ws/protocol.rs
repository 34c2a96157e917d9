//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::control::InputToken;
use crate::game::entities::Team;
use crate::game::metadata::MetaData;
use crate::game::world::{GameObject, ObjectId, ObjectLabel};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request a car. The server picks the smaller team when none is given.
    JoinGame {
        #[serde(default)]
        team: Option<Team>,
    },

    /// One discrete control input
    Input {
        /// Client-side sequence number, echoed in logs only
        #[serde(default)]
        seq: u32,
        input: InputToken,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the game (removes the car)
    LeaveGame,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        player_id: Uuid,
        server_time: u64,
        tick_rate: u32,
    },

    /// An object entered the world
    ObjectAdded { object: ObjectSnapshot },

    /// An object left the world
    ObjectRemoved {
        id: ObjectId,
        owner: Option<Uuid>,
    },

    /// Game state snapshot (sent at regular intervals)
    Snapshot {
        /// Server tick number
        tick: u64,
        objects: Vec<ObjectSnapshot>,
        /// Events that occurred since last snapshot
        events: Vec<GameEvent>,
    },

    /// Rosters and scores changed
    MetaData { meta: MetaData },

    /// Tick pacing report
    Telemetry {
        tick: u64,
        target_tick_rate: u32,
        measured_tick_rate: f32,
        /// Below the slow threshold
        degraded: bool,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response, addressed to the pinging player
    Pong { player_id: Uuid, t: u64 },
}

impl ServerMsg {
    /// Whether a broadcast message should be forwarded to `player_id`
    pub fn is_for(&self, player_id: Uuid) -> bool {
        match self {
            ServerMsg::Pong { player_id: to, .. } => *to == player_id,
            _ => true,
        }
    }
}

/// Object state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    pub owner: Option<Uuid>,
    #[serde(flatten)]
    pub label: ObjectLabel,
    pub position: Vec3,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub orientation: Quat,
}

impl From<&GameObject> for ObjectSnapshot {
    fn from(o: &GameObject) -> Self {
        Self {
            id: o.id,
            owner: o.owner,
            label: o.kind.label(),
            position: o.state.position,
            velocity: o.state.velocity,
            angular_velocity: o.state.angular_velocity,
            orientation: o.state.orientation,
        }
    }
}

/// Game events emitted by the rules engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    ObjectAdded { object: ObjectSnapshot },

    ObjectRemoved { id: ObjectId, owner: Option<Uuid> },

    /// A goal was scored; consumers re-read the metadata
    ScoreChange,

    /// Visual explosion cue on the ball
    Explosion { id: ObjectId },

    /// A roster changed; consumers re-read the metadata
    RosterChange,
}

/// Transport-level errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("WebSocket send failed: {0}")]
    Send(#[from] axum::Error),
}
