//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::session::{CarId, PlayerId};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Latest steering intent
    Input {
        #[serde(default)]
        left: bool,
        #[serde(default)]
        right: bool,
        /// Client clock in milliseconds; server time is used when absent
        #[serde(default)]
        timestamp: Option<f64>,
    },
}

impl ClientMsg {
    const KNOWN_TYPES: &'static [&'static str] = &["input"];

    /// Parse a text frame, telling unknown tags apart from garbage
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !Self::KNOWN_TYPES.contains(&tag) {
            return Err(ProtocolError::UnknownType(tag.to_owned()));
        }
        serde_json::from_value(value).map_err(ProtocolError::Malformed)
    }
}

/// Inbound parse failures. All of them are logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Message has no type tag")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Sent once to a newly connected client
    #[serde(rename_all = "camelCase")]
    Joined { player_id: PlayerId, color: u32 },

    /// Another player connected
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_id: PlayerId,
        color: u32,
        position: Pose,
    },

    /// A player disconnected
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },

    /// The flag changed hands
    #[serde(rename_all = "camelCase")]
    FlagTransfer {
        from_player_id: CarId,
        to_player_id: CarId,
    },

    /// Full authoritative state, every tick
    GameState { state: GameStateView },
}

/// Position and heading of a car
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pose {
    pub x: f64,
    pub z: f64,
    pub angle: f64,
}

/// Player car in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub player_id: PlayerId,
    pub x: f64,
    pub z: f64,
    pub angle: f64,
    pub has_flag: bool,
}

/// AI car in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSnapshot {
    pub x: f64,
    pub z: f64,
    pub angle: f64,
    pub has_flag: bool,
}

/// Body of the `gameState` message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub players: Vec<PlayerSnapshot>,
    pub ai_car: AiSnapshot,
    pub flag_holder_id: Option<CarId>,
    /// Seconds elapsed in the match
    pub time: f64,
    pub player_hold_time: f64,
    pub enemies_hold_time: f64,
    pub finished: bool,
}
