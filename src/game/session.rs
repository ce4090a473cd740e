//! Session registry: connection identity -> car, color, latest input

use std::fmt;

use rand::Rng;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::physics::{Car, TurnInput};

/// Colors handed to players in order. Red (0xff5c5c) belongs to the AI.
pub const PLAYER_COLORS: [u32; 10] = [
    0x3ec1ff, // Blue
    0x00ff00, // Green
    0xffff00, // Yellow
    0xff00ff, // Magenta
    0x00ffff, // Cyan
    0xffa500, // Orange
    0x8000ff, // Purple
    0xff1493, // Deep Pink
    0x00ff7f, // Spring Green
    0xff6347, // Tomato
];

/// Server-generated identity of a connected player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of any car, as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarId {
    Ai,
    Player(PlayerId),
}

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarId::Ai => f.write_str("ai"),
            CarId::Player(id) => write!(f, "{}", id),
        }
    }
}

impl Serialize for CarId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One connected client and its car
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub color: u32,
    pub car: Car,
    pub input: TurnInput,
}

/// Live sessions in join order.
///
/// Join order is the canonical car order after the AI, so it is kept stable.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// First unused palette color, or a random palette entry when all are taken
    pub fn assign_color<R: Rng>(&self, rng: &mut R) -> u32 {
        PLAYER_COLORS
            .iter()
            .copied()
            .find(|color| !self.sessions.iter().any(|s| s.color == *color))
            .unwrap_or_else(|| PLAYER_COLORS[rng.gen_range(0..PLAYER_COLORS.len())])
    }

    /// Register a new session with a car at the spawn pose
    pub fn insert<R: Rng>(&mut self, player_id: PlayerId, now_millis: f64, rng: &mut R) -> &Session {
        let color = self.assign_color(rng);
        self.sessions.push(Session {
            player_id,
            color,
            car: Car::at_origin(),
            input: TurnInput {
                timestamp: now_millis,
                ..Default::default()
            },
        });
        &self.sessions[self.sessions.len() - 1]
    }

    /// Remove a session; its color becomes free again
    pub fn remove(&mut self, player_id: PlayerId) -> Option<Session> {
        let idx = self.sessions.iter().position(|s| s.player_id == player_id)?;
        Some(self.sessions.remove(idx))
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.player_id == player_id)
    }

    pub fn get_mut(&mut self, player_id: PlayerId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.player_id == player_id)
    }

    /// Overwrite the latest input intent. Returns false for unknown ids.
    pub fn set_input(&mut self, player_id: PlayerId, input: TurnInput) -> bool {
        match self.get_mut(player_id) {
            Some(session) => {
                session.input = input;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.sessions.iter().map(|s| s.player_id)
    }
}
