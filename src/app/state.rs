//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameHandle, GameRunner};

/// Command channel depth into the game loop
const COMMAND_BUFFER: usize = 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: GameHandle,
}

impl AppState {
    /// Build the state and the game loop it talks to. The caller spawns the
    /// returned runner.
    pub fn new(config: Config) -> (Self, GameRunner) {
        let config = Arc::new(config);

        let seed = config.game_seed.unwrap_or_else(rand::random);
        let (runner, game) = GameRunner::new(seed, COMMAND_BUFFER);

        (Self { config, game }, runner)
    }
}
