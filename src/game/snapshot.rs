//! Snapshot building and size tracking

use crate::ws::protocol::{AiSnapshot, GameStateView, PlayerSnapshot, ServerMsg};

use super::world::World;

/// Build the full `gameState` message for the current tick
pub fn build_snapshot(world: &World) -> ServerMsg {
    let players: Vec<PlayerSnapshot> = world
        .sessions()
        .iter()
        .map(|s| PlayerSnapshot {
            player_id: s.player_id,
            x: s.car.x,
            z: s.car.z,
            angle: s.car.angle,
            has_flag: s.car.has_flag,
        })
        .collect();

    let ai = &world.ai().car;
    let state = world.state();

    ServerMsg::GameState {
        state: GameStateView {
            players,
            ai_car: AiSnapshot {
                x: ai.x,
                z: ai.z,
                angle: ai.angle,
                has_flag: ai.has_flag,
            },
            flag_holder_id: state.flag_holder,
            time: state.elapsed(),
            player_hold_time: state.hold_time_human(),
            enemies_hold_time: state.hold_time_ai(),
            finished: state.finished(),
        },
    }
}

/// Snapshot size stats for debugging
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_players_per_snapshot: f64,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f64;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f64 / n);
    }

    pub fn avg_bytes(&self) -> u64 {
        self.total_bytes.checked_div(self.total_snapshots).unwrap_or(0)
    }
}
