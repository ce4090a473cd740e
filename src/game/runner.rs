//! Authoritative tick loop and message fan-out

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::util::time::{tick_duration, unix_millis, Timer, TICK_DURATION_MICROS, TICK_RATE};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::physics::TurnInput;
use super::r#match::MatchPhase;
use super::session::PlayerId;
use super::snapshot::SnapshotStats;
use super::world::{Outbound, Recipients, World};
use super::GameCommand;

/// How often snapshot size stats are logged, in snapshots
const STATS_LOG_INTERVAL: u64 = TICK_RATE as u64 * 60;

/// Summary of the running match, readable from HTTP handlers
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchStatus {
    pub phase: MatchPhase,
    pub connected_players: usize,
    pub match_time: f64,
    pub finished: bool,
}

/// Handle to the running game loop
#[derive(Clone)]
pub struct GameHandle {
    pub command_tx: mpsc::Sender<GameCommand>,
    status: Arc<RwLock<MatchStatus>>,
}

impl GameHandle {
    pub fn status(&self) -> MatchStatus {
        self.status.read().clone()
    }
}

/// Owns the world and every session's outbound queue.
///
/// Commands and ticks are handled one at a time on a single task, so the
/// world is never touched concurrently.
pub struct GameRunner {
    world: World,
    command_rx: mpsc::Receiver<GameCommand>,
    outbound: HashMap<PlayerId, mpsc::Sender<Arc<str>>>,
    status: Arc<RwLock<MatchStatus>>,
    stats: SnapshotStats,
}

impl GameRunner {
    pub fn new(seed: u64, command_buffer: usize) -> (Self, GameHandle) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer);
        let status = Arc::new(RwLock::new(MatchStatus::default()));

        let handle = GameHandle {
            command_tx,
            status: status.clone(),
        };

        let runner = Self {
            world: World::new(seed),
            command_rx,
            outbound: HashMap::new(),
            status,
            stats: SnapshotStats::default(),
        };

        (runner, handle)
    }

    /// Run the fixed-rate loop until shutdown is signalled or every handle
    /// is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_rate = TICK_RATE, "Game loop started");

        let mut ticker = interval(tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Game loop shutting down");
                        break;
                    }
                }
                _ = ticker.tick() => self.run_tick(),
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        info!("All game handles dropped, stopping game loop");
                        break;
                    }
                },
            }
        }
    }

    /// Apply one connect, input or disconnect event
    pub fn handle_command(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::Connect { player_id, outbound } => {
                self.outbound.insert(player_id, outbound);
                let out = self.world.connect(player_id, unix_millis() as f64);
                self.dispatch(out);
                self.publish_status();
            }
            GameCommand::Message {
                player_id,
                msg,
                received_at,
            } => match msg {
                ClientMsg::Input {
                    left,
                    right,
                    timestamp,
                } => {
                    let input = TurnInput {
                        left,
                        right,
                        timestamp: timestamp.unwrap_or(received_at as f64),
                    };
                    if !self.world.apply_input(player_id, input) {
                        debug!(player_id = %player_id, "Input for unknown player");
                    }
                }
            },
            GameCommand::Disconnect { player_id } => {
                self.outbound.remove(&player_id);
                let out = self.world.disconnect(player_id);
                self.dispatch(out);
                self.publish_status();
            }
        }
    }

    /// Advance the simulation one step and broadcast the results
    pub fn run_tick(&mut self) {
        if self.world.population() == 0 {
            return;
        }
        let timer = Timer::new();

        let out = self.world.tick();
        self.dispatch(out);
        self.publish_status();

        let spent = timer.elapsed_micros();
        if spent > TICK_DURATION_MICROS {
            warn!(
                spent_micros = spent,
                budget_micros = TICK_DURATION_MICROS,
                "Slow tick"
            );
        }
    }

    /// Serialize each message once and queue it for its recipients.
    /// A full or closed queue only affects that one recipient.
    fn dispatch(&mut self, outbound: Vec<Outbound>) {
        for Outbound { to, msg } in outbound {
            let text: Arc<str> = match serde_json::to_string(&msg) {
                Ok(json) => json.into(),
                Err(e) => {
                    error!(error = %e, "Failed to serialize server message");
                    continue;
                }
            };

            if let ServerMsg::GameState { state } = &msg {
                self.stats.record(state.players.len(), text.len());
                if self.stats.total_snapshots % STATS_LOG_INTERVAL == 0 {
                    debug!(
                        snapshots = self.stats.total_snapshots,
                        avg_bytes = self.stats.avg_bytes(),
                        avg_players = self.stats.avg_players_per_snapshot,
                        "Snapshot stats"
                    );
                }
            }

            for (player_id, tx) in &self.outbound {
                if !to.includes(*player_id) {
                    continue;
                }
                if let Err(e) = tx.try_send(text.clone()) {
                    match e {
                        mpsc::error::TrySendError::Full(_) => {
                            warn!(player_id = %player_id, "Outbound queue full, dropping message");
                        }
                        mpsc::error::TrySendError::Closed(_) => {
                            debug!(player_id = %player_id, "Outbound queue closed");
                        }
                    }
                }
            }

            if let Recipients::One(player_id) = to {
                if !self.outbound.contains_key(&player_id) {
                    warn!(player_id = %player_id, "No outbound queue for direct message");
                }
            }
        }
    }

    fn publish_status(&self) {
        let mut status = self.status.write();
        status.phase = self.world.phase();
        status.connected_players = self.world.population();
        status.match_time = self.world.state().elapsed();
        status.finished = self.world.state().finished();
    }
}

#[cfg(test)]
impl GameRunner {
    pub(crate) fn world(&self) -> &World {
        &self.world
    }
}
