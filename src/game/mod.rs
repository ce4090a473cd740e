//! Game simulation modules

pub mod ai;
pub mod collision;
pub mod math;
pub mod r#match;
pub mod physics;
pub mod runner;
pub mod session;
pub mod snapshot;
pub mod world;

pub use runner::{GameHandle, GameRunner};
pub use session::PlayerId;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::ws::protocol::ClientMsg;

/// Events fed from connections into the game loop
#[derive(Debug)]
pub enum GameCommand {
    /// A socket connected; `outbound` receives serialized server messages
    Connect {
        player_id: PlayerId,
        outbound: mpsc::Sender<Arc<str>>,
    },
    /// A parsed client message
    Message {
        player_id: PlayerId,
        msg: ClientMsg,
        received_at: u64,
    },
    /// The socket closed or failed
    Disconnect { player_id: PlayerId },
}
