//! Authoritative sound world: the tick loop and player sessions

pub mod session;
pub mod sound_loop;

pub use session::SessionRegistry;
pub use sound_loop::{SoundLoop, SoundLoopHandle};

use uuid::Uuid;

use crate::ws::protocol::ClientMsg;

/// Input delivered to the sound loop
#[derive(Debug, Clone)]
pub enum PlayerInput {
    /// A connection was registered
    Joined { player_id: Uuid, session: u64 },
    /// A message received from one of the player's connections
    Message {
        player_id: Uuid,
        session: u64,
        msg: ClientMsg,
        received_at: u64,
    },
    /// The connection closed
    Disconnected { player_id: Uuid, session: u64 },
}
