//! Outbound channels to connected players

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Per-player outbound queue depth
const SESSION_BUFFER: usize = 64;

struct Session {
    token: u64,
    tx: mpsc::Sender<ServerMsg>,
}

/// Registry of live player connections.
///
/// Each connection gets a token so a stale disconnect cannot remove a newer
/// connection for the same player.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Session>,
    next_token: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register a connection, replacing any previous one for the player
    pub fn register(&self, player_id: Uuid) -> (u64, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.sessions.insert(player_id, Session { token, tx });
        (token, rx)
    }

    /// Remove a connection if it is still the current one
    pub fn unregister(&self, player_id: &Uuid, token: u64) -> bool {
        self.sessions
            .remove_if(player_id, |_, session| session.token == token)
            .is_some()
    }

    /// Fire-and-forget send; dead or saturated sessions drop the message
    pub fn send(&self, player_id: &Uuid, msg: ServerMsg) -> bool {
        let Some(session) = self.sessions.get(player_id) else {
            debug!(player_id = %player_id, "No session, dropping message");
            return false;
        };

        match session.tx.try_send(msg) {
            Ok(()) => true,
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "Session send failed, dropping message");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pong(t: u64) -> ServerMsg {
        ServerMsg::Pong { t }
    }

    #[test]
    fn send_reaches_registered_session() {
        let sessions = SessionRegistry::new();
        let player = Uuid::new_v4();
        let (_, mut rx) = sessions.register(player);

        assert!(sessions.send(&player, pong(7)));
        assert_eq!(tokio_test::block_on(rx.recv()), Some(pong(7)));
    }

    #[test]
    fn send_to_unknown_player_is_dropped() {
        let sessions = SessionRegistry::new();
        assert!(!sessions.send(&Uuid::new_v4(), pong(1)));
    }

    #[test]
    fn send_to_closed_session_is_dropped() {
        let sessions = SessionRegistry::new();
        let player = Uuid::new_v4();
        let (_, rx) = sessions.register(player);
        drop(rx);

        assert!(!sessions.send(&player, pong(1)));
    }

    #[test]
    fn stale_token_does_not_unregister_newer_session() {
        let sessions = SessionRegistry::new();
        let player = Uuid::new_v4();
        let (old, _old_rx) = sessions.register(player);
        let (new, _new_rx) = sessions.register(player);

        assert!(!sessions.unregister(&player, old));
        assert!(sessions.send(&player, pong(3)));
        assert!(sessions.unregister(&player, new));
        assert!(sessions.is_empty());
    }
}
