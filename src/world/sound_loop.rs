//! Authoritative sound tick loop

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SharedRangeConfig;
use crate::sound::{
    resolve_directives, Directive, FireEvent, PlayerPosition, SoundDispatchCoordinator,
};
use crate::util::time::{tick_duration, unix_millis, RECHECK_INTERVAL_TICKS};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::session::SessionRegistry;
use super::PlayerInput;

/// Input queue depth shared by all connections
const INPUT_BUFFER: usize = 1024;

/// A player known to the loop
#[derive(Debug, Clone, Copy)]
struct OnlinePlayer {
    session: u64,
    /// None until the first position report
    position: Option<(f64, f64)>,
}

/// Handle to the running sound loop
#[derive(Clone)]
pub struct SoundLoopHandle {
    pub input_tx: mpsc::Sender<PlayerInput>,
    online_players: Arc<AtomicUsize>,
    retained_events: Arc<AtomicUsize>,
}

impl SoundLoopHandle {
    pub fn online_players(&self) -> usize {
        self.online_players.load(Ordering::Relaxed)
    }

    pub fn retained_events(&self) -> usize {
        self.retained_events.load(Ordering::Relaxed)
    }
}

/// Owns all membership state; every evaluation runs on this task
pub struct SoundLoop {
    coordinator: SoundDispatchCoordinator,
    players: HashMap<Uuid, OnlinePlayer>,
    sessions: Arc<SessionRegistry>,
    input_rx: mpsc::Receiver<PlayerInput>,
    tick: u64,
    online_players: Arc<AtomicUsize>,
    retained_events: Arc<AtomicUsize>,
}

impl SoundLoop {
    pub fn new(range: SharedRangeConfig, sessions: Arc<SessionRegistry>) -> (Self, SoundLoopHandle) {
        let (input_tx, input_rx) = mpsc::channel(INPUT_BUFFER);
        let online_players = Arc::new(AtomicUsize::new(0));
        let retained_events = Arc::new(AtomicUsize::new(0));

        let handle = SoundLoopHandle {
            input_tx,
            online_players: online_players.clone(),
            retained_events: retained_events.clone(),
        };

        let sound_loop = Self {
            coordinator: SoundDispatchCoordinator::new(range),
            players: HashMap::new(),
            sessions,
            input_rx,
            tick: 0,
            online_players,
            retained_events,
        };

        (sound_loop, handle)
    }

    /// Run the tick loop until every input sender is dropped
    pub async fn run(mut self) {
        info!("Sound loop started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            let now_ms = unix_millis() as i64;
            if !self.process_inputs(now_ms) {
                break;
            }
            self.run_tick(now_ms);
        }

        info!("Sound loop stopped");
    }

    /// Drain pending inputs in arrival order. Returns false once the queue is closed.
    fn process_inputs(&mut self, now_ms: i64) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(input) => self.handle_input(input, now_ms),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn run_tick(&mut self, now_ms: i64) {
        self.tick += 1;
        if self.tick % RECHECK_INTERVAL_TICKS == 0 {
            self.recheck(now_ms);
        }
    }

    fn handle_input(&mut self, input: PlayerInput, now_ms: i64) {
        match input {
            PlayerInput::Joined { player_id, session } => {
                // Reconnect: the new client starts from a clean membership
                if let Some(previous) = self.players.get(&player_id) {
                    if previous.session != session {
                        self.coordinator.on_player_disconnect(&player_id);
                        info!(player_id = %player_id, "Player reconnected, membership reset");
                    }
                }
                self.players.insert(
                    player_id,
                    OnlinePlayer {
                        session,
                        position: None,
                    },
                );
                info!(player_id = %player_id, online = self.players.len(), "Player joined");
            }
            PlayerInput::Disconnected { player_id, session } => {
                self.handle_disconnect(player_id, session);
            }
            PlayerInput::Message {
                player_id,
                session,
                msg,
                received_at,
            } => self.handle_message(player_id, session, msg, received_at as i64, now_ms),
        }
        self.publish_stats();
    }

    fn handle_message(
        &mut self,
        player_id: Uuid,
        session: u64,
        msg: ClientMsg,
        received_at: i64,
        now_ms: i64,
    ) {
        match self.players.get(&player_id) {
            Some(player) if player.session == session => {}
            Some(_) => {
                debug!(player_id = %player_id, "Message from replaced session, ignoring");
                return;
            }
            None => {
                debug!(player_id = %player_id, "Message from unknown player, ignoring");
                return;
            }
        }

        match msg {
            ClientMsg::Position { x, z, .. } => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.position = Some((x, z));
                }
            }
            ClientMsg::Fire { x, z, volume, pitch } => {
                let fire = FireEvent {
                    origin_x: x,
                    origin_z: z,
                    fired_at_ms: received_at,
                    volume,
                    pitch,
                };
                let online = self.online_positions();
                let directives = self.coordinator.on_fire(fire, &online, now_ms);
                info!(
                    player_id = %player_id,
                    x,
                    z,
                    directives = directives.len(),
                    "Railgun fired"
                );
                self.deliver(directives);
            }
            ClientMsg::PlaySound {
                sound_id,
                x,
                z,
                volume,
                pitch,
            } => {
                let online = self.online_positions();
                match self
                    .coordinator
                    .relay(&sound_id, x, z, volume, pitch, &online)
                {
                    Ok(directives) => self.deliver(directives),
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Ignoring sound request");
                        self.sessions.send(
                            &player_id,
                            ServerMsg::Error {
                                code: "unknown_sound".to_string(),
                                message: e.to_string(),
                            },
                        );
                    }
                }
            }
            ClientMsg::Ping { t } => {
                self.sessions.send(&player_id, ServerMsg::Pong { t });
            }
            ClientMsg::Leave => self.handle_disconnect(player_id, session),
        }
    }

    fn handle_disconnect(&mut self, player_id: Uuid, session: u64) {
        match self.players.get(&player_id) {
            Some(player) if player.session == session => {
                self.players.remove(&player_id);
                self.coordinator.on_player_disconnect(&player_id);
                info!(player_id = %player_id, online = self.players.len(), "Player left");
            }
            Some(_) => {
                debug!(player_id = %player_id, "Stale disconnect for replaced session");
            }
            None => {}
        }
    }

    fn recheck(&mut self, now_ms: i64) {
        let online = self.online_positions();
        let directives = self.coordinator.recheck(&online, now_ms);
        self.deliver(directives);
        self.publish_stats();
    }

    /// Snapshot of every online player with a known position
    fn online_positions(&self) -> Vec<PlayerPosition> {
        self.players
            .iter()
            .filter_map(|(id, p)| {
                p.position.map(|(x, z)| PlayerPosition {
                    player_id: *id,
                    x,
                    z,
                })
            })
            .collect()
    }

    fn deliver(&self, directives: Vec<(Uuid, Directive)>) {
        for (player_id, msg) in resolve_directives(self.coordinator.registry(), directives) {
            self.sessions.send(&player_id, msg);
        }
    }

    fn publish_stats(&self) {
        self.online_players
            .store(self.players.len(), Ordering::Relaxed);
        self.retained_events
            .store(self.coordinator.retained_events(), Ordering::Relaxed);
    }
}
