//! Sound dispatch - turns fire events and membership transitions into per-player directives

use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SharedRangeConfig;
use crate::ws::protocol::ServerMsg;

use super::logger::{log_area_transition, log_sound_event};
use super::range::is_within_range;
use super::registry::{SoundError, SoundRegistry, RAILGUN_SHOOT, SHOOT_SOUND_DURATION_MS};
use super::tracker::{ImpactEvent, PlayerAreaTracker, Transition};

/// Inbound impact from the weapon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireEvent {
    pub origin_x: f64,
    pub origin_z: f64,
    pub fired_at_ms: i64,
    pub volume: f32,
    pub pitch: f32,
}

/// Horizontal position of an online player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPosition {
    pub player_id: Uuid,
    pub x: f64,
    pub z: f64,
}

/// Instruction for one player's client
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Play {
        sound_id: String,
        x: f64,
        z: f64,
        offset_ms: i64,
        volume: f32,
        pitch: f32,
    },
    Stop {
        sound_id: String,
    },
}

impl Directive {
    pub fn sound_id(&self) -> &str {
        match self {
            Directive::Play { sound_id, .. } | Directive::Stop { sound_id } => sound_id,
        }
    }

    /// Build the wire message, refusing sounds the registry does not know
    pub fn into_server_msg(self, registry: &SoundRegistry) -> Result<ServerMsg, SoundError> {
        let sound = registry.resolve(self.sound_id())?;
        Ok(match self {
            Directive::Play {
                x,
                z,
                offset_ms,
                volume,
                pitch,
                ..
            } => ServerMsg::PlaySound {
                sound_id: sound.id.to_string(),
                x,
                z,
                offset_ms,
                volume: volume.clamp(0.0, 1.0),
                pitch,
            },
            Directive::Stop { .. } => ServerMsg::StopSound {
                sound_id: sound.id.to_string(),
            },
        })
    }
}

/// Owns the membership tracker and the retained impact events
pub struct SoundDispatchCoordinator {
    tracker: PlayerAreaTracker,
    registry: SoundRegistry,
    range: SharedRangeConfig,
    events: HashMap<u64, ImpactEvent>,
    latest_event_id: Option<u64>,
    next_event_id: u64,
}

impl SoundDispatchCoordinator {
    pub fn new(range: SharedRangeConfig) -> Self {
        Self {
            tracker: PlayerAreaTracker::new(range.clone()),
            registry: SoundRegistry::new(),
            range,
            events: HashMap::new(),
            latest_event_id: None,
            next_event_id: 1,
        }
    }

    /// Start a new impact and evaluate every player in the online snapshot
    pub fn on_fire(
        &mut self,
        fire: FireEvent,
        players: &[PlayerPosition],
        now_ms: i64,
    ) -> Vec<(Uuid, Directive)> {
        let sound = match self.registry.resolve(RAILGUN_SHOOT) {
            Ok(sound) => sound,
            Err(e) => {
                warn!(error = %e, "Cannot dispatch railgun impact");
                return Vec::new();
            }
        };

        let event = ImpactEvent {
            event_id: self.next_event_id,
            origin_x: fire.origin_x,
            origin_z: fire.origin_z,
            fired_at_ms: fire.fired_at_ms,
            sound_duration_ms: sound.duration_ms.unwrap_or(SHOOT_SOUND_DURATION_MS),
            sound_id: sound.id,
            volume: fire.volume,
            pitch: fire.pitch,
        };
        self.next_event_id += 1;

        let config = self.range.snapshot();
        log_sound_event(
            config.debug_logging,
            event.sound_id,
            event.origin_x,
            event.origin_z,
            config.radius,
        );

        let mut directives = Vec::new();
        for player in players {
            let transition = self.tracker.evaluate(player.player_id, player.x, player.z, &event);
            self.log_transition(player, &transition);
            if let Some(directive) = directive_for(&event, &transition, true, now_ms) {
                directives.push((player.player_id, directive));
            }
        }

        self.latest_event_id = Some(event.event_id);
        self.events.insert(event.event_id, event);
        directives
    }

    /// Periodic re-check of passive movement across the range boundary.
    ///
    /// Each player is checked against the event it was last evaluated against;
    /// players with none are checked against the newest event still playing.
    pub fn recheck(&mut self, players: &[PlayerPosition], now_ms: i64) -> Vec<(Uuid, Directive)> {
        let mut directives = Vec::new();

        for player in players {
            let Some(event) = self.recheck_target(&player.player_id, now_ms).cloned() else {
                continue;
            };
            let transition = self.tracker.evaluate(player.player_id, player.x, player.z, &event);
            self.log_transition(player, &transition);
            if let Some(directive) = directive_for(&event, &transition, false, now_ms) {
                directives.push((player.player_id, directive));
            }
        }

        self.prune_events(now_ms);
        directives
    }

    /// One-shot sound for everyone currently within range of (x, z); not tracked
    pub fn relay(
        &self,
        sound_id: &str,
        x: f64,
        z: f64,
        volume: f32,
        pitch: f32,
        players: &[PlayerPosition],
    ) -> Result<Vec<(Uuid, Directive)>, SoundError> {
        let sound = self.registry.resolve(sound_id)?;
        let config = self.range.snapshot();
        log_sound_event(config.debug_logging, sound.id, x, z, config.radius);

        Ok(players
            .iter()
            .filter(|p| is_within_range(p.x, p.z, x, z, config.radius))
            .map(|p| {
                (
                    p.player_id,
                    Directive::Play {
                        sound_id: sound.id.to_string(),
                        x,
                        z,
                        offset_ms: 0,
                        volume,
                        pitch,
                    },
                )
            })
            .collect())
    }

    /// Player disconnected
    pub fn on_player_disconnect(&mut self, player_id: &Uuid) {
        self.tracker.clear(player_id);
    }

    pub fn tracker(&self) -> &PlayerAreaTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &SoundRegistry {
        &self.registry
    }

    pub fn retained_events(&self) -> usize {
        self.events.len()
    }

    fn recheck_target(&self, player_id: &Uuid, now_ms: i64) -> Option<&ImpactEvent> {
        self.tracker
            .membership(player_id)
            .and_then(|m| self.events.get(&m.last_event_id))
            .or_else(|| {
                self.latest_event_id
                    .and_then(|id| self.events.get(&id))
                    .filter(|e| !e.is_finished(now_ms))
            })
    }

    fn prune_events(&mut self, now_ms: i64) {
        let tracker = &self.tracker;
        self.events
            .retain(|id, event| !event.is_finished(now_ms) || tracker.has_members_inside(*id));
        if let Some(id) = self.latest_event_id {
            if !self.events.contains_key(&id) {
                self.latest_event_id = None;
            }
        }
    }

    fn log_transition(&self, player: &PlayerPosition, transition: &Transition) {
        if transition.is_new_location && transition.is_inside && !transition.entered_now {
            debug!(player_id = %player.player_id, "Player already inside a new impact location");
        }
        if transition.entered_now || transition.left_now {
            log_area_transition(
                self.range.debug_logging(),
                &player.player_id,
                transition.entered_now,
                player.x,
                player.z,
            );
        }
    }
}

/// Map a transition to a directive.
///
/// A fresh fire also replays the sound for players who were already inside
/// the previous impact and are inside this one.
fn directive_for(
    event: &ImpactEvent,
    transition: &Transition,
    fresh_fire: bool,
    now_ms: i64,
) -> Option<Directive> {
    if transition.left_now {
        return Some(Directive::Stop {
            sound_id: event.sound_id.to_string(),
        });
    }

    let starts = transition.entered_now
        || (fresh_fire && transition.is_new_event && transition.is_inside);
    if !starts {
        return None;
    }

    let elapsed_ms = event.elapsed_ms(now_ms);
    if elapsed_ms >= event.sound_duration_ms {
        return None;
    }

    Some(Directive::Play {
        sound_id: event.sound_id.to_string(),
        x: event.origin_x,
        z: event.origin_z,
        offset_ms: elapsed_ms,
        volume: event.volume,
        pitch: event.pitch,
    })
}

/// Convert directives to wire messages, dropping unknown sounds with a warning
pub fn resolve_directives(
    registry: &SoundRegistry,
    directives: Vec<(Uuid, Directive)>,
) -> Vec<(Uuid, ServerMsg)> {
    directives
        .into_iter()
        .filter_map(|(player_id, directive)| match directive.into_server_msg(registry) {
            Ok(msg) => Some((player_id, msg)),
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "Dropping sound directive");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RangeConfig;

    fn coordinator(radius: f64) -> SoundDispatchCoordinator {
        SoundDispatchCoordinator::new(SharedRangeConfig::new(RangeConfig {
            radius,
            debug_logging: false,
        }))
    }

    fn fire_at(x: f64, z: f64, fired_at_ms: i64) -> FireEvent {
        FireEvent {
            origin_x: x,
            origin_z: z,
            fired_at_ms,
            volume: 1.0,
            pitch: 1.0,
        }
    }

    fn pos(player_id: Uuid, x: f64, z: f64) -> PlayerPosition {
        PlayerPosition { player_id, x, z }
    }

    fn offset_of(directives: &[(Uuid, Directive)], player: Uuid) -> Option<i64> {
        directives.iter().find_map(|(id, d)| match d {
            Directive::Play { offset_ms, .. } if *id == player => Some(*offset_ms),
            _ => None,
        })
    }

    fn stopped(directives: &[(Uuid, Directive)], player: Uuid) -> bool {
        directives
            .iter()
            .any(|(id, d)| *id == player && matches!(d, Directive::Stop { .. }))
    }

    #[test]
    fn end_to_end_scenario() {
        let mut coord = coordinator(500.0);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let out = coord.on_fire(fire_at(0.0, 0.0, 0), &[pos(a, 100.0, 0.0), pos(b, 600.0, 0.0)], 0);
        assert_eq!(out.len(), 1);
        assert_eq!(offset_of(&out, a), Some(0));

        let out = coord.recheck(&[pos(a, 100.0, 0.0), pos(b, 400.0, 0.0)], 10_000);
        assert_eq!(out.len(), 1);
        assert_eq!(offset_of(&out, b), Some(10_000));

        let out = coord.recheck(&[pos(a, 1000.0, 0.0), pos(b, 400.0, 0.0)], 54_000);
        assert_eq!(out.len(), 1);
        assert!(stopped(&out, a));
    }

    #[test]
    fn late_entry_gets_elapsed_offset() {
        let mut coord = coordinator(500.0);
        let p = Uuid::new_v4();

        coord.on_fire(fire_at(0.0, 0.0, 0), &[pos(p, 800.0, 0.0)], 0);
        let out = coord.recheck(&[pos(p, 10.0, 0.0)], 20_000);
        assert_eq!(offset_of(&out, p), Some(20_000));
    }

    #[test]
    fn entry_after_sound_finished_is_silent() {
        let mut coord = coordinator(500.0);
        let p = Uuid::new_v4();
        let other = Uuid::new_v4();

        // keep the event retained by having someone inside
        coord.on_fire(fire_at(0.0, 0.0, 0), &[pos(p, 800.0, 0.0), pos(other, 0.0, 0.0)], 0);
        let out = coord.recheck(&[pos(p, 10.0, 0.0), pos(other, 0.0, 0.0)], 60_000);
        assert!(out.is_empty());
        assert!(coord.tracker().membership(&p).unwrap().is_inside);
    }

    #[test]
    fn still_inside_emits_nothing() {
        let mut coord = coordinator(500.0);
        let p = Uuid::new_v4();

        coord.on_fire(fire_at(0.0, 0.0, 0), &[pos(p, 0.0, 0.0)], 0);
        assert!(coord.recheck(&[pos(p, 5.0, 5.0)], 1_000).is_empty());
        assert!(coord.recheck(&[pos(p, 5.0, 5.0)], 2_000).is_empty());
    }

    #[test]
    fn repeated_fire_at_same_spot_replays() {
        let mut coord = coordinator(500.0);
        let p = Uuid::new_v4();

        coord.on_fire(fire_at(0.0, 0.0, 0), &[pos(p, 0.0, 0.0)], 0);
        let out = coord.on_fire(fire_at(0.0, 0.0, 5_000), &[pos(p, 0.0, 0.0)], 5_000);
        assert_eq!(offset_of(&out, p), Some(0));
    }

    #[test]
    fn new_fire_elsewhere_stops_sound_for_players_left_behind() {
        let mut coord = coordinator(500.0);
        let p = Uuid::new_v4();

        coord.on_fire(fire_at(0.0, 0.0, 0), &[pos(p, 0.0, 0.0)], 0);
        let out = coord.on_fire(fire_at(5_000.0, 0.0, 1_000), &[pos(p, 0.0, 0.0)], 1_000);
        assert!(stopped(&out, p));
    }

    #[test]
    fn late_joiner_is_picked_up_by_recheck() {
        let mut coord = coordinator(500.0);
        let early = Uuid::new_v4();
        let late = Uuid::new_v4();

        coord.on_fire(fire_at(0.0, 0.0, 0), &[pos(early, 0.0, 0.0)], 0);
        let out = coord.recheck(&[pos(early, 0.0, 0.0), pos(late, 50.0, 50.0)], 3_000);
        assert_eq!(offset_of(&out, late), Some(3_000));
    }

    #[test]
    fn finished_events_are_pruned_once_empty() {
        let mut coord = coordinator(500.0);
        let p = Uuid::new_v4();

        coord.on_fire(fire_at(0.0, 0.0, 0), &[pos(p, 0.0, 0.0)], 0);
        coord.recheck(&[pos(p, 0.0, 0.0)], 60_000);
        assert_eq!(coord.retained_events(), 1);

        let out = coord.recheck(&[pos(p, 900.0, 0.0)], 61_000);
        assert!(stopped(&out, p));
        assert_eq!(coord.retained_events(), 0);

        // nothing left to check against
        assert!(coord.recheck(&[pos(p, 0.0, 0.0)], 62_000).is_empty());
    }

    #[test]
    fn disconnect_resets_baseline() {
        let mut coord = coordinator(500.0);
        let p = Uuid::new_v4();

        coord.on_fire(fire_at(0.0, 0.0, 0), &[pos(p, 0.0, 0.0)], 0);
        coord.on_player_disconnect(&p);
        assert!(coord.tracker().membership(&p).is_none());

        let out = coord.recheck(&[pos(p, 0.0, 0.0)], 4_000);
        assert_eq!(offset_of(&out, p), Some(4_000));
    }

    #[test]
    fn relay_reaches_only_players_in_range() {
        let coord = coordinator(100.0);
        let near = Uuid::new_v4();
        let far = Uuid::new_v4();

        let out = coord
            .relay("equip", 0.0, 0.0, 0.8, 1.0, &[pos(near, 60.0, 80.0), pos(far, 101.0, 0.0)])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, near);
        assert_eq!(out[0].1.sound_id(), "orbital_railgun_sounds:equip");
    }

    #[test]
    fn relay_rejects_unknown_sound() {
        let coord = coordinator(100.0);
        let result = coord.relay("kazoo", 0.0, 0.0, 1.0, 1.0, &[]);
        assert!(matches!(result, Err(SoundError::UnknownSound(_))));
    }

    #[test]
    fn unknown_directives_are_dropped_and_volume_clamped() {
        let registry = SoundRegistry::new();
        let ok = Uuid::new_v4();
        let bad = Uuid::new_v4();
        let directives = vec![
            (
                ok,
                Directive::Play {
                    sound_id: RAILGUN_SHOOT.to_string(),
                    x: 1.0,
                    z: 2.0,
                    offset_ms: 300,
                    volume: 1.7,
                    pitch: 1.0,
                },
            ),
            (
                bad,
                Directive::Stop {
                    sound_id: "other_mod:boom".to_string(),
                },
            ),
        ];

        let msgs = resolve_directives(&registry, directives);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].0, ok);
        match &msgs[0].1 {
            ServerMsg::PlaySound {
                offset_ms, volume, ..
            } => {
                assert_eq!(*offset_ms, 300);
                assert_eq!(*volume, 1.0);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
