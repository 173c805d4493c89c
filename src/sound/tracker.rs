//! Per-player sound range membership tracking

use std::collections::HashMap;
use uuid::Uuid;

use crate::config::SharedRangeConfig;

use super::range::is_within_range;

/// One railgun impact, from fire until its sound finishes
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactEvent {
    /// Monotonic id assigned by the coordinator
    pub event_id: u64,
    pub origin_x: f64,
    pub origin_z: f64,
    /// Server wall-clock time of the impact
    pub fired_at_ms: i64,
    pub sound_duration_ms: i64,
    pub sound_id: &'static str,
    pub volume: f32,
    pub pitch: f32,
}

impl ImpactEvent {
    /// Milliseconds of playback that have already happened at `now_ms`
    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.fired_at_ms).max(0)
    }

    pub fn is_finished(&self, now_ms: i64) -> bool {
        self.elapsed_ms(now_ms) >= self.sound_duration_ms
    }
}

/// Last known membership of one player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerMembership {
    pub is_inside: bool,
    pub last_event_origin_x: f64,
    pub last_event_origin_z: f64,
    pub last_event_id: u64,
}

/// Result of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transition {
    pub entered_now: bool,
    pub left_now: bool,
    /// No prior membership, or the prior event had a different origin
    pub is_new_location: bool,
    /// No prior membership, or the prior event had a different id
    pub is_new_event: bool,
    /// Membership after this evaluation
    pub is_inside: bool,
}

/// Tracks which players are inside the sound range of their current impact event
#[derive(Debug)]
pub struct PlayerAreaTracker {
    memberships: HashMap<Uuid, PlayerMembership>,
    range: SharedRangeConfig,
}

impl PlayerAreaTracker {
    pub fn new(range: SharedRangeConfig) -> Self {
        Self {
            memberships: HashMap::new(),
            range,
        }
    }

    /// Evaluate a player position against an impact event and record the result.
    ///
    /// The radius is read fresh on every call, so a config change moves the
    /// boundary for the next evaluation.
    pub fn evaluate(
        &mut self,
        player_id: Uuid,
        player_x: f64,
        player_z: f64,
        event: &ImpactEvent,
    ) -> Transition {
        let previous = self.memberships.get(&player_id).copied();
        let was_inside = previous.map(|m| m.is_inside).unwrap_or(false);

        let radius = self.range.radius();
        let is_inside = is_within_range(player_x, player_z, event.origin_x, event.origin_z, radius);

        let is_new_location = previous
            .map(|m| m.last_event_origin_x != event.origin_x || m.last_event_origin_z != event.origin_z)
            .unwrap_or(true);
        let is_new_event = previous
            .map(|m| m.last_event_id != event.event_id)
            .unwrap_or(true);

        self.memberships.insert(
            player_id,
            PlayerMembership {
                is_inside,
                last_event_origin_x: event.origin_x,
                last_event_origin_z: event.origin_z,
                last_event_id: event.event_id,
            },
        );

        Transition {
            entered_now: is_inside && !was_inside,
            left_now: !is_inside && was_inside,
            is_new_location,
            is_new_event,
            is_inside,
        }
    }

    /// Forget a player (on disconnect). Returns whether an entry existed.
    pub fn clear(&mut self, player_id: &Uuid) -> bool {
        self.memberships.remove(player_id).is_some()
    }

    pub fn membership(&self, player_id: &Uuid) -> Option<&PlayerMembership> {
        self.memberships.get(player_id)
    }

    /// Whether any player is still inside the given event
    pub fn has_members_inside(&self, event_id: u64) -> bool {
        self.memberships
            .values()
            .any(|m| m.is_inside && m.last_event_id == event_id)
    }
}
