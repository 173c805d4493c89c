//! Debug-gated sound logging

use tracing::{debug, info};

/// Log a dispatched sound event; promoted to info when debug logging is on
pub fn log_sound_event(debug_logging: bool, sound_id: &str, x: f64, z: f64, range: f64) {
    if debug_logging {
        info!(sound = sound_id, x, z, range, "Sound event");
    } else {
        debug!(sound = sound_id, x, z, range, "Sound event");
    }
}

/// Log a player crossing the sound range boundary
pub fn log_area_transition(debug_logging: bool, player_id: &uuid::Uuid, entered: bool, x: f64, z: f64) {
    let action = if entered { "entered" } else { "left" };
    if debug_logging {
        info!(player_id = %player_id, x, z, "Player {} sound range", action);
    } else {
        debug!(player_id = %player_id, x, z, "Player {} sound range", action);
    }
}
