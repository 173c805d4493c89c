//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Latest player position
    Position {
        x: f64,
        /// Height, not used for range checks
        #[serde(default)]
        y: f64,
        z: f64,
    },

    /// Railgun impact at (x, z); the server stamps the time
    Fire {
        x: f64,
        z: f64,
        #[serde(default = "default_volume")]
        volume: f32,
        #[serde(default = "default_pitch")]
        pitch: f32,
    },

    /// One-shot sound for players near (x, z)
    PlaySound {
        sound_id: String,
        x: f64,
        z: f64,
        #[serde(default = "default_volume")]
        volume: f32,
        #[serde(default = "default_pitch")]
        pitch: f32,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the server
    Leave,
}

fn default_volume() -> f32 {
    1.0
}

fn default_pitch() -> f32 {
    1.0
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { player_id: Uuid, server_time: u64 },

    /// Start a sound, skipping `offset_ms` into it
    PlaySound {
        sound_id: String,
        x: f64,
        z: f64,
        offset_ms: i64,
        /// 0.0 - 1.0
        volume: f32,
        pitch: f32,
    },

    /// Stop every instance of a sound
    StopSound { sound_id: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },

    /// Error message
    Error { code: String, message: String },
}
