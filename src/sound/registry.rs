//! Registered sound events

/// Namespace for every sound this server knows about
pub const NAMESPACE: &str = "orbital_railgun_sounds";

/// Railgun impact sound, tracked by area membership
pub const RAILGUN_SHOOT: &str = "orbital_railgun_sounds:railgun_shoot";
/// Scope-in sound
pub const SCOPE_ON: &str = "orbital_railgun_sounds:scope_on";
/// Weapon equip sound
pub const EQUIP: &str = "orbital_railgun_sounds:equip";

/// Length of the railgun shoot effect
pub const SHOOT_SOUND_DURATION_MS: i64 = 53_000;

/// A registered sound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundDef {
    pub id: &'static str,
    /// Playback length, if the server tracks it
    pub duration_ms: Option<i64>,
}

const SOUNDS: [SoundDef; 3] = [
    SoundDef {
        id: RAILGUN_SHOOT,
        duration_ms: Some(SHOOT_SOUND_DURATION_MS),
    },
    SoundDef {
        id: SCOPE_ON,
        duration_ms: None,
    },
    SoundDef {
        id: EQUIP,
        duration_ms: None,
    },
];

/// Sound lookup errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SoundError {
    #[error("Unknown sound identifier: {0}")]
    UnknownSound(String),
}

/// Lookup table for sound identifiers
#[derive(Debug, Clone, Default)]
pub struct SoundRegistry;

impl SoundRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a sound identifier, accepting a bare path in our namespace
    pub fn resolve(&self, id: &str) -> Result<SoundDef, SoundError> {
        let full = if id.contains(':') {
            id.to_string()
        } else {
            format!("{}:{}", NAMESPACE, id)
        };

        SOUNDS
            .iter()
            .find(|s| s.id == full)
            .copied()
            .ok_or_else(|| SoundError::UnknownSound(id.to_string()))
    }
}
