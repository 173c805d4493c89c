//! Application state shared across routes

use std::sync::Arc;

use crate::config::{Config, RangeConfigStore};
use crate::world::{SessionRegistry, SoundLoop, SoundLoopHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub range_store: RangeConfigStore,
    pub sessions: Arc<SessionRegistry>,
    pub sound_loop: SoundLoopHandle,
}

impl AppState {
    /// Build the state and the sound loop it feeds; the caller spawns the loop
    pub fn new(config: Config, range_store: RangeConfigStore) -> (Self, SoundLoop) {
        let config = Arc::new(config);

        // Initialize session registry
        let sessions = Arc::new(SessionRegistry::new());

        // Initialize the authoritative sound loop
        let (sound_loop, handle) = SoundLoop::new(range_store.shared(), sessions.clone());

        let state = Self {
            config,
            range_store,
            sessions,
            sound_loop: handle,
        };

        (state, sound_loop)
    }
}
