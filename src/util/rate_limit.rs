//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max client messages per second (position reports arrive every tick)
pub const INPUT_RATE_LIMIT: u32 = 40;

/// Max fire and one-shot sound requests per second
pub const SOUND_RATE_LIMIT: u32 = 4;

/// Per-player rate limiter state
#[derive(Clone)]
pub struct PlayerRateLimiter {
    input_limiter: Arc<Limiter>,
    sound_limiter: Arc<Limiter>,
}

impl PlayerRateLimiter {
    pub fn new() -> Self {
        Self {
            input_limiter: create_limiter(INPUT_RATE_LIMIT),
            sound_limiter: create_limiter(SOUND_RATE_LIMIT),
        }
    }

    /// Check if an input message is allowed (returns true if allowed)
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }

    /// Check if a fire or sound request is allowed
    pub fn check_sound(&self) -> bool {
        self.sound_limiter.check().is_ok()
    }
}

impl Default for PlayerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sound_requests_are_capped() {
        let limiter = PlayerRateLimiter::new();
        let allowed = (0..SOUND_RATE_LIMIT * 3)
            .filter(|_| limiter.check_sound())
            .count();
        assert!(allowed >= 1);
        assert!(allowed <= SOUND_RATE_LIMIT as usize);
    }

    #[test]
    fn input_burst_allows_a_tick_of_positions() {
        let limiter = PlayerRateLimiter::new();
        assert!((0..20).all(|_| limiter.check_input()));
    }
}
