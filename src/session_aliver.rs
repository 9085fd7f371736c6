//! Session keepalive tracking.
//!
//! Counts "ticks since last activity" against a configured maximum. Used by
//! the RTMP session driver and any STUN-gated session to recognize a dead
//! peer and raise [`crate::error::VdkError::Timeout`].

/// Tracks idle ticks for a single session.
#[derive(Debug, Clone)]
pub struct SessionAliver {
    max_ticks: u32,
    ticks_since_activity: u32,
}

impl SessionAliver {
    /// Creates a new aliver with the given maximum idle tick count.
    pub fn new(max_ticks: u32) -> Self {
        Self {
            max_ticks,
            ticks_since_activity: 0,
        }
    }

    /// Advances the idle counter by one keepalive poll.
    pub fn tick(&mut self) {
        self.ticks_since_activity = self.ticks_since_activity.saturating_add(1);
    }

    /// Resets the idle counter; call this on any observed session activity.
    pub fn reset(&mut self) {
        self.ticks_since_activity = 0;
    }

    /// True once the idle counter has reached the configured maximum.
    pub fn is_dead(&self) -> bool {
        self.ticks_since_activity >= self.max_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dies_after_max_ticks() {
        let mut aliver = SessionAliver::new(3);
        assert!(!aliver.is_dead());
        aliver.tick();
        aliver.tick();
        assert!(!aliver.is_dead());
        aliver.tick();
        assert!(aliver.is_dead());
    }

    #[test]
    fn reset_clears_idle_count() {
        let mut aliver = SessionAliver::new(2);
        aliver.tick();
        aliver.tick();
        assert!(aliver.is_dead());
        aliver.reset();
        assert!(!aliver.is_dead());
    }
}
