//! Rate limiting for live broadcasts

use std::time::Duration;
use tokio::time::Instant;

/// Drops routine updates that arrive faster than `min_interval`.
/// Episode events always pass.
#[derive(Debug, Clone)]
pub struct BroadcastThrottle {
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl BroadcastThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
        }
    }

    /// Whether an update at `now` should go out; records the emission if so
    pub fn admit(&mut self, force: bool, now: Instant) -> bool {
        let due = self
            .last_emit
            .is_none_or(|last| now.duration_since(last) > self.min_interval);
        if force || due {
            self.last_emit = Some(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spacing() {
        let mut throttle = BroadcastThrottle::new(Duration::from_millis(33));
        let start = Instant::now();

        assert!(throttle.admit(false, start));
        assert!(!throttle.admit(false, start + Duration::from_millis(10)));
        assert!(!throttle.admit(false, start + Duration::from_millis(33)));
        assert!(throttle.admit(false, start + Duration::from_millis(34)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_always_passes() {
        let mut throttle = BroadcastThrottle::new(Duration::from_millis(33));
        let start = Instant::now();

        assert!(throttle.admit(false, start));
        assert!(throttle.admit(true, start + Duration::from_millis(1)));
        // forced emission restarts the window
        assert!(!throttle.admit(false, start + Duration::from_millis(30)));
    }
}
