//! The authoritative playback clock.
//!
//! Stores a base anchor `(base_position, base_instant)` rather than a ticking
//! position, so the effective position is always computed on read. This is
//! what makes late-join trivial: there is no per-tick state to catch up on,
//! only a subtraction.

use std::time::{Duration, Instant};

/// Server-authoritative playback anchor.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    playing: bool,
    base_position: Duration,
    base_instant: Instant,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            playing: false,
            base_position: Duration::ZERO,
            base_instant: Instant::now(),
        }
    }

    /// Re-anchor the clock at `now` to `position`, with the given playing
    /// state. Called on every accepted host playback action.
    pub fn reanchor(&mut self, playing: bool, position: Duration, now: Instant) {
        self.playing = playing;
        self.base_position = position;
        self.base_instant = now;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The effective position at `now`: `base_position` if paused, or
    /// `base_position + (now - base_instant)` if playing.
    pub fn effective_position(&self, now: Instant) -> Duration {
        if self.playing {
            self.base_position + now.saturating_duration_since(self.base_instant)
        } else {
            self.base_position
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_position_is_constant() {
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        clock.reanchor(false, Duration::from_secs(5), t0);
        assert_eq!(clock.effective_position(t0), Duration::from_secs(5));
        assert_eq!(
            clock.effective_position(t0 + Duration::from_secs(10)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn playing_position_advances_with_real_time() {
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        clock.reanchor(true, Duration::from_secs(0), t0);
        let later = t0 + Duration::from_millis(2000);
        assert_eq!(clock.effective_position(later), Duration::from_millis(2000));
    }

    #[test]
    fn late_join_drift_matches_anchor_plus_elapsed() {
        // S1: host plays at t0+1s with currentTime=0; member joins at t0+3s.
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        let play_instant = t0 + Duration::from_secs(1);
        clock.reanchor(true, Duration::from_secs(0), play_instant);

        let join_instant = t0 + Duration::from_secs(3);
        let effective = clock.effective_position(join_instant);
        // joinInstant - playInstant == 2.0s, within 50ms tolerance.
        let expected = Duration::from_secs(2);
        let delta = if effective > expected {
            effective - expected
        } else {
            expected - effective
        };
        assert!(delta <= Duration::from_millis(50));
    }

    #[test]
    fn media_change_resets_to_zero_paused() {
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        clock.reanchor(true, Duration::from_secs(42), t0);
        clock.reanchor(false, Duration::ZERO, t0 + Duration::from_secs(1));
        assert!(!clock.is_playing());
        assert_eq!(
            clock.effective_position(t0 + Duration::from_secs(5)),
            Duration::ZERO
        );
    }
}
