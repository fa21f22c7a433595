//! # Animation Clock
//!
//! Shader time, decoupled from wall-clock time. The clock is a two-state machine
//! (`Running` / `Paused`) whose only transition is [`AnimationClock::toggle`]. While
//! running, each [`AnimationClock::advance`] adds the wall-clock time since the previous
//! sample, scaled by the speed factor. While paused, the elapsed value is frozen but the
//! wall-clock sample keeps being refreshed, so resuming never jumps forward by the time
//! spent paused.
//!
//! The elapsed value may start below zero. That pre-roll is intentional.

use web_time::Instant;

/// Default multiplier applied to wall-clock time.
pub const DEFAULT_ANIMATION_SPEED: f64 = 3.0;

/// Whether the clock is currently accumulating time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClockState {
    Running,
    Paused,
}

#[derive(Debug, Clone)]
pub struct AnimationClock {
    elapsed: f64,
    speed: f64,
    state: ClockState,
    last_sample: Option<Instant>,
}

impl AnimationClock {
    /// Creates a running clock starting at `start` seconds of shader time.
    pub fn new(start: f64, speed: f64) -> Self {
        Self {
            elapsed: start,
            speed,
            state: ClockState::Running,
            last_sample: None,
        }
    }

    /// Samples the wall clock at `now` and returns the updated elapsed time.
    ///
    /// The first sample only seeds the clock. A `now` earlier than the previous sample
    /// counts as zero elapsed wall-clock time, so shader time never regresses.
    pub fn advance(&mut self, now: Instant) -> f64 {
        if let Some(last) = self.last_sample {
            if self.state == ClockState::Running {
                let delta = now.saturating_duration_since(last).as_secs_f64();
                self.elapsed += delta * self.speed;
            }
        }
        self.last_sample = Some(match self.last_sample {
            Some(last) if last > now => last,
            _ => now,
        });
        self.elapsed
    }

    /// Flips between running and paused.
    pub fn toggle(&mut self) -> ClockState {
        self.state = match self.state {
            ClockState::Running => ClockState::Paused,
            ClockState::Paused => ClockState::Running,
        };
        log::info!(
            "Animation clock {} at t = {:.3}",
            if self.is_paused() { "paused" } else { "resumed" },
            self.elapsed
        );
        self.state
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == ClockState::Paused
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

impl Default for AnimationClock {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_ANIMATION_SPEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_time::Duration;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn starts_running_at_pre_roll() {
        let clock = AnimationClock::new(-10.0, DEFAULT_ANIMATION_SPEED);
        assert_eq!(clock.state(), ClockState::Running);
        assert_eq!(clock.elapsed(), -10.0);
    }

    #[test]
    fn first_sample_only_seeds() {
        let mut clock = AnimationClock::default();
        assert_eq!(clock.advance(Instant::now()), 0.0);
    }

    #[test]
    fn running_clock_scales_wall_time() {
        let t0 = Instant::now();
        let mut clock = AnimationClock::default();
        clock.advance(t0);
        let elapsed = clock.advance(t0 + Duration::from_millis(500));
        assert!((elapsed - 1.5).abs() < EPSILON);
    }

    #[test]
    fn pause_freezes_and_resume_does_not_jump() {
        let t0 = Instant::now();
        let mut clock = AnimationClock::new(2.0, DEFAULT_ANIMATION_SPEED);
        clock.advance(t0);

        assert_eq!(clock.toggle(), ClockState::Paused);
        let frozen = clock.advance(t0 + Duration::from_secs(5));
        assert_eq!(frozen, 2.0);
        assert_eq!(clock.advance(t0 + Duration::from_secs(60)), 2.0);

        assert_eq!(clock.toggle(), ClockState::Running);
        let delta = Duration::from_millis(250);
        let resumed = clock.advance(t0 + Duration::from_secs(60) + delta);
        assert!((resumed - (2.0 + 3.0 * delta.as_secs_f64())).abs() < EPSILON);
    }

    #[test]
    fn never_regresses() {
        let t0 = Instant::now();
        let mut clock = AnimationClock::default();
        clock.advance(t0 + Duration::from_secs(1));
        let before = clock.elapsed();
        clock.advance(t0);
        assert_eq!(clock.elapsed(), before);
        let after = clock.advance(t0 + Duration::from_secs(2));
        assert!((after - before - 3.0).abs() < EPSILON);
    }
}
