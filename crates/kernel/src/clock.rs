use std::time::Duration;

/// Convert seconds to a [`Duration`] without panicking: negative and NaN
/// values give zero, values past [`Duration::MAX`] saturate.
pub fn saturating_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Simulation clock of one world.
///
/// Accumulated time only advances through [`WorldClock::begin_frame`], so
/// message delays and time-based logic are independent of wall-clock jitter.
#[derive(Debug, Clone)]
pub struct WorldClock {
    frame: u64,
    delta: Duration,
    elapsed: Duration,
    speed: f64,
}

impl WorldClock {
    pub fn new(speed: f64) -> Self {
        Self {
            frame: 0,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            speed: speed.max(0.0),
        }
    }

    /// Number of frames completed so far; also the number of the frame
    /// currently being updated.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Scaled time step of the current frame.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Total scaled time accumulated since the world was created.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.max(0.0);
    }

    pub(crate) fn begin_frame(&mut self, step: Duration) {
        self.delta = saturating_duration(step.as_secs_f64() * self.speed);
        self.elapsed = self.elapsed.saturating_add(self.delta);
    }

    pub(crate) fn end_frame(&mut self) {
        self.frame += 1;
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Deterministic per-world random stream.
///
/// Given the same seed and the same sequence of calls, every platform
/// produces the same values.
#[derive(Debug, Clone)]
pub struct WorldRandom {
    state: u64,
}

impl WorldRandom {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        splitmix64(self.state)
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform value in `[min, max)`.
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }
}

/// Splitmix64 finalizer: a fast, high-quality mixing function.
fn splitmix64(state: u64) -> u64 {
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_scales_step_by_speed() {
        let mut clock = WorldClock::new(2.0);
        clock.begin_frame(Duration::from_millis(10));
        assert_eq!(clock.delta(), Duration::from_millis(20));
        assert_eq!(clock.elapsed(), Duration::from_millis(20));
        clock.end_frame();
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn paused_clock_does_not_accumulate() {
        let mut clock = WorldClock::new(0.0);
        clock.begin_frame(Duration::from_secs(1));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn extreme_speeds_saturate_instead_of_panicking() {
        let mut clock = WorldClock::new(f64::INFINITY);
        clock.begin_frame(Duration::from_millis(10));
        assert_eq!(clock.delta(), Duration::MAX);
        clock.begin_frame(Duration::from_millis(10));
        assert_eq!(clock.elapsed(), Duration::MAX);
        clock.begin_frame(Duration::ZERO);
        assert_eq!(clock.delta(), Duration::ZERO);

        clock.set_speed(f64::NAN);
        clock.begin_frame(Duration::from_millis(10));
        assert_eq!(clock.delta(), Duration::ZERO);
    }

    #[test]
    fn second_conversion_clamps() {
        assert_eq!(saturating_duration(-1.0), Duration::ZERO);
        assert_eq!(saturating_duration(f64::NAN), Duration::ZERO);
        assert_eq!(saturating_duration(1e300), Duration::MAX);
        assert_eq!(saturating_duration(0.5), Duration::from_millis(500));
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = WorldRandom::new(42);
        let mut b = WorldRandom::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = WorldRandom::new(1);
        let mut b = WorldRandom::new(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn unit_floats_stay_in_range() {
        let mut rng = WorldRandom::new(7);
        for _ in 0..1000 {
            let v = rng.next_f32();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
