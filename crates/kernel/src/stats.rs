use std::time::Duration;

use crate::scheduler::UpdatePhase;

/// Rolling window of frame durations for instrumentation.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    history: Vec<Duration>,
    capacity: usize,
    index: usize,
    filled: bool,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: vec![Duration::ZERO; capacity],
            capacity,
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn window(&self) -> &[Duration] {
        &self.history[..self.count()]
    }

    pub fn average(&self) -> Duration {
        let count = self.count();
        if count == 0 {
            return Duration::ZERO;
        }
        self.window().iter().sum::<Duration>() / count as u32
    }

    pub fn max(&self) -> Duration {
        self.window().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.window().iter().copied().min().unwrap_or(Duration::ZERO)
    }

    pub fn count(&self) -> usize {
        if self.filled {
            self.capacity
        } else {
            self.index
        }
    }
}

/// Counters describing the most recent frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCounters {
    pub frame: u64,
    pub update_functions_run: usize,
    pub messages_delivered: usize,
    pub objects_deleted: usize,
    pub components_deleted: usize,
    pub components_initialized: usize,
    pub objects_moved: usize,
}

/// Per-frame statistics: counters of the last frame plus rolling timings of
/// the whole frame and of every update phase.
#[derive(Debug, Clone)]
pub struct FrameStats {
    pub last: FrameCounters,
    pub frame_time: FrameTimer,
    phase_times: [FrameTimer; 4],
}

impl FrameStats {
    pub fn new(window: usize) -> Self {
        Self {
            last: FrameCounters::default(),
            frame_time: FrameTimer::new(window),
            phase_times: std::array::from_fn(|_| FrameTimer::new(window)),
        }
    }

    pub fn phase_time(&self, phase: UpdatePhase) -> &FrameTimer {
        &self.phase_times[phase.index()]
    }

    pub(crate) fn record_phase(&mut self, phase: UpdatePhase, dt: Duration) {
        self.phase_times[phase.index()].record(dt);
    }
}
