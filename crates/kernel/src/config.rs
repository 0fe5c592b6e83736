use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::saturating_duration;

/// World configuration: worker pool, clock, policies and per-frame limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Display name, used in logs.
    pub name: String,
    /// Worker threads for the async phase. `0` uses the global rayon pool.
    pub worker_threads: usize,
    /// Time step in seconds used by [`crate::World::update`].
    pub fixed_time_step: f64,
    /// Multiplier applied to every time step.
    pub clock_speed: f64,
    /// Whether simulation-only update functions run.
    pub simulation_enabled: bool,
    /// Log an error when a static object's transform is modified explicitly.
    pub report_static_transform_changes: bool,
    /// Time budget in milliseconds for the default init batch; `None` means
    /// the default batch always completes within the frame.
    pub default_init_batch_budget_ms: Option<f64>,
    /// How many times a queue is re-drained when handlers post more
    /// immediately-due messages into it.
    pub max_message_rounds: usize,
    /// Number of frames kept by the frame statistics window.
    pub frame_stats_window: usize,
    /// Seed of the world-local random stream.
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "world".to_string(),
            worker_threads: 0,
            fixed_time_step: 1.0 / 60.0,
            clock_speed: 1.0,
            simulation_enabled: true,
            report_static_transform_changes: true,
            default_init_batch_budget_ms: None,
            max_message_rounds: 8,
            frame_stats_window: 120,
            seed: 0,
        }
    }
}

impl WorldConfig {
    pub fn fixed_step(&self) -> Duration {
        saturating_duration(self.fixed_time_step)
    }

    pub fn default_init_batch_budget(&self) -> Option<Duration> {
        self.default_init_batch_budget_ms
            .map(|ms| saturating_duration(ms / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.worker_threads, 0);
        assert!(config.simulation_enabled);
        assert_eq!(config.max_message_rounds, 8);
        assert!(config.default_init_batch_budget().is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: WorldConfig =
            serde_json::from_str(r#"{ "name": "arena", "worker_threads": 2 }"#).unwrap();
        assert_eq!(config.name, "arena");
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.frame_stats_window, 120);
    }

    #[test]
    fn out_of_range_steps_do_not_panic() {
        let config: WorldConfig =
            serde_json::from_str(r#"{ "fixed_time_step": 1e300, "default_init_batch_budget_ms": -4.0 }"#)
                .unwrap();
        assert_eq!(config.fixed_step(), Duration::MAX);
        assert_eq!(config.default_init_batch_budget(), Some(Duration::ZERO));
    }

    #[test]
    fn budget_converts_from_millis() {
        let config = WorldConfig {
            default_init_batch_budget_ms: Some(2.5),
            ..WorldConfig::default()
        };
        assert_eq!(
            config.default_init_batch_budget(),
            Some(Duration::from_micros(2500))
        );
    }
}
