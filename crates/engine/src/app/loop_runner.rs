use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::content::ContentCompileError;
use crate::session::SessionError;
use crate::StartupError;

use super::metrics::MetricsAccumulator;
use super::MetricsHandle;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
    /// Pace ticks against the wall clock. When off, every frame advances exactly one
    /// fixed step and the loop never sleeps.
    pub realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 30,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: None,
            realtime: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load levels: {0}")]
    Content(#[from] ContentCompileError),
    #[error("failed to start session: {0}")]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Simulation,
    TickLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub reason: StopReason,
}

/// Something advanced by the fixed-step loop.
pub trait Simulation {
    fn tick(&mut self, fixed_dt: Duration) -> LoopControl;
}

/// Runs `sim` at a fixed step until it asks to stop or `max_ticks` is reached.
pub fn run_fixed_loop(
    config: &LoopConfig,
    sim: &mut dyn Simulation,
    metrics_handle: &MetricsHandle,
) -> LoopSummary {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        max_ticks = ?config.max_ticks,
        realtime = config.realtime,
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, last_frame_instant);
    let mut ticks = 0u64;

    let reason = 'frames: loop {
        let now = Instant::now();
        let frame_dt = if config.realtime {
            clamp_frame_delta(now.saturating_duration_since(last_frame_instant), max_frame_delta)
        } else {
            fixed_dt
        };
        last_frame_instant = now;
        accumulator = accumulator.saturating_add(frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            let tick_start = Instant::now();
            let control = sim.tick(fixed_dt);
            metrics_accumulator.record_tick(tick_start.elapsed());
            ticks = ticks.saturating_add(1);

            if control == LoopControl::Stop {
                break 'frames StopReason::Simulation;
            }
            if config.max_ticks.is_some_and(|max| ticks >= max) {
                break 'frames StopReason::TickLimit;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                total_ticks = snapshot.total_ticks,
                "loop_metrics"
            );
        }

        if config.realtime {
            thread::sleep(fixed_dt.saturating_sub(accumulator));
        }
    };

    metrics_handle.publish(metrics_accumulator.flush(Instant::now()));
    info!(ticks, reason = ?reason, "loop_stopped");
    LoopSummary { ticks, reason }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSim {
        ticks: u32,
        stop_after: Option<u32>,
        last_dt: Duration,
    }

    impl Simulation for CountingSim {
        fn tick(&mut self, fixed_dt: Duration) -> LoopControl {
            self.ticks += 1;
            self.last_dt = fixed_dt;
            if self.stop_after.is_some_and(|stop| self.ticks >= stop) {
                LoopControl::Stop
            } else {
                LoopControl::Continue
            }
        }
    }

    fn unthrottled(max_ticks: Option<u64>) -> LoopConfig {
        LoopConfig {
            max_ticks,
            realtime: false,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_keeps_partial_step() {
        let fixed_dt = Duration::from_millis(33);
        let result = plan_sim_steps(Duration::from_millis(40), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 1);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(7));
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn loop_stops_at_tick_limit() {
        let mut sim = CountingSim {
            ticks: 0,
            stop_after: None,
            last_dt: Duration::ZERO,
        };
        let metrics = MetricsHandle::default();

        let summary = run_fixed_loop(&unthrottled(Some(12)), &mut sim, &metrics);

        assert_eq!(summary, LoopSummary { ticks: 12, reason: StopReason::TickLimit });
        assert_eq!(sim.ticks, 12);
        assert_eq!(metrics.snapshot().total_ticks, 12);
    }

    #[test]
    fn simulation_can_stop_the_loop() {
        let mut sim = CountingSim {
            ticks: 0,
            stop_after: Some(4),
            last_dt: Duration::ZERO,
        };

        let summary = run_fixed_loop(&unthrottled(Some(100)), &mut sim, &MetricsHandle::default());

        assert_eq!(summary.reason, StopReason::Simulation);
        assert_eq!(summary.ticks, 4);
        assert_eq!(sim.last_dt, Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        assert_eq!(
            normalize_non_zero_duration(Duration::ZERO, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
        assert_eq!(
            normalize_non_zero_duration(Duration::from_millis(5), Duration::from_secs(1)),
            Duration::from_millis(5)
        );
    }
}
