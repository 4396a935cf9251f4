mod input;
mod loop_runner;
mod metrics;

pub use input::{InputAction, InputEvent, KeyState};
pub use loop_runner::{
    run_fixed_loop, AppError, LoopConfig, LoopControl, LoopSummary, Simulation, StopReason,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
