use tracing::{debug, warn};

use super::entity::EntityId;
use super::timer::{TimerId, TimerMode, TimerOwner};
use super::{TimerAction, World};

const FLOAT_CYCLE: u32 = 10;

/// Bobbing animation: two 1px steps up, a pause of six steps, two steps down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FloatEffect {
    timer: TimerId,
    step: u32,
}

fn float_offset(step: u32) -> i32 {
    match step % FLOAT_CYCLE {
        0 | 1 => -1,
        8 | 9 => 1,
        _ => 0,
    }
}

impl World {
    /// Starts the float effect on `id`, or returns the running effect's timer.
    pub fn start_float(&mut self, id: EntityId) -> TimerId {
        if let Some(effect) = self.floats.get(&id) {
            return effect.timer;
        }
        assert!(self.entities.contains(id), "unknown entity {id:?}");
        let timer = self.timers.schedule(
            self.config.float_interval_ms,
            TimerMode::Repeating,
            TimerOwner::Global,
            TimerAction::Float(id),
        );
        self.floats.insert(id, FloatEffect { timer, step: 0 });
        debug!(entity = id.0, timer = timer.0, "float_started");
        timer
    }

    pub fn stop_float(&mut self, id: EntityId) -> bool {
        let Some(effect) = self.floats.remove(&id) else {
            return false;
        };
        self.timers.stop(effect.timer);
        debug!(entity = id.0, "float_stopped");
        true
    }

    pub fn is_floating(&self, id: EntityId) -> bool {
        self.floats.contains_key(&id)
    }

    pub(crate) fn step_float(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(id) else {
            warn!(entity = id.0, "timer_target_missing");
            return;
        };
        let reverse = entity.flags.reverse_gravity;
        let Some(effect) = self.floats.get_mut(&id) else {
            return;
        };
        let mut dy = float_offset(effect.step);
        effect.step = (effect.step + 1) % FLOAT_CYCLE;
        if reverse {
            dy = -dy;
        }
        if dy != 0 {
            self.teleport_by(id, 0, dy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_cycle_rises_pauses_then_sinks() {
        let offsets = (0..FLOAT_CYCLE).map(float_offset).collect::<Vec<_>>();
        assert_eq!(offsets, vec![-1, -1, 0, 0, 0, 0, 0, 0, 1, 1]);
        assert_eq!(offsets.iter().sum::<i32>(), 0);
    }
}
