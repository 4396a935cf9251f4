use super::area::AreaId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Repeating,
    OneShot,
}

/// What a timer's lifetime is tied to. Area-owned timers are stopped when the player
/// leaves that area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOwner {
    Global,
    Area(AreaId),
}

#[derive(Debug)]
struct TimerEntry<A> {
    id: TimerId,
    interval_ms: f32,
    elapsed_ms: f32,
    mode: TimerMode,
    owner: TimerOwner,
    action: A,
}

/// Cooperative timers advanced by the fixed frame step, never by wall-clock time.
#[derive(Debug)]
pub struct TimerQueue<A> {
    next_id: u64,
    entries: Vec<TimerEntry<A>>,
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<A: Clone> TimerQueue<A> {
    pub fn schedule(
        &mut self,
        interval_ms: u32,
        mode: TimerMode,
        owner: TimerOwner,
        action: A,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.entries.push(TimerEntry {
            id,
            interval_ms: interval_ms as f32,
            elapsed_ms: 0.0,
            mode,
            owner,
            action,
        });
        id
    }

    pub fn stop(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn stop_owned_by(&mut self, owner: TimerOwner) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.owner != owner);
        before - self.entries.len()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advances every timer by `dt_ms` and returns the fired actions in schedule order.
    ///
    /// A repeating timer fires at most once per call and restarts its count from zero.
    pub fn advance(&mut self, dt_ms: f32) -> Vec<(TimerId, A)> {
        let mut fired = Vec::new();
        for entry in &mut self.entries {
            entry.elapsed_ms += dt_ms;
            if entry.elapsed_ms >= entry.interval_ms {
                entry.elapsed_ms = 0.0;
                fired.push((entry.id, entry.action.clone()));
            }
        }
        let entries = &mut self.entries;
        for (id, _) in &fired {
            if let Some(index) = entries
                .iter()
                .position(|entry| entry.id == *id && entry.mode == TimerMode::OneShot)
            {
                entries.remove(index);
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: f32 = 1000.0 / 30.0;

    #[test]
    fn repeating_timer_fires_every_interval() {
        let mut timers = TimerQueue::default();
        let id = timers.schedule(90, TimerMode::Repeating, TimerOwner::Global, "bob");

        let mut fire_ticks = Vec::new();
        for tick in 1..=12 {
            if !timers.advance(FRAME_MS).is_empty() {
                fire_ticks.push(tick);
            }
        }

        assert_eq!(fire_ticks, vec![3, 6, 9, 12]);
        assert!(timers.is_active(id));
    }

    #[test]
    fn one_shot_timer_fires_once_then_disappears() {
        let mut timers = TimerQueue::default();
        let id = timers.schedule(50, TimerMode::OneShot, TimerOwner::Global, 1u8);

        assert!(timers.advance(FRAME_MS).is_empty());
        assert_eq!(timers.advance(FRAME_MS), vec![(id, 1u8)]);
        assert!(timers.advance(FRAME_MS).is_empty());
        assert!(!timers.is_active(id));
    }

    #[test]
    fn stop_owned_by_only_drops_that_owner() {
        let mut timers = TimerQueue::default();
        timers.schedule(10, TimerMode::Repeating, TimerOwner::Area(AreaId(0)), 'a');
        timers.schedule(10, TimerMode::Repeating, TimerOwner::Area(AreaId(1)), 'b');
        let global = timers.schedule(10, TimerMode::Repeating, TimerOwner::Global, 'g');

        assert_eq!(timers.stop_owned_by(TimerOwner::Area(AreaId(0))), 1);
        let fired = timers
            .advance(FRAME_MS)
            .into_iter()
            .map(|(_, action)| action)
            .collect::<Vec<_>>();

        assert_eq!(fired, vec!['b', 'g']);
        assert!(timers.stop(global));
        assert_eq!(timers.len(), 1);
    }
}
