use tracing::info;

use super::area::{AreaId, LayerSlot};
use super::layer::LayerRef;
use super::level::{PeriodSwitch, TimePeriodId};
use super::timer::TimerOwner;
use super::{AreaChanged, TimePeriodChanged, World};

impl World {
    /// Switches to the time period at `index`, landing in the area with the same key as
    /// the active one. Refused while the player's parts would overlap anything in the
    /// target area's main layer.
    pub fn switch_time_period(&mut self, index: usize) -> PeriodSwitch {
        let period = TimePeriodId(index);
        let Some(time_period) = self.level.time_period(period) else {
            info!(period = index, reason = "no_such_period", "time_period_switch_refused");
            return PeriodSwitch::NoSuchPeriod;
        };
        let active = self.level.active_area();
        let target = match active {
            Some(area) => time_period.area_for_key(self.areas[area.0].key()),
            None => time_period.default_area(),
        };
        let Some(target) = target else {
            info!(period = index, reason = "no_matching_area", "time_period_switch_refused");
            return PeriodSwitch::NoMatchingArea;
        };
        if active == Some(target) {
            return PeriodSwitch::AlreadyActive;
        }

        if let (Some(_), Some(player)) = (active, self.player) {
            let main = self.areas[target.0].layer_ref(LayerSlot::Main);
            if let Some(by) = self.first_blocker(player, main) {
                info!(
                    period = index,
                    blocker = by.0,
                    reason = "blocked",
                    "time_period_switch_refused"
                );
                return PeriodSwitch::Blocked { by };
            }
        }

        let from = self.level.active_time_period();
        self.level.set_active_time_period(period);
        info!(
            period = index,
            name = self.level.time_periods()[index].name(),
            "time_period_switched"
        );
        self.signals
            .time_period_changed
            .emit(&TimePeriodChanged { from, to: period });
        self.switch_area(target);
        PeriodSwitch::Switched {
            period,
            area: target,
        }
    }

    /// Moves the player (and whatever it carries) into `area` without an occupancy check.
    /// Timers owned by the area being left are stopped.
    pub fn switch_area(&mut self, area: AreaId) {
        assert!(area.0 < self.areas.len(), "unknown area {area:?}");
        let from = self.level.active_area();
        let player = self.player;
        let current_layer = player
            .and_then(|id| self.entities.get(id))
            .and_then(|entity| entity.layer);

        if let (Some(id), Some(_)) = (player, current_layer) {
            self.remove_from_layer(&[id]);
        }
        if let Some(previous) = from.filter(|previous| *previous != area) {
            let stopped = self.timers.stop_owned_by(TimerOwner::Area(previous));
            if stopped > 0 {
                info!(area = previous.0, stopped, "area_timers_stopped");
            }
        }

        let index = current_layer
            .map(|layer| layer.index)
            .filter(|index| *index < self.areas[area.0].layers().len())
            .unwrap_or(LayerSlot::Main.index());
        self.level.set_active_area(area);
        if let Some(id) = player {
            self.add_to_layer(LayerRef { area, index }, &[id]);
        }

        info!(
            from = ?from.map(|previous| previous.0),
            to = area.0,
            key = self.areas[area.0].key(),
            "area_switched"
        );
        self.signals.area_changed.emit(&AreaChanged { from, to: area });
    }
}
