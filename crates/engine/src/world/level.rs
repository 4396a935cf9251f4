use super::area::AreaId;
use super::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimePeriodId(pub usize);

/// One era of the level: the areas that exist in it, keyed by location.
#[derive(Debug, Clone)]
pub struct TimePeriod {
    name: String,
    areas: Vec<(String, AreaId)>,
}

impl TimePeriod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            areas: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first area added becomes the default.
    pub fn default_area(&self) -> Option<AreaId> {
        self.areas.first().map(|(_, id)| *id)
    }

    pub fn area_for_key(&self, key: &str) -> Option<AreaId> {
        self.areas
            .iter()
            .find(|(area_key, _)| area_key == key)
            .map(|(_, id)| *id)
    }

    pub fn areas(&self) -> impl Iterator<Item = AreaId> + '_ {
        self.areas.iter().map(|(_, id)| *id)
    }

    /// Registers `area` under `key`, replacing any earlier area with the same key.
    pub(crate) fn add_area(&mut self, key: &str, area: AreaId) {
        if let Some(slot) = self.areas.iter_mut().find(|(area_key, _)| area_key == key) {
            slot.1 = area;
        } else {
            self.areas.push((key.to_string(), area));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Level {
    name: String,
    time_periods: Vec<TimePeriod>,
    active_area: Option<AreaId>,
    active_time_period: Option<TimePeriodId>,
    completed: bool,
}

impl Level {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time_periods(&self) -> &[TimePeriod] {
        &self.time_periods
    }

    pub fn time_period(&self, id: TimePeriodId) -> Option<&TimePeriod> {
        self.time_periods.get(id.0)
    }

    pub(crate) fn time_period_mut(&mut self, id: TimePeriodId) -> Option<&mut TimePeriod> {
        self.time_periods.get_mut(id.0)
    }

    pub(crate) fn push_time_period(&mut self, period: TimePeriod) -> TimePeriodId {
        self.time_periods.push(period);
        TimePeriodId(self.time_periods.len() - 1)
    }

    pub fn active_area(&self) -> Option<AreaId> {
        self.active_area
    }

    pub fn active_time_period(&self) -> Option<TimePeriodId> {
        self.active_time_period
    }

    pub(crate) fn set_active_area(&mut self, area: AreaId) {
        self.active_area = Some(area);
    }

    pub(crate) fn set_active_time_period(&mut self, period: TimePeriodId) {
        self.active_time_period = Some(period);
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }
}

/// Result of a time-period switch request. Refusals are ordinary outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSwitch {
    Switched {
        period: TimePeriodId,
        area: AreaId,
    },
    AlreadyActive,
    NoSuchPeriod,
    NoMatchingArea,
    Blocked {
        by: EntityId,
    },
}

impl PeriodSwitch {
    pub fn is_switched(&self) -> bool {
        matches!(self, PeriodSwitch::Switched { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_area_is_default_and_keys_resolve() {
        let mut period = TimePeriod::new("1999 AD");
        period.add_area("outside", AreaId(4));
        period.add_area("cave", AreaId(5));

        assert_eq!(period.default_area(), Some(AreaId(4)));
        assert_eq!(period.area_for_key("cave"), Some(AreaId(5)));
        assert_eq!(period.area_for_key("bluebox"), None);
    }

    #[test]
    fn readding_a_key_replaces_the_area() {
        let mut period = TimePeriod::new("600 AD");
        period.add_area("outside", AreaId(0));
        period.add_area("outside", AreaId(9));

        assert_eq!(period.areas().collect::<Vec<_>>(), vec![AreaId(9)]);
    }
}
