use crate::app::InputEvent;
use crate::geometry::Rect;
use crate::signal::Signal;

use super::area::AreaId;
use super::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventBoxId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBoxNotice {
    Entered(EntityId),
    Moved(EntityId),
    Exited(EntityId),
}

impl EventBoxNotice {
    pub fn entity(&self) -> EntityId {
        match self {
            EventBoxNotice::Entered(id) | EventBoxNotice::Moved(id) | EventBoxNotice::Exited(id) => {
                *id
            }
        }
    }

    pub fn phase(&self) -> EventBoxPhase {
        match self {
            EventBoxNotice::Entered(_) => EventBoxPhase::Entered,
            EventBoxNotice::Moved(_) => EventBoxPhase::Moved,
            EventBoxNotice::Exited(_) => EventBoxPhase::Exited,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBoxPhase {
    Entered,
    Moved,
    Exited,
}

/// World-side effect bound to an event box phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityAction {
    /// Applies to the entity that caused the notice.
    SetReverseGravity(bool),
    Show(EntityId),
    Hide(EntityId),
}

/// Trigger region made of one or more rects, tracking which watched entities are
/// inside it.
#[derive(Debug)]
pub struct EventBox {
    id: EventBoxId,
    area: AreaId,
    name: Option<String>,
    rects: Vec<Rect>,
    entered: Vec<EntityId>,
    bindings: Vec<(EventBoxPhase, EntityAction)>,
    pub notices: Signal<EventBoxNotice>,
    pub event_fired: Signal<InputEvent>,
}

impl EventBox {
    pub(crate) fn new(id: EventBoxId, area: AreaId, name: Option<String>) -> Self {
        Self {
            id,
            area,
            name,
            rects: Vec::new(),
            entered: Vec::new(),
            bindings: Vec::new(),
            notices: Signal::default(),
            event_fired: Signal::default(),
        }
    }

    pub fn id(&self) -> EventBoxId {
        self.id
    }

    pub fn area(&self) -> AreaId {
        self.area
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn add_rect(&mut self, rect: Rect) {
        self.rects.push(rect);
    }

    pub fn is_inside(&self, id: EntityId) -> bool {
        self.entered.contains(&id)
    }

    pub fn bind(&mut self, phase: EventBoxPhase, action: EntityAction) {
        self.bindings.push((phase, action));
    }

    pub(crate) fn actions_for(&self, phase: EventBoxPhase) -> Vec<EntityAction> {
        self.bindings
            .iter()
            .filter(|(bound, _)| *bound == phase)
            .map(|(_, action)| *action)
            .collect()
    }

    pub fn overlaps(&self, rect: &Rect) -> bool {
        rect.first_intersecting(&self.rects).is_some()
    }

    /// Updates the entered set for `id` now at `rect` and returns the notices to emit.
    pub(crate) fn evaluate(&mut self, id: EntityId, rect: Rect) -> Vec<EventBoxNotice> {
        if self.overlaps(&rect) {
            let mut notices = Vec::with_capacity(2);
            if !self.entered.contains(&id) {
                self.entered.push(id);
                notices.push(EventBoxNotice::Entered(id));
            }
            notices.push(EventBoxNotice::Moved(id));
            notices
        } else if self.entered.contains(&id) {
            self.entered.retain(|entered| *entered != id);
            vec![EventBoxNotice::Exited(id)]
        } else {
            Vec::new()
        }
    }

    /// Offers an input event to listeners. Returns whether anyone was listening.
    pub(crate) fn fire_event(&mut self, event: &InputEvent) -> bool {
        if self.event_fired.is_empty() {
            return false;
        }
        self.event_fired.emit(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_box() -> EventBox {
        let mut event_box = EventBox::new(EventBoxId(0), AreaId(0), None);
        event_box.add_rect(Rect::new(100, 100, 50, 50));
        event_box.add_rect(Rect::new(140, 100, 50, 50));
        event_box
    }

    #[test]
    fn enter_move_exit_sequence() {
        let mut event_box = event_box();
        let id = EntityId(1);

        assert!(event_box.evaluate(id, Rect::new(0, 0, 10, 10)).is_empty());
        assert_eq!(
            event_box.evaluate(id, Rect::new(95, 95, 10, 10)),
            vec![EventBoxNotice::Entered(id), EventBoxNotice::Moved(id)]
        );
        assert_eq!(
            event_box.evaluate(id, Rect::new(0, 0, 10, 10)),
            vec![EventBoxNotice::Exited(id)]
        );
        assert!(!event_box.is_inside(id));
    }

    #[test]
    fn overlapping_rects_never_repeat_entered() {
        let mut event_box = event_box();
        let id = EntityId(2);

        event_box.evaluate(id, Rect::new(110, 110, 10, 10));
        let inside_both = event_box.evaluate(id, Rect::new(141, 110, 5, 5));
        let inside_second = event_box.evaluate(id, Rect::new(170, 110, 5, 5));

        assert_eq!(inside_both, vec![EventBoxNotice::Moved(id)]);
        assert_eq!(inside_second, vec![EventBoxNotice::Moved(id)]);
        assert!(event_box.is_inside(id));
    }

    #[test]
    fn bindings_filter_by_phase() {
        let mut event_box = event_box();
        event_box.bind(EventBoxPhase::Entered, EntityAction::SetReverseGravity(true));
        event_box.bind(EventBoxPhase::Exited, EntityAction::SetReverseGravity(false));

        assert_eq!(
            event_box.actions_for(EventBoxPhase::Exited),
            vec![EntityAction::SetReverseGravity(false)]
        );
        assert!(event_box.actions_for(EventBoxPhase::Moved).is_empty());
    }
}
