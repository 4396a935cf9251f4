use std::collections::HashMap;

use crate::signal::{SubscriptionId, SubscriptionIdAllocator};

use super::entity::EntityId;
use super::eventbox::EventBoxId;
use super::layer::LayerRef;

/// Subscriber of an entity's move notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MoveObserver {
    /// The quad-tree of the layer holding the entity.
    Index(LayerRef),
    EventBox(EventBoxId),
}

#[derive(Debug, Default)]
pub(crate) struct MoveObservers {
    allocator: SubscriptionIdAllocator,
    by_entity: HashMap<EntityId, Vec<(SubscriptionId, MoveObserver)>>,
}

impl MoveObservers {
    pub(crate) fn subscribe(&mut self, entity: EntityId, observer: MoveObserver) -> SubscriptionId {
        let id = self.allocator.allocate();
        self.by_entity.entry(entity).or_default().push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, entity: EntityId, id: SubscriptionId) -> bool {
        let Some(list) = self.by_entity.get_mut(&entity) else {
            return false;
        };
        let before = list.len();
        list.retain(|(subscription, _)| *subscription != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.by_entity.remove(&entity);
        }
        removed
    }

    /// Observers of `entity` in subscription order.
    pub(crate) fn observers_of(&self, entity: EntityId) -> Vec<MoveObserver> {
        self.by_entity
            .get(&entity)
            .map(|list| list.iter().map(|(_, observer)| *observer).collect())
            .unwrap_or_default()
    }

    pub(crate) fn forget(&mut self, entity: EntityId) {
        self.by_entity.remove(&entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::area::AreaId;

    #[test]
    fn unsubscribe_removes_only_that_subscription() {
        let mut observers = MoveObservers::default();
        let entity = EntityId(4);
        let layer = LayerRef {
            area: AreaId(0),
            index: 2,
        };
        let index = observers.subscribe(entity, MoveObserver::Index(layer));
        observers.subscribe(entity, MoveObserver::EventBox(EventBoxId(1)));

        assert!(observers.unsubscribe(entity, index));
        assert!(!observers.unsubscribe(entity, index));
        assert_eq!(
            observers.observers_of(entity),
            vec![MoveObserver::EventBox(EventBoxId(1))]
        );
    }
}
