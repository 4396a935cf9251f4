use std::fmt;

/// Token returned by every subscription; holders pass it back to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

#[derive(Debug, Default)]
pub(crate) struct SubscriptionIdAllocator {
    next: u64,
}

impl SubscriptionIdAllocator {
    pub(crate) fn allocate(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

type Slot<T> = Box<dyn FnMut(&T)>;

/// Synchronous observer list. Subscribers run in registration order on `emit`.
pub struct Signal<T> {
    allocator: SubscriptionIdAllocator,
    slots: Vec<(SubscriptionId, Slot<T>)>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            allocator: SubscriptionIdAllocator::default(),
            slots: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.slots.len())
            .finish()
    }
}

impl<T> Signal<T> {
    pub fn connect<F>(&mut self, slot: F) -> SubscriptionId
    where
        F: FnMut(&T) + 'static,
    {
        let id = self.allocator.allocate();
        self.slots.push((id, Box::new(slot)));
        id
    }

    pub fn disconnect(&mut self, id: SubscriptionId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(slot_id, _)| *slot_id != id);
        self.slots.len() != before
    }

    pub fn emit(&mut self, value: &T) {
        for (_, slot) in &mut self.slots {
            slot(value);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn emit_runs_subscribers_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut signal = Signal::<u32>::default();
        let first = Rc::clone(&log);
        signal.connect(move |value| first.borrow_mut().push(("a", *value)));
        let second = Rc::clone(&log);
        signal.connect(move |value| second.borrow_mut().push(("b", *value)));

        signal.emit(&7);

        assert_eq!(*log.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn disconnect_stops_delivery_once() {
        let hits = Rc::new(RefCell::new(0));
        let mut signal = Signal::<()>::default();
        let counter = Rc::clone(&hits);
        let id = signal.connect(move |_| *counter.borrow_mut() += 1);

        signal.emit(&());
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(&());

        assert_eq!(*hits.borrow(), 1);
        assert!(signal.is_empty());
    }
}
