//! The native side of the GC bridge.
//!
//! Every native instance bound into the engine is registered here under its
//! identity key together with its finalizer. Removal from the table IS
//! destruction: the finalizer runs and the strong reference drops, in that
//! order, exactly once per instance no matter which trigger removed it
//! (explicit dispose, the engine's unreachability notification, or tracker
//! teardown with its owning class).

use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// Runs just before the tracked instance's strong reference drops.
pub(crate) type Finalizer = Rc<dyn Fn(&Rc<dyn Any>)>;

struct Tracked {
    cell: Rc<dyn Any>,
    finalizer: Option<Finalizer>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        // Drop of the map entry is the single destruction point; every
        // removal path funnels through here.
        if let Some(finalizer) = self.finalizer.take() {
            finalizer(&self.cell);
        }
    }
}

/// Identity-keyed table of live tracked instances.
pub struct InstanceTracker {
    map: FxHashMap<usize, Tracked>,
}

impl InstanceTracker {
    pub fn new() -> Self {
        InstanceTracker {
            map: FxHashMap::default(),
        }
    }

    /// Identity key for a bound instance cell.
    pub(crate) fn identity(cell: &Rc<dyn Any>) -> usize {
        Rc::as_ptr(cell) as *const u8 as usize
    }

    pub(crate) fn track(&mut self, cell: Rc<dyn Any>, finalizer: Option<Finalizer>) -> usize {
        let id = Self::identity(&cell);
        self.map.insert(id, Tracked { cell, finalizer });
        id
    }

    /// Remove and destroy. Returns false when the id was already released,
    /// making repeat disposal a no-op.
    pub fn release(&mut self, id: usize) -> bool {
        self.map.remove(&id).is_some()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.map.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Destroy every remaining instance. Also what dropping the tracker
    /// does.
    pub fn collect(&mut self) {
        self.map.clear();
    }
}

impl Default for InstanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn counting_finalizer(counter: &Rc<Cell<usize>>) -> Finalizer {
        let counter = counter.clone();
        Rc::new(move |_| counter.set(counter.get() + 1))
    }

    fn tracked_cell(value: i32) -> Rc<dyn Any> {
        Rc::new(RefCell::new(value))
    }

    #[test]
    fn release_runs_the_finalizer_once() {
        let counter = Rc::new(Cell::new(0));
        let mut tracker = InstanceTracker::new();
        let id = tracker.track(tracked_cell(7), Some(counting_finalizer(&counter)));

        assert!(tracker.contains(id));
        assert!(tracker.release(id));
        assert_eq!(counter.get(), 1);

        // Repeat disposal is a no-op.
        assert!(!tracker.release(id));
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn dropping_the_tracker_destroys_survivors() {
        let counter = Rc::new(Cell::new(0));
        {
            let mut tracker = InstanceTracker::new();
            tracker.track(tracked_cell(1), Some(counting_finalizer(&counter)));
            tracker.track(tracked_cell(2), Some(counting_finalizer(&counter)));
        }
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn release_then_teardown_does_not_double_destroy() {
        let counter = Rc::new(Cell::new(0));
        {
            let mut tracker = InstanceTracker::new();
            let id = tracker.track(tracked_cell(3), Some(counting_finalizer(&counter)));
            tracker.release(id);
            assert_eq!(counter.get(), 1);
        }
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn release_drops_the_strong_reference() {
        let mut tracker = InstanceTracker::new();
        let cell: Rc<dyn Any> = Rc::new(RefCell::new(5));
        let weak = Rc::downgrade(&cell);
        let id = tracker.track(cell, None);

        assert!(weak.upgrade().is_some());
        tracker.release(id);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn collect_empties_the_table() {
        let counter = Rc::new(Cell::new(0));
        let mut tracker = InstanceTracker::new();
        tracker.track(tracked_cell(1), Some(counting_finalizer(&counter)));
        tracker.track(tracked_cell(2), Some(counting_finalizer(&counter)));
        tracker.collect();
        assert!(tracker.is_empty());
        assert_eq!(counter.get(), 2);
    }
}
