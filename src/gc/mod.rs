use std::{
    cell::Cell,
    collections::TryReserveError,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
};
use tracing::debug;

pub trait Trace: Sized {
    fn trace(&self, tracer: &mut Tracer<Self>);
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("could not grow the store: {0}")]
    Reserve(#[from] TryReserveError),
    #[error("the store is limited to {0} objects")]
    Exhausted(usize),
}

pub struct Tracer<'a, T: Trace> {
    slots: &'a [Slot<T>],
    pending: Vec<u32>,
}

impl<'a, T: Trace> Tracer<'a, T> {
    pub fn mark(&mut self, handle: Handle<T>) {
        if let Some(slot) = self.slots.get(handle.index as usize) {
            if slot.generation == handle.generation && slot.item.is_some() && !slot.marked.get() {
                slot.marked.set(true);
                self.pending.push(handle.index);
            }
        }
    }

    // Children are queued rather than visited recursively, so a long cons chain costs heap
    // space instead of native stack.
    fn drain(&mut self) -> usize {
        let slots = self.slots;
        let mut visited = 0;
        while let Some(index) = self.pending.pop() {
            if let Some(item) = &slots[index as usize].item {
                item.trace(self);
                visited += 1;
            }
        }
        visited
    }
}

struct Slot<T> {
    generation: u32,
    marked: Cell<bool>,
    item: Option<T>,
}

/// The object store.
///
/// Every inserted item is listed in a registry that the sweep walks. Slots freed by a sweep are
/// recycled, and their generation is bumped so that handles into the old occupant stop
/// resolving.
pub struct Heap<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: Vec<u32>,
    limit: Option<usize>,
    cycles: usize,
}

impl<T: Trace> Heap<T> {
    pub fn with_capacity(capacity: usize, limit: Option<usize>) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: Vec::with_capacity(capacity),
            limit,
            cycles: 0,
        }
    }

    pub fn insert(&mut self, item: T) -> Result<Handle<T>, AllocError> {
        if let Some(limit) = self.limit {
            if self.live.len() >= limit {
                return Err(AllocError::Exhausted(limit));
            }
        }

        if self.live.len() == self.live.capacity() {
            let additional = self.live.capacity().max(16);
            self.live.try_reserve_exact(additional)?;
            debug!(capacity = self.live.capacity(), "expanded store capacity");
        }

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].item = Some(item);
                index
            },
            None => {
                if self.slots.len() == self.slots.capacity() {
                    self.slots.try_reserve(self.slots.capacity().max(16))?;
                }
                self.slots.push(Slot {
                    generation: 0,
                    marked: Cell::new(false),
                    item: Some(item),
                });
                (self.slots.len() - 1) as u32
            },
        };
        self.live.push(index);

        Ok(Handle {
            index,
            generation: self.slots[index as usize].generation,
            phantom: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.item.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.item.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item=(Handle<T>, &T)> + '_ {
        self.live.iter().filter_map(move |&index| {
            let slot = &self.slots[index as usize];
            slot.item.as_ref().map(|item| (Handle {
                index,
                generation: slot.generation,
                phantom: PhantomData,
            }, item))
        })
    }

    /// Run one mark-and-sweep cycle, returning the number of items freed.
    pub fn clean(&mut self, roots: impl IntoIterator<Item=Handle<T>>) -> usize {
        // Mark
        let mut tracer = Tracer {
            slots: &self.slots,
            pending: Vec::new(),
        };
        for root in roots {
            tracer.mark(root);
        }
        let marked = tracer.drain();

        // Sweep
        let mut freed = 0;
        let mut i = 0;
        while i < self.live.len() {
            let index = self.live[i];
            let slot = &mut self.slots[index as usize];
            if slot.marked.get() {
                slot.marked.set(false);
                i += 1;
            } else {
                slot.item = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
                self.live.swap_remove(i);
                freed += 1;
            }
        }

        self.cycles += 1;
        debug!(cycle = self.cycles, marked, freed, live = self.live.len(), "collected");
        freed
    }

    pub fn stats(&self) -> Stats {
        Stats {
            live: self.live.len(),
            free_slots: self.free.len(),
            capacity: self.live.capacity(),
            cycles: self.cycles,
        }
    }
}

pub struct Handle<T> {
    index: u32,
    generation: u32,
    phantom: PhantomData<fn() -> T>,
}

impl<T> Copy for Handle<T> {}
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub live: usize,
    pub free_slots: usize,
    pub capacity: usize,
    pub cycles: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Node(Vec<Handle<Node>>);

    impl Trace for Node {
        fn trace(&self, tracer: &mut Tracer<Self>) {
            self.0.iter().for_each(|child| tracer.mark(*child));
        }
    }

    #[test]
    fn unreachable_items_are_freed() {
        let mut heap = Heap::with_capacity(4, None);
        let leaf = heap.insert(Node(vec![])).unwrap();
        let root = heap.insert(Node(vec![leaf])).unwrap();
        let garbage = heap.insert(Node(vec![leaf])).unwrap();

        assert_eq!(heap.clean(vec![root]), 1);
        assert!(heap.get(root).is_some());
        assert!(heap.get(leaf).is_some());
        assert!(heap.get(garbage).is_none());
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn cycles_terminate_and_survive() {
        let mut heap = Heap::with_capacity(4, None);
        let a = heap.insert(Node(vec![])).unwrap();
        let b = heap.insert(Node(vec![a])).unwrap();
        heap.get_mut(a).unwrap().0.push(b);

        assert_eq!(heap.clean(vec![a]), 0);
        assert_eq!(heap.clean(Vec::new()), 2);
        assert_eq!(heap.len(), 0);
    }

    #[test]
    fn recycled_slots_reject_stale_handles() {
        let mut heap = Heap::with_capacity(1, None);
        let old = heap.insert(Node(vec![])).unwrap();
        heap.clean(Vec::new());

        let new = heap.insert(Node(vec![])).unwrap();
        assert!(heap.get(old).is_none());
        assert!(heap.get(new).is_some());
        assert_ne!(old, new);
        assert_eq!(heap.stats().free_slots, 0);
    }

    #[test]
    fn marks_are_cleared_between_cycles() {
        let mut heap = Heap::with_capacity(2, None);
        let a = heap.insert(Node(vec![])).unwrap();
        heap.clean(vec![a]);
        assert_eq!(heap.clean(Vec::new()), 1);
        assert_eq!(heap.stats().cycles, 2);
    }

    #[test]
    fn long_chains_are_marked_without_recursion() {
        let mut heap = Heap::with_capacity(16, None);
        let mut head = heap.insert(Node(vec![])).unwrap();
        for _ in 0..200_000 {
            head = heap.insert(Node(vec![head])).unwrap();
        }
        assert_eq!(heap.clean(vec![head]), 0);
        assert_eq!(heap.len(), 200_001);
    }

    #[test]
    fn limit_is_enforced() {
        let mut heap = Heap::with_capacity(2, Some(2));
        heap.insert(Node(vec![])).unwrap();
        heap.insert(Node(vec![])).unwrap();
        assert_eq!(heap.insert(Node(vec![])).err(), Some(AllocError::Exhausted(2)));

        heap.clean(Vec::new());
        assert!(heap.insert(Node(vec![])).is_ok());
    }
}
