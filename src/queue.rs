//! RandomizedQueue (spec.md §4.A): an unordered multiset supporting
//! non-blocking `offer`/`remove`/`poll_random`, thread-safe for concurrent
//! use. "Random" only needs to mean "no caller may assume FIFO/LIFO" — a
//! uniform distribution is a nice-to-have, not a contract.

use parking_lot::Mutex;
use rand::Rng;

pub struct RandomizedQueue<T> {
    items: Mutex<Vec<T>>,
}

impl<T> RandomizedQueue<T> {
    pub fn new() -> Self {
        RandomizedQueue { items: Mutex::new(Vec::new()) }
    }

    /// Adds `item` to the bag.
    pub fn offer(&self, item: T) {
        self.items.lock().push(item);
    }

    /// Removes one element equal to `item`, if present. Best-effort: if
    /// duplicates exist, an unspecified one is removed.
    pub fn remove(&self, item: &T)
    where
        T: PartialEq,
    {
        let mut items = self.items.lock();
        if let Some(idx) = items.iter().position(|x| x == item) {
            items.swap_remove(idx);
        }
    }

    /// Removes and returns an arbitrary element, or `None` if empty.
    pub fn poll_random(&self) -> Option<T> {
        let mut items = self.items.lock();
        if items.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..items.len());
        Some(items.swap_remove(idx))
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for RandomizedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn offer_then_poll_random_returns_item() {
        let q = RandomizedQueue::new();
        q.offer(1);
        assert_eq!(q.poll_random(), Some(1));
        assert_eq!(q.poll_random(), None);
    }

    #[test]
    fn empty_queue_polls_none() {
        let q: RandomizedQueue<i32> = RandomizedQueue::new();
        assert_eq!(q.poll_random(), None);
    }

    #[test]
    fn remove_is_best_effort() {
        let q = RandomizedQueue::new();
        q.offer(1);
        q.offer(2);
        q.remove(&1);
        assert_eq!(q.len(), 1);
        // Removing again is a no-op, not an error.
        q.remove(&1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn poll_random_drains_every_element_exactly_once() {
        let q = RandomizedQueue::new();
        for i in 0..50 {
            q.offer(i);
        }
        let mut seen = HashSet::new();
        while let Some(x) = q.poll_random() {
            assert!(seen.insert(x), "duplicate element drained");
        }
        assert_eq!(seen.len(), 50);
    }
}
