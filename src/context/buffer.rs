//! Bounded rolling context buffer

use std::collections::VecDeque;

/// Bounded insertion-ordered FIFO over recent signal values.
///
/// `push` evicts the oldest entry once capacity is reached. Insertion order
/// is the only meaningful order; there is no re-sorting.
#[derive(Debug, Clone)]
pub struct ContextBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> ContextBuffer<T> {
    /// Create a buffer holding at most `capacity` items.
    ///
    /// A zero capacity is clamped to 1 so `push` stays total.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, evicting the oldest entry when full.
    pub fn push(&mut self, item: T) {
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// The most recent item, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Up to `k` most recent items, most-recent-last.
    #[must_use]
    pub fn recent(&self, k: usize) -> Vec<&T> {
        let start = self.items.len().saturating_sub(k);
        self.items.iter().skip(start).collect()
    }

    /// All items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no items are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of items this buffer holds.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<'a, T> IntoIterator for &'a ContextBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_last_n_in_insertion_order() {
        let mut buf = ContextBuffer::new(3);
        for i in 0..7 {
            buf.push(i);
        }

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![4, 5, 6]);
    }

    #[test]
    fn latest_returns_most_recent() {
        let mut buf = ContextBuffer::new(2);
        assert!(buf.latest().is_none());

        buf.push("a");
        buf.push("b");
        buf.push("c");
        assert_eq!(buf.latest(), Some(&"c"));
    }

    #[test]
    fn recent_is_most_recent_last_and_clamped() {
        let mut buf = ContextBuffer::new(5);
        for i in 0..4 {
            buf.push(i);
        }

        assert_eq!(buf.recent(2), vec![&2, &3]);
        assert_eq!(buf.recent(10), vec![&0, &1, &2, &3]);
        assert!(buf.recent(0).is_empty());
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let mut buf = ContextBuffer::new(0);
        buf.push(1);
        buf.push(2);

        assert_eq!(buf.len(), 1);
        assert_eq!(buf.latest(), Some(&2));
    }
}
