//! Bounded FIFO buffer with batch drain and head requeue

use std::collections::VecDeque;

/// FIFO of pending items
///
/// New items are refused once `capacity` is reached. Requeued batches go back to the
/// head in their original order and are never refused, so a failed flush cannot lose
/// what it drained.
#[derive(Debug)]
pub struct EventBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> EventBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self { items: VecDeque::new(), capacity }
    }

    /// Append an item; returns the new length, or the item back when full
    pub fn push(&mut self, item: T) -> Result<usize, T> {
        if self.items.len() >= self.capacity {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(self.items.len())
    }

    /// Remove up to `max` items from the head, oldest first
    pub fn drain_front(&mut self, max: usize) -> Vec<T> {
        let n = max.min(self.items.len());
        self.items.drain(..n).collect()
    }

    /// Put a drained batch back at the head, ahead of anything pushed since
    pub fn requeue_front(&mut self, batch: Vec<T>) {
        for item in batch.into_iter().rev() {
            self.items.push_front(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
