//! Event queues drained by the caller
//!
//! Operations push domain events here instead of invoking listeners, so the
//! caller decides when and in which order to react. Queues are bounded: once
//! full, each new event evicts the oldest one.

use std::collections::VecDeque;
use tracing::trace;

/// Events a queue keeps before it starts dropping the oldest
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// An ordered, bounded queue of events of one type
#[derive(Debug, Clone)]
pub struct EventQueue<T> {
    events: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> EventQueue<T> {
    /// Create an empty queue holding up to [`DEFAULT_EVENT_CAPACITY`] events
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an empty queue holding up to `capacity` events (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Queue an event, dropping the oldest one if the queue is full
    pub fn push(&mut self, event: T) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
            trace!(dropped = self.dropped, "event queue full, oldest event dropped");
        }
        self.events.push_back(event);
    }

    /// Take every queued event, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        self.events.drain(..).collect()
    }

    /// Queued events without removing them, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events evicted because the queue was full, over the queue's lifetime
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
