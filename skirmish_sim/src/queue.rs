// Ordered command queue.
//
// Pending commands sorted ascending by their `Ord`. Insertion scans from the
// tail: commands almost always arrive in time order, so the common case is
// an append. Items that compare equal keep their arrival order.
//
// `peek`/`pop` on an empty queue is a caller bug and panics; the scheduler
// always checks `is_empty` first.
//
// See also: `scheduler.rs`, the only owner of a queue.

use std::collections::VecDeque;

#[derive(Clone, Debug)]
pub struct CommandQueue<T> {
    items: VecDeque<T>,
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T: Ord> CommandQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: T) {
        let mut at = self.items.len();
        while at > 0 && self.items[at - 1] > item {
            at -= 1;
        }
        self.items.insert(at, item);
    }

    /// The earliest item. Panics if the queue is empty.
    pub fn peek(&self) -> &T {
        match self.items.front() {
            Some(item) => item,
            None => panic!("CommandQueue::peek on an empty queue"),
        }
    }

    /// Remove the earliest item. Panics if the queue is empty.
    pub fn pop(&mut self) -> T {
        match self.items.pop_front() {
            Some(item) => item,
            None => panic!("CommandQueue::pop on an empty queue"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
