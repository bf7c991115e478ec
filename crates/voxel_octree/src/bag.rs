//! ElementBag - the pending-work queue of a viewer's scene traversal.
//!
//! Holds element ids whose subtrees still need encoding. Insertion is
//! idempotent (an element already waiting is not queued twice) and extraction
//! is FIFO, so a partially-sent scene resumes at the subtree where the last
//! packet ran out of room instead of restarting from the root.

use std::collections::HashSet;
use std::collections::VecDeque;

use crate::element::ElementId;

#[derive(Default)]
pub struct ElementBag {
  queue: VecDeque<ElementId>,
  queued: HashSet<ElementId>,
}

impl ElementBag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  pub fn len(&self) -> usize {
    self.queue.len()
  }

  /// Queue an element. Returns false when it was already waiting.
  pub fn insert(&mut self, id: ElementId) -> bool {
    if !self.queued.insert(id) {
      return false;
    }
    self.queue.push_back(id);
    true
  }

  /// Pop the oldest queued element.
  pub fn extract(&mut self) -> Option<ElementId> {
    let id = self.queue.pop_front()?;
    self.queued.remove(&id);
    Some(id)
  }

  pub fn contains(&self, id: ElementId) -> bool {
    self.queued.contains(&id)
  }

  pub fn clear(&mut self) {
    self.queue.clear();
    self.queued.clear();
  }
}

#[cfg(test)]
#[path = "bag_test.rs"]
mod bag_test;
