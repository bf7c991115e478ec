//! OctreeElement storage: a generational arena of tree nodes.
//!
//! Elements address each other by [`ElementId`] (index + generation) instead
//! of pointers. Children are exclusive references (a child belongs to exactly
//! one parent); the parent link is a non-owning back-reference. Queued or
//! otherwise retained ids are validated against the arena on use - a freed
//! slot bumps its generation, so a stale id simply fails to resolve.

use crate::cube::AACube;
use crate::octal_code::OctalCode;

/// RGB payload carried by a populated element.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct VoxelData {
  pub color: [u8; 3],
}

impl VoxelData {
  pub fn new(r: u8, g: u8, b: u8) -> Self {
    Self { color: [r, g, b] }
  }
}

/// Stable handle to an element slot. Survives arena growth; invalidated by
/// slot reuse.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ElementId {
  index: u32,
  generation: u32,
}

impl ElementId {
  #[inline]
  pub fn index(&self) -> usize {
    self.index as usize
  }
}

/// One node of the octree.
#[derive(Clone, Debug)]
pub struct OctreeElement {
  code: OctalCode,
  children: [Option<ElementId>; 8],
  parent: Option<ElementId>,
  data: Option<VoxelData>,
  /// Microsecond timestamp of the last change to this element or any
  /// descendant.
  last_changed: u64,
  /// Cached average color over populated descendants.
  average_color: Option<[u8; 3]>,
}

impl OctreeElement {
  fn new(code: OctalCode, parent: Option<ElementId>, now: u64) -> Self {
    Self {
      code,
      children: [None; 8],
      parent,
      data: None,
      last_changed: now,
      average_color: None,
    }
  }

  #[inline]
  pub fn code(&self) -> &OctalCode {
    &self.code
  }

  #[inline]
  pub fn child(&self, octant: usize) -> Option<ElementId> {
    self.children[octant]
  }

  #[inline]
  pub fn children(&self) -> &[Option<ElementId>; 8] {
    &self.children
  }

  #[inline]
  pub fn parent(&self) -> Option<ElementId> {
    self.parent
  }

  #[inline]
  pub fn data(&self) -> Option<&VoxelData> {
    self.data.as_ref()
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.iter().all(|c| c.is_none())
  }

  pub fn child_count(&self) -> usize {
    self.children.iter().filter(|c| c.is_some()).count()
  }

  #[inline]
  pub fn last_changed(&self) -> u64 {
    self.last_changed
  }

  /// True when this element (or a descendant) changed at or after `since`.
  #[inline]
  pub fn has_changed_since(&self, since: u64) -> bool {
    self.last_changed > since
  }

  /// Average color over populated descendants, or own color for a leaf.
  pub fn average_color(&self) -> Option<[u8; 3]> {
    self.average_color.or(self.data.map(|d| d.color))
  }

  /// Unit-space cube of this element.
  pub fn cube(&self) -> AACube {
    self.code.cube()
  }

  /// Tree level (root = 0).
  #[inline]
  pub fn level(&self) -> u32 {
    self.code.depth() as u32
  }
}

/// Generational slot arena holding all elements of one tree.
#[derive(Default)]
pub struct ElementArena {
  slots: Vec<Slot>,
  free: Vec<u32>,
  live: usize,
}

struct Slot {
  generation: u32,
  element: Option<OctreeElement>,
}

impl ElementArena {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of live elements.
  pub fn len(&self) -> usize {
    self.live
  }

  pub fn is_empty(&self) -> bool {
    self.live == 0
  }

  pub fn insert(&mut self, code: OctalCode, parent: Option<ElementId>, now: u64) -> ElementId {
    let element = OctreeElement::new(code, parent, now);
    self.live += 1;
    if let Some(index) = self.free.pop() {
      let slot = &mut self.slots[index as usize];
      slot.element = Some(element);
      ElementId {
        index,
        generation: slot.generation,
      }
    } else {
      let index = self.slots.len() as u32;
      self.slots.push(Slot {
        generation: 0,
        element: Some(element),
      });
      ElementId {
        index,
        generation: 0,
      }
    }
  }

  /// Free a slot. The id (and any copies of it held elsewhere, e.g. in an
  /// encode queue) stops resolving immediately.
  pub fn remove(&mut self, id: ElementId) -> Option<OctreeElement> {
    let slot = self.slots.get_mut(id.index())?;
    if slot.generation != id.generation || slot.element.is_none() {
      return None;
    }
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(id.index);
    self.live -= 1;
    slot.element.take()
  }

  pub fn get(&self, id: ElementId) -> Option<&OctreeElement> {
    let slot = self.slots.get(id.index())?;
    if slot.generation != id.generation {
      return None;
    }
    slot.element.as_ref()
  }

  pub fn get_mut(&mut self, id: ElementId) -> Option<&mut OctreeElement> {
    let slot = self.slots.get_mut(id.index())?;
    if slot.generation != id.generation {
      return None;
    }
    slot.element.as_mut()
  }

  /// True when the id still resolves to a live element.
  pub fn contains(&self, id: ElementId) -> bool {
    self.get(id).is_some()
  }

  // Internal mutators used by the tree; they keep element fields private to
  // this module so invariants (exclusive child ownership, aggregate cache)
  // stay enforceable in one place.

  pub(crate) fn set_child(&mut self, parent: ElementId, octant: usize, child: Option<ElementId>) {
    if let Some(element) = self.get_mut(parent) {
      element.children[octant] = child;
    }
  }

  pub(crate) fn set_data(&mut self, id: ElementId, data: Option<VoxelData>, now: u64) {
    if let Some(element) = self.get_mut(id) {
      element.data = data;
      element.last_changed = now;
    }
  }

  pub(crate) fn touch(&mut self, id: ElementId, now: u64) {
    if let Some(element) = self.get_mut(id) {
      element.last_changed = now;
    }
  }

  pub(crate) fn set_average_color(&mut self, id: ElementId, color: Option<[u8; 3]>) {
    if let Some(element) = self.get_mut(id) {
      element.average_color = color;
    }
  }
}

#[cfg(test)]
#[path = "element_test.rs"]
mod element_test;
