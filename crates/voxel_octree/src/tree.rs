//! Octree - the shared mutable tree and its traversals.
//!
//! [`TreeStore`] is the unlocked tree state; all operations are methods on
//! it so callers batch many operations inside one lock acquisition.
//! [`Octree`] wraps the store in a read/write lock and exposes guard-based
//! access with a caller-supplied [`LockPolicy`]: interactive callers (the
//! per-viewer send loops) prefer skipping a tick over stalling, batch
//! callers block.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use glam::Vec3;
use smallvec::SmallVec;

use crate::constants::TREE_SCALE;
use crate::cube::BoxFace;
use crate::element::{ElementArena, ElementId, OctreeElement, VoxelData};
use crate::octal_code::OctalCode;
use crate::time::timestamp_now;

/// How a traversal entry point should acquire the tree lock.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LockPolicy {
  /// Wait for the lock.
  Block,
  /// Give up immediately if the lock is contended.
  Try,
}

/// Traversal orders for [`TreeStore::traverse`].
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum TraversalOrder {
  /// Parent before children, octant order.
  Pre,
  /// Children before parent, octant order.
  Post,
  /// Parent first, children nearest-to-`point` first (point in meters).
  DistanceFrom(Vec3),
}

/// Visitor seam for generic traversal. `pre` returning false prunes the
/// subtree; `post` fires after all children.
pub trait Visitor {
  fn pre(&mut self, tree: &TreeStore, id: ElementId) -> bool;
  fn post(&mut self, _tree: &TreeStore, _id: ElementId) {}
}

/// Closure adapter: pre-hook only.
pub struct PreVisit<F: FnMut(&TreeStore, ElementId) -> bool>(pub F);

impl<F: FnMut(&TreeStore, ElementId) -> bool> Visitor for PreVisit<F> {
  fn pre(&mut self, tree: &TreeStore, id: ElementId) -> bool {
    (self.0)(tree, id)
  }
}

/// Result of a ray intersection query.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
  pub element: ElementId,
  /// Distance along the ray in meters.
  pub distance: f32,
  pub face: BoxFace,
}

/// The unlocked tree: arena plus root. The root element is created with the
/// store and never destroyed.
pub struct TreeStore {
  arena: ElementArena,
  root: ElementId,
  dirty: bool,
}

impl Default for TreeStore {
  fn default() -> Self {
    Self::new()
  }
}

impl TreeStore {
  pub fn new() -> Self {
    let mut arena = ElementArena::new();
    let root = arena.insert(OctalCode::root(), None, timestamp_now());
    Self {
      arena,
      root,
      dirty: false,
    }
  }

  #[inline]
  pub fn root(&self) -> ElementId {
    self.root
  }

  #[inline]
  pub fn arena(&self) -> &ElementArena {
    &self.arena
  }

  /// Resolve an id to its element, None if it has been freed since.
  #[inline]
  pub fn element(&self, id: ElementId) -> Option<&OctreeElement> {
    self.arena.get(id)
  }

  /// Number of live elements including the root.
  pub fn element_count(&self) -> usize {
    self.arena.len()
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  pub fn clear_dirty(&mut self) {
    self.dirty = false;
  }

  // ---------------------------------------------------------------------
  // Lookup
  // ---------------------------------------------------------------------

  /// Walk down from `start` toward `code`. Returns the deepest element on
  /// the path and whether it is an exact match.
  fn descend(&self, start: ElementId, code: &OctalCode) -> (ElementId, bool) {
    let mut current = start;
    let mut depth = match self.element(start) {
      Some(e) => e.code().depth(),
      None => return (start, false),
    };
    while depth < code.depth() {
      let octant = code.octant_at(depth) as usize;
      let Some(element) = self.element(current) else {
        return (current, false);
      };
      match element.child(octant) {
        Some(child) => {
          current = child;
          depth += 1;
        }
        None => return (current, false),
      }
    }
    (current, true)
  }

  /// Element addressed by `code`, or None when no exact node exists.
  /// "Not found" is an answer, not an error.
  pub fn find_by_code(&self, code: &OctalCode) -> Option<ElementId> {
    match self.descend(self.root, code) {
      (id, true) => Some(id),
      _ => None,
    }
  }

  /// Exact element at the unit-space cube `(x, y, z, scale)`.
  pub fn find_at(&self, x: f32, y: f32, z: f32, scale: f32) -> Option<ElementId> {
    let code = OctalCode::for_cube(x, y, z, scale)?;
    self.find_by_code(&code)
  }

  /// Nearest existing ancestor when there is no exact element at the cube.
  pub fn find_enclosing(&self, x: f32, y: f32, z: f32, scale: f32) -> Option<ElementId> {
    let code = OctalCode::for_cube(x, y, z, scale)?;
    Some(self.descend(self.root, &code).0)
  }

  // ---------------------------------------------------------------------
  // Edits
  // ---------------------------------------------------------------------

  /// Element at `code`, synthesizing any missing intermediate nodes.
  pub fn get_or_create_path(&mut self, code: &OctalCode) -> ElementId {
    let now = timestamp_now();
    let mut current = self.root;
    let mut current_code = OctalCode::root();
    for level in 0..code.depth() {
      let octant = code.octant_at(level);
      // an octant selector >= 8 cannot come out of OctalCode; the
      // debug_assert documents the programmer-error contract
      debug_assert!(octant < 8);
      current_code = current_code.child(octant);
      let existing = self
        .arena
        .get(current)
        .and_then(|e| e.child(octant as usize));
      current = match existing {
        Some(child) => child,
        None => {
          let child = self.arena.insert(current_code.clone(), Some(current), now);
          self.arena.set_child(current, octant as usize, Some(child));
          child
        }
      };
    }
    current
  }

  /// Insert (or overwrite) the payload at `code`, synthesizing missing
  /// ancestors. Bumps change timestamps up the ancestor chain.
  pub fn insert(&mut self, code: &OctalCode, data: VoxelData) -> ElementId {
    let now = timestamp_now();
    let id = self.get_or_create_path(code);
    self.arena.set_data(id, Some(data), now);
    self.touch_ancestors(id, now);
    self.reaverage_upward(id);
    self.dirty = true;
    id
  }

  /// Delete the element at `code` along with its subtree. When
  /// `collapse_empty` is set, ancestors left childless and without payload
  /// are removed too (the root always survives).
  pub fn delete(&mut self, code: &OctalCode, collapse_empty: bool) -> bool {
    let Some(id) = self.find_by_code(code) else {
      return false;
    };
    if id == self.root {
      // deleting "the root" means clearing the tree, not freeing the slot
      self.erase_all();
      return true;
    }
    let now = timestamp_now();
    let parent = self.element(id).and_then(|e| e.parent());
    let octant = code.octant_at(code.depth() - 1) as usize;
    if let Some(parent) = parent {
      self.arena.set_child(parent, octant, None);
    }
    self.free_subtree(id);

    if let Some(mut ancestor) = parent {
      self.touch_ancestors_from(ancestor, now);
      self.reaverage_upward_from(ancestor);
      if collapse_empty {
        while ancestor != self.root {
          let Some(element) = self.element(ancestor) else {
            break;
          };
          if element.child_count() > 0 || element.data().is_some() {
            break;
          }
          let code = element.code().clone();
          let grand = element.parent();
          let octant = code.octant_at(code.depth() - 1) as usize;
          if let Some(grand) = grand {
            self.arena.set_child(grand, octant, None);
          }
          self.arena.remove(ancestor);
          match grand {
            Some(g) => ancestor = g,
            None => break,
          }
        }
      }
    }
    self.dirty = true;
    true
  }

  /// Remove every element except the root.
  pub fn erase_all(&mut self) {
    let children: SmallVec<[ElementId; 8]> = match self.element(self.root) {
      Some(root) => root.children().iter().flatten().copied().collect(),
      None => return,
    };
    for child in children {
      self.free_subtree(child);
    }
    for octant in 0..8 {
      self.arena.set_child(self.root, octant, None);
    }
    let now = timestamp_now();
    self.arena.set_data(self.root, None, now);
    self.arena.set_average_color(self.root, None);
    self.dirty = true;
  }

  fn free_subtree(&mut self, id: ElementId) {
    let children: SmallVec<[ElementId; 8]> = match self.element(id) {
      Some(e) => e.children().iter().flatten().copied().collect(),
      None => return,
    };
    for child in children {
      self.free_subtree(child);
    }
    self.arena.remove(id);
  }

  fn touch_ancestors(&mut self, id: ElementId, now: u64) {
    self.arena.touch(id, now);
    if let Some(parent) = self.element(id).and_then(|e| e.parent()) {
      self.touch_ancestors_from(parent, now);
    }
  }

  fn touch_ancestors_from(&mut self, mut id: ElementId, now: u64) {
    loop {
      self.arena.touch(id, now);
      match self.element(id).and_then(|e| e.parent()) {
        Some(parent) => id = parent,
        None => break,
      }
    }
  }

  /// Recompute cached average colors from `id` up to the root.
  fn reaverage_upward(&mut self, id: ElementId) {
    if let Some(parent) = self.element(id).and_then(|e| e.parent()) {
      self.reaverage_upward_from(parent);
    }
  }

  fn reaverage_upward_from(&mut self, mut id: ElementId) {
    loop {
      let average = self.average_of_children(id);
      self.arena.set_average_color(id, average);
      match self.element(id).and_then(|e| e.parent()) {
        Some(parent) => id = parent,
        None => break,
      }
    }
  }

  fn average_of_children(&self, id: ElementId) -> Option<[u8; 3]> {
    let element = self.element(id)?;
    let mut sum = [0u32; 3];
    let mut count = 0u32;
    for child in element.children().iter().flatten() {
      if let Some(color) = self.element(*child).and_then(|c| c.average_color()) {
        for axis in 0..3 {
          sum[axis] += color[axis] as u32;
        }
        count += 1;
      }
    }
    if count == 0 {
      return element.data().map(|d| d.color);
    }
    Some([
      (sum[0] / count) as u8,
      (sum[1] / count) as u8,
      (sum[2] / count) as u8,
    ])
  }

  /// Recompute all cached averages bottom-up. Used after bulk edits.
  pub fn reaverage(&mut self) {
    self.reaverage_subtree(self.root);
  }

  fn reaverage_subtree(&mut self, id: ElementId) {
    let children: SmallVec<[ElementId; 8]> = match self.element(id) {
      Some(e) => e.children().iter().flatten().copied().collect(),
      None => return,
    };
    for child in children {
      self.reaverage_subtree(child);
    }
    let average = self.average_of_children(id);
    self.arena.set_average_color(id, average);
  }

  // ---------------------------------------------------------------------
  // Traversal
  // ---------------------------------------------------------------------

  pub fn traverse<V: Visitor>(&self, order: TraversalOrder, visitor: &mut V) {
    self.traverse_from(self.root, order, visitor);
  }

  pub fn traverse_from<V: Visitor>(&self, id: ElementId, order: TraversalOrder, visitor: &mut V) {
    let Some(element) = self.element(id) else {
      return;
    };
    let descend = match order {
      TraversalOrder::Post => true,
      _ => visitor.pre(self, id),
    };
    if descend {
      match order {
        TraversalOrder::Pre | TraversalOrder::Post => {
          for child in element.children().iter().flatten() {
            self.traverse_from(*child, order, visitor);
          }
        }
        TraversalOrder::DistanceFrom(point) => {
          let mut sorted: SmallVec<[(f32, ElementId); 8]> = element
            .children()
            .iter()
            .flatten()
            .filter_map(|&child| {
              let center = self.element(child)?.cube().scaled(TREE_SCALE).center();
              Some((point.distance_squared(center), child))
            })
            .collect();
          sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
          for (_, child) in sorted {
            self.traverse_from(child, order, visitor);
          }
        }
      }
    }
    visitor.post(self, id);
  }

  // ---------------------------------------------------------------------
  // Geometry queries (coordinates in meters)
  // ---------------------------------------------------------------------

  /// Nearest populated leaf hit by the ray, if any.
  pub fn intersect_ray(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
    self.intersect_ray_from(self.root, origin, direction)
  }

  fn intersect_ray_from(&self, id: ElementId, origin: Vec3, direction: Vec3) -> Option<RayHit> {
    let element = self.element(id)?;
    let cube = element.cube().scaled(TREE_SCALE);
    let (distance, face) = cube.find_ray_intersection(origin, direction)?;
    if element.is_leaf() {
      return element.data().map(|_| RayHit {
        element: id,
        distance,
        face,
      });
    }
    let mut best: Option<RayHit> = None;
    for child in element.children().iter().flatten() {
      if let Some(hit) = self.intersect_ray_from(*child, origin, direction) {
        if best.map_or(true, |b| hit.distance < b.distance) {
          best = Some(hit);
        }
      }
    }
    best
  }

  /// Deepest penetration of a sphere into any populated leaf, or None when
  /// nothing overlaps.
  pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<Vec3> {
    let mut penetration = Vec3::ZERO;
    let mut any = false;
    self.intersect_sphere_from(self.root, center, radius, &mut penetration, &mut any);
    any.then_some(penetration)
  }

  fn intersect_sphere_from(
    &self,
    id: ElementId,
    center: Vec3,
    radius: f32,
    penetration: &mut Vec3,
    any: &mut bool,
  ) {
    let Some(element) = self.element(id) else {
      return;
    };
    let cube = element.cube().scaled(TREE_SCALE);
    if !cube.touches_sphere(center, radius) {
      return;
    }
    if element.is_leaf() {
      if element.data().is_some() {
        if let Some(p) = cube.find_sphere_penetration(center, radius) {
          // keep the deepest single-axis push; stacking pushes from
          // adjacent leaves overshoots
          if p.length_squared() > penetration.length_squared() {
            *penetration = p;
          }
          *any = true;
        }
      }
      return;
    }
    for child in element.children().iter().flatten() {
      self.intersect_sphere_from(*child, center, radius, penetration, any);
    }
  }
}

/// The lockable tree. Encode calls hold a read guard for exactly one
/// subtree-encode (bounded by the byte budget); edits take the write guard.
pub struct Octree {
  store: RwLock<TreeStore>,
}

impl Default for Octree {
  fn default() -> Self {
    Self::new()
  }
}

impl Octree {
  pub fn new() -> Self {
    Self {
      store: RwLock::new(TreeStore::new()),
    }
  }

  /// Acquire a read guard. `Try` returns None when contended instead of
  /// blocking. A poisoned lock is recovered rather than propagated: the
  /// store holds no invariants that a panicking reader can break.
  pub fn read(&self, policy: LockPolicy) -> Option<RwLockReadGuard<'_, TreeStore>> {
    match policy {
      LockPolicy::Block => match self.store.read() {
        Ok(guard) => Some(guard),
        Err(poisoned) => {
          tracing::warn!("octree lock poisoned by a panicked holder; recovering");
          Some(poisoned.into_inner())
        }
      },
      LockPolicy::Try => self.store.try_read().ok(),
    }
  }

  /// Acquire a write guard; same policy semantics as [`Octree::read`].
  pub fn write(&self, policy: LockPolicy) -> Option<RwLockWriteGuard<'_, TreeStore>> {
    match policy {
      LockPolicy::Block => match self.store.write() {
        Ok(guard) => Some(guard),
        Err(poisoned) => {
          tracing::warn!("octree lock poisoned by a panicked holder; recovering");
          Some(poisoned.into_inner())
        }
      },
      LockPolicy::Try => self.store.try_write().ok(),
    }
  }

  /// Ray query with lock policy. The bool is false when the query was
  /// skipped because the lock was contended (inaccurate result).
  pub fn intersect_ray(
    &self,
    origin: Vec3,
    direction: Vec3,
    policy: LockPolicy,
  ) -> (Option<RayHit>, bool) {
    match self.read(policy) {
      Some(store) => (store.intersect_ray(origin, direction), true),
      None => (None, false),
    }
  }

  /// Sphere query with lock policy; same accuracy contract as
  /// [`Octree::intersect_ray`].
  pub fn intersect_sphere(
    &self,
    center: Vec3,
    radius: f32,
    policy: LockPolicy,
  ) -> (Option<Vec3>, bool) {
    match self.read(policy) {
      Some(store) => (store.intersect_sphere(center, radius), true),
      None => (None, false),
    }
  }
}

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
