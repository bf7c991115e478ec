//! CoverageMap - screen-space occlusion accounting for one scene pass.
//!
//! During a front-to-back encode, the footprint of every opaque element that
//! made it into the packet is stored here; any later (therefore farther)
//! element whose footprint is fully covered by a stored one is skipped.
//! Correctness depends on insertion order: callers must test and store in
//! strictly near-to-far order, which the distance-sorted child recursion
//! guarantees.

use crate::frustum::ProjectedPolygon;

/// Outcome of [`CoverageMap::check_and_store`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CoverageResult {
  /// Fully behind stored occluders; skip the element and its subtree.
  Occluded,
  /// Visible, and its footprint was recorded as a new occluder.
  Stored,
  /// Visible, but the footprint straddles the viewport edge so it cannot
  /// be trusted as an occluder.
  NotAllInView,
  /// Visible; footprint intentionally not stored (non-occluding element).
  Visible,
}

#[derive(Default)]
pub struct CoverageMap {
  occluders: Vec<ProjectedPolygon>,
}

impl CoverageMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn occluder_count(&self) -> usize {
    self.occluders.len()
  }

  /// Test `polygon` against the stored occluders; when visible and
  /// `store` is set, record it as an occluder for later elements.
  pub fn check_and_store(&mut self, polygon: &ProjectedPolygon, store: bool) -> CoverageResult {
    for occluder in &self.occluders {
      if occluder.depth <= polygon.depth && occluder.covers(polygon) {
        return CoverageResult::Occluded;
      }
    }
    if !polygon.all_in_view {
      return CoverageResult::NotAllInView;
    }
    if !store {
      return CoverageResult::Visible;
    }
    self.occluders.push(*polygon);
    CoverageResult::Stored
  }

  /// Forget everything. A coverage map is only valid within one scene pass
  /// for one view, so it is erased whenever either changes.
  pub fn erase(&mut self) {
    self.occluders.clear();
  }
}

#[cfg(test)]
#[path = "coverage_test.rs"]
mod coverage_test;
