//! ViewerStreamState - everything one server remembers about one viewer.
//!
//! Tracks the viewer's query (view volume, rate, want-flags), the scene
//! traversal in flight (bag, coverage, stats), the last view a scene was
//! completed against, and the outgoing sequence number. The scheduler owns
//! one of these per connected viewer and drives it from its tick loop.

use voxel_octree::{
  CoverageMap, ElementBag, SceneStats, ViewFrustum, MAX_PACKET_SIZE,
};

use crate::message::OctreeQuery;

/// How long a view must hold still before it counts as stopped.
pub const VIEW_STABLE_USECS: u64 = 100_000;

/// Identical payloads within this window are suppressed, not resent.
pub const DUPLICATE_WINDOW_USECS: u64 = 1_000_000;

/// Degrees added to the viewer's field of view before server-side culling,
/// so elements just past the screen edge arrive before the camera turns to
/// them.
pub const VIEW_FRUSTUM_FOV_OVERSEND: f32 = 60.0;

pub struct ViewerStreamState {
  query: OctreeQuery,
  current_view: ViewFrustum,
  /// View the last completed scene was encoded against.
  last_sent_view: Option<ViewFrustum>,

  view_changed_since_scene: bool,
  view_moving: bool,
  last_view_change: u64,
  lod_changed: bool,

  /// Reference time for delta encoding: when the previous scene started.
  delta_since: u64,
  scene_start: u64,
  scene_in_progress: bool,

  sequence: u16,
  last_payload: Vec<u8>,
  last_payload_sent_at: u64,

  pub bag: ElementBag,
  pub coverage: CoverageMap,
  pub stats: SceneStats,
}

impl ViewerStreamState {
  pub fn new(query: OctreeQuery, now: u64) -> Self {
    let current_view = frustum_of(&query);
    Self {
      query,
      current_view,
      last_sent_view: None,
      view_changed_since_scene: true,
      view_moving: true,
      last_view_change: now,
      lod_changed: false,
      delta_since: 0,
      scene_start: 0,
      scene_in_progress: false,
      sequence: 0,
      last_payload: Vec::new(),
      last_payload_sent_at: 0,
      bag: ElementBag::new(),
      coverage: CoverageMap::new(),
      stats: SceneStats::default(),
    }
  }

  pub fn query(&self) -> &OctreeQuery {
    &self.query
  }

  pub fn current_view(&self) -> &ViewFrustum {
    &self.current_view
  }

  pub fn last_sent_view(&self) -> Option<&ViewFrustum> {
    self.last_sent_view.as_ref()
  }

  pub fn delta_since(&self) -> u64 {
    self.delta_since
  }

  pub fn scene_in_progress(&self) -> bool {
    self.scene_in_progress
  }

  pub fn is_view_moving(&self) -> bool {
    self.view_moving
  }

  pub fn view_changed_since_scene(&self) -> bool {
    self.view_changed_since_scene
  }

  /// True once any scene has been fully delivered to this viewer.
  pub fn has_completed_a_scene(&self) -> bool {
    self.last_sent_view.is_some()
  }

  /// Apply a fresh query from the viewer. Small view drifts are absorbed by
  /// the frustum hysteresis; real moves restart delta tracking, and LOD
  /// changes force the next scene to be a full one.
  pub fn update_query(&mut self, query: OctreeQuery, now: u64) {
    if query.octree_size_scale != self.query.octree_size_scale
      || query.boundary_level_adjust != self.query.boundary_level_adjust
    {
      self.lod_changed = true;
    }
    let new_view = frustum_of(&query);
    if !self.current_view.is_very_similar(&new_view) {
      self.current_view = new_view;
      self.view_changed_since_scene = true;
      self.view_moving = true;
      self.last_view_change = now;
    }
    self.query = query;
  }

  /// Per-tick view settling check. Returns true exactly once per move, on
  /// the tick the view is first considered stopped.
  pub fn view_just_stopped(&mut self, now: u64) -> bool {
    if self.view_moving && now.saturating_sub(self.last_view_change) >= VIEW_STABLE_USECS {
      self.view_moving = false;
      return true;
    }
    false
  }

  /// Full-scene decision: a viewer that just stopped moving gets a fresh
  /// complete scene unless delta tracking can cover the change, and an LOD
  /// change always forces one.
  pub fn should_send_full_scene(&mut self, now: u64) -> bool {
    let just_stopped = self.view_just_stopped(now);
    ((!self.view_changed_since_scene || !self.query.wants_delta()) && just_stopped)
      || self.lod_changed
  }

  /// Begin a new scene traversal.
  pub fn start_scene(&mut self, full_scene: bool, now: u64) {
    self.bag.clear();
    self.coverage.erase();
    self.stats.scene_started(full_scene, self.view_moving);
    self.scene_start = now;
    self.scene_in_progress = true;
    self.lod_changed = false;
  }

  /// The bag drained: the scene is complete. The view it was encoded
  /// against becomes the delta baseline.
  pub fn scene_completed(&mut self) {
    self.stats.scene_completed();
    self.last_sent_view = Some(self.current_view.clone());
    self.delta_since = self.scene_start;
    self.view_changed_since_scene = false;
    self.scene_in_progress = false;
  }

  pub fn sequence(&self) -> u16 {
    self.sequence
  }

  /// True when `payload` is an identical resend inside the duplicate
  /// window. A suppressed packet must not consume a sequence number (the
  /// viewer would see a phantom gap), so suppression is decided before
  /// [`Self::record_send`].
  pub fn is_duplicate_send(&self, payload: &[u8], now: u64) -> bool {
    payload == self.last_payload.as_slice()
      && now.saturating_sub(self.last_payload_sent_at) < DUPLICATE_WINDOW_USECS
  }

  /// Bookkeeping for a payload that actually goes out: remember it for
  /// duplicate checks and advance the sequence number.
  pub fn record_send(&mut self, payload: &[u8], now: u64) {
    self.last_payload.clear();
    self.last_payload.extend_from_slice(payload);
    self.last_payload_sent_at = now;
    self.sequence = self.sequence.wrapping_add(1);
  }

  /// Conservative per-packet payload budget left after our framing.
  pub fn payload_budget(&self) -> usize {
    MAX_PACKET_SIZE - crate::message::HEADER_SIZE - crate::message::DATA_PREAMBLE_SIZE
  }
}

fn frustum_of(query: &OctreeQuery) -> ViewFrustum {
  let mut frustum = ViewFrustum::default();
  frustum.set_position(query.position);
  frustum.set_orientation(query.orientation);
  frustum.set_field_of_view(query.field_of_view + VIEW_FRUSTUM_FOV_OVERSEND);
  frustum.set_aspect_ratio(query.aspect_ratio);
  frustum.set_near_clip(query.near_clip);
  frustum.set_far_clip(query.far_clip);
  frustum.calculate();
  frustum
}

#[cfg(test)]
#[path = "viewer_test.rs"]
mod viewer_test;
