//! Bitstream codec: tree subtrees to packets and back.
//!
//! A subtree section is the wire octal code of its root followed by one
//! recursive level per tree level. Each level carries up to three bitmask
//! bytes - which children have color, which exist in the tree, and which
//! continue in this packet - then 3 bytes of RGB per colored child, then the
//! continuing children in descending-priority order.
//!
//! Encoding never errors: every reason to stop short of a full subtree is a
//! [`StopReason`], and a section that ran out of packet room re-queues its
//! element so the next packet resumes exactly there.

use glam::Vec3;

use crate::bag::ElementBag;
use crate::constants::{
  boundary_distance_for_render_level, CHANGE_FUDGE_USECS, MAX_TREE_DEPTH, TREE_SCALE,
};
use crate::coverage::{CoverageMap, CoverageResult};
use crate::cube::AACube;
use crate::element::{ElementId, OctreeElement, VoxelData};
use crate::error::ProtocolError;
use crate::frustum::{FrustumLocation, ViewFrustum};
use crate::jurisdiction::{Containment, JurisdictionMap};
use crate::octal_code::OctalCode;
use crate::packet_data::PacketData;
use crate::stats::SceneStats;
use crate::tree::TreeStore;

/// Why an encode stopped where it did. Control flow, not failure.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum StopReason {
  #[default]
  Unknown,
  /// Packet ran out of room; the element was re-queued for the next packet.
  DidntFit,
  /// Hit the maximum encode depth.
  TooDeep,
  /// Another server owns this subtree.
  OutOfJurisdiction,
  /// Too small on screen for the viewer's level of detail.
  LodSkip,
  /// Outside the view frustum.
  OutOfView,
  /// Inside the previous frustum and unchanged; a delta viewer has it.
  WasInView,
  /// Unchanged since the delta reference time.
  NoChange,
  /// Hidden behind nearer content already in the packet.
  Occluded,
}

/// Per-scene encode inputs. Borrowed state (frustums, jurisdiction,
/// coverage) lives outside so one params value serves a whole scene.
pub struct EncodeParams<'a> {
  pub max_encode_level: usize,
  pub view_frustum: Option<&'a ViewFrustum>,
  pub last_view_frustum: Option<&'a ViewFrustum>,
  /// Send only what changed since `delta_since`.
  pub want_delta: bool,
  /// Microsecond reference for delta comparisons.
  pub delta_since: u64,
  pub want_occlusion_culling: bool,
  pub include_color: bool,
  pub octree_size_scale: f32,
  pub boundary_level_adjust: u32,
  pub jurisdiction: Option<&'a JurisdictionMap>,
  pub coverage: Option<&'a mut CoverageMap>,
  /// Deepest level the traversal reached, for diagnostics.
  pub max_level_reached: usize,
  stop_reason: StopReason,
}

impl<'a> EncodeParams<'a> {
  pub fn new(octree_size_scale: f32) -> Self {
    Self {
      max_encode_level: MAX_TREE_DEPTH,
      view_frustum: None,
      last_view_frustum: None,
      want_delta: false,
      delta_since: 0,
      want_occlusion_culling: false,
      include_color: true,
      octree_size_scale,
      boundary_level_adjust: 0,
      jurisdiction: None,
      coverage: None,
      max_level_reached: 0,
      stop_reason: StopReason::Unknown,
    }
  }

  pub fn stop_reason(&self) -> StopReason {
    self.stop_reason
  }

  /// True when the element's cube is large enough on screen to render at
  /// this viewer's level of detail.
  fn should_render(&self, cube: &AACube, level: u32) -> bool {
    let Some(frustum) = self.view_frustum else {
      return true;
    };
    let distance = frustum.distance_to_camera(cube.center());
    let boundary =
      boundary_distance_for_render_level(level + self.boundary_level_adjust, self.octree_size_scale);
    distance < boundary
  }

  fn in_view(&self, cube: &AACube) -> bool {
    match self.view_frustum {
      Some(frustum) => frustum.cube_in_frustum(cube) != FrustumLocation::Outside,
      None => true,
    }
  }

  fn was_in_last_view(&self, cube: &AACube, level: u32) -> bool {
    let Some(last) = self.last_view_frustum else {
      return false;
    };
    if last.cube_in_frustum(cube) == FrustumLocation::Outside {
      return false;
    }
    // an element the old view saw only as part of a coarser LOD still
    // needs sending at the finer one
    let distance = last.distance_to_camera(cube.center());
    let boundary =
      boundary_distance_for_render_level(level + self.boundary_level_adjust, self.octree_size_scale);
    distance < boundary
  }

  fn element_changed(&self, element: &OctreeElement) -> bool {
    element.has_changed_since(self.delta_since.saturating_sub(CHANGE_FUDGE_USECS))
  }
}

/// Record skipped-element counters for one stop reason.
fn count_skip(stats: &mut SceneStats, reason: StopReason) {
  match reason {
    StopReason::LodSkip => stats.skipped_distance += 1,
    StopReason::OutOfView => stats.skipped_out_of_view += 1,
    StopReason::WasInView => stats.skipped_was_in_view += 1,
    StopReason::NoChange => stats.skipped_no_change += 1,
    StopReason::Occluded => stats.skipped_occluded += 1,
    StopReason::DidntFit => stats.didnt_fit += 1,
    _ => {}
  }
}

/// Encode the subtree rooted at `element_id` into `packet`. Returns the
/// bytes written; zero means nothing was kept and `params.stop_reason()`
/// says why. On [`StopReason::DidntFit`] the element (or the child that
/// failed) is back in `bag` so the scene resumes where it stopped.
pub fn encode_tree_bitstream(
  tree: &TreeStore,
  element_id: ElementId,
  packet: &mut PacketData,
  bag: &mut ElementBag,
  params: &mut EncodeParams<'_>,
  stats: &mut SceneStats,
) -> usize {
  params.stop_reason = StopReason::Unknown;
  let Some(element) = tree.element(element_id) else {
    // stale id: the subtree was deleted after it was queued
    return 0;
  };
  let cube = element.cube().scaled(TREE_SCALE);
  if !params.in_view(&cube) {
    params.stop_reason = StopReason::OutOfView;
    count_skip(stats, StopReason::OutOfView);
    return 0;
  }
  let code = element.code().clone();
  if !packet.start_subtree(&code) {
    params.stop_reason = StopReason::DidntFit;
    count_skip(stats, StopReason::DidntFit);
    bag.insert(element_id);
    return 0;
  }
  let code_bytes = code.wire_len();
  let child_bytes = encode_recursion(tree, element_id, packet, bag, params, stats, 0);
  if child_bytes == 0 {
    packet.discard_subtree();
    if params.stop_reason == StopReason::DidntFit {
      bag.insert(element_id);
    }
    return 0;
  }
  packet.end_subtree();
  code_bytes + child_bytes
}

fn encode_recursion(
  tree: &TreeStore,
  element_id: ElementId,
  packet: &mut PacketData,
  bag: &mut ElementBag,
  params: &mut EncodeParams<'_>,
  stats: &mut SceneStats,
  encode_level: usize,
) -> usize {
  let encode_level = encode_level + 1;
  params.max_level_reached = params.max_level_reached.max(encode_level);
  if encode_level >= params.max_encode_level {
    params.stop_reason = StopReason::TooDeep;
    return 0;
  }

  let Some(element) = tree.element(element_id) else {
    return 0;
  };
  stats.traversed += 1;
  if element.is_leaf() {
    stats.leaves += 1;
  } else {
    stats.internal += 1;
  }

  if let Some(jurisdiction) = params.jurisdiction {
    if jurisdiction.containment(element.code()) == Containment::Below {
      params.stop_reason = StopReason::OutOfJurisdiction;
      return 0;
    }
  }

  let cube = element.cube().scaled(TREE_SCALE);
  let level = element.level();
  if !params.should_render(&cube, level) {
    params.stop_reason = StopReason::LodSkip;
    count_skip(stats, StopReason::LodSkip);
    return 0;
  }
  if !params.in_view(&cube) {
    params.stop_reason = StopReason::OutOfView;
    count_skip(stats, StopReason::OutOfView);
    return 0;
  }
  if params.want_delta && !params.element_changed(element) {
    if params.was_in_last_view(&cube, level) {
      params.stop_reason = StopReason::WasInView;
      count_skip(stats, StopReason::WasInView);
    } else if params.last_view_frustum.is_none() {
      // pure-delta viewer with no view change: unchanged means skip
      params.stop_reason = StopReason::NoChange;
      count_skip(stats, StopReason::NoChange);
    } else {
      // newly visible but unchanged: still needs sending
      params.stop_reason = StopReason::Unknown;
    }
    if params.stop_reason != StopReason::Unknown {
      return 0;
    }
  }
  if params.want_occlusion_culling {
    if let (Some(frustum), Some(coverage)) = (params.view_frustum, params.coverage.as_mut()) {
      if let Some(polygon) = frustum.projected_polygon(&cube) {
        if coverage.check_and_store(&polygon, false) == CoverageResult::Occluded {
          params.stop_reason = StopReason::Occluded;
          count_skip(stats, StopReason::Occluded);
          return 0;
        }
      }
    }
  }

  let level_bracket = packet.start_level();

  // Children nearest the camera first: priority under tight budgets, and a
  // precondition of the coverage map.
  let sorted = sorted_children(tree, element, params.view_frustum);

  let mut colored_bits = 0u8;
  let mut exists_bits = 0u8;
  let mut in_packet_bits = 0u8;
  let mut child_colors: [Option<[u8; 3]>; 8] = [None; 8];

  for &(octant, child_id) in &sorted {
    exists_bits |= 1 << octant;
    let Some(child) = tree.element(child_id) else {
      continue;
    };
    let child_cube = child.cube().scaled(TREE_SCALE);
    if let Some(jurisdiction) = params.jurisdiction {
      if jurisdiction.containment(child.code()) == Containment::Below {
        continue;
      }
    }
    if !params.in_view(&child_cube) {
      count_skip(stats, StopReason::OutOfView);
      continue;
    }
    if !params.should_render(&child_cube, child.level()) {
      count_skip(stats, StopReason::LodSkip);
      continue;
    }
    if params.want_delta && !params.element_changed(child) {
      if params.was_in_last_view(&child_cube, child.level()) {
        count_skip(stats, StopReason::WasInView);
        continue;
      }
      if params.last_view_frustum.is_none() {
        // still view: unchanged children drop out of the delta entirely
        count_skip(stats, StopReason::NoChange);
        continue;
      }
      // newly visible but unchanged: still needs sending
    }
    // occlusion: test the child, and store colored children as occluders
    if params.want_occlusion_culling {
      if let (Some(frustum), Some(coverage)) = (params.view_frustum, params.coverage.as_mut()) {
        if let Some(polygon) = frustum.projected_polygon(&child_cube) {
          let is_solid = child.is_leaf() && child.data().is_some();
          match coverage.check_and_store(&polygon, is_solid) {
            CoverageResult::Occluded => {
              count_skip(stats, StopReason::Occluded);
              continue;
            }
            CoverageResult::Stored
            | CoverageResult::NotAllInView
            | CoverageResult::Visible => {}
          }
        }
      }
    }
    if params.include_color {
      if let Some(color) = child.average_color() {
        colored_bits |= 1 << octant;
        child_colors[octant as usize] = Some(color);
      }
    }
    if !child.is_leaf() {
      in_packet_bits |= 1 << octant;
    }
  }

  // Level payload: colored bitmask, colors, exists bitmasks.
  if packet.append_bitmask(colored_bits).is_none() {
    packet.discard_level(level_bracket);
    params.stop_reason = StopReason::DidntFit;
    count_skip(stats, StopReason::DidntFit);
    return 0;
  }
  stats.bitmasks_sent += 1;
  for color in child_colors.iter().flatten() {
    if !packet.append_color(*color) {
      packet.discard_level(level_bracket);
      params.stop_reason = StopReason::DidntFit;
      count_skip(stats, StopReason::DidntFit);
      return 0;
    }
    stats.colors_sent += 1;
  }
  if packet.settings().include_exists_bits {
    if packet.append_bitmask(exists_bits).is_none() {
      packet.discard_level(level_bracket);
      params.stop_reason = StopReason::DidntFit;
      count_skip(stats, StopReason::DidntFit);
      return 0;
    }
    stats.bitmasks_sent += 1;
    stats.existence_updates_sent += 1;
  }
  let in_packet_offset = match packet.append_bitmask(in_packet_bits) {
    Some(offset) => offset,
    None => {
      packet.discard_level(level_bracket);
      params.stop_reason = StopReason::DidntFit;
      count_skip(stats, StopReason::DidntFit);
      return 0;
    }
  };
  stats.bitmasks_sent += 1;

  // Recurse into continuing children, nearest first so near content wins
  // the byte budget. A child that writes nothing gets its bit patched off;
  // a child that ran out of room is bagged so the next packet picks it up.
  let mut final_in_packet = in_packet_bits;
  let mut sections: smallvec::SmallVec<[(u8, usize, usize); 8]> = smallvec::SmallVec::new();
  for &(octant, child_id) in &sorted {
    if in_packet_bits & (1 << octant) == 0 {
      continue;
    }
    let section_start = packet.uncompressed_size();
    let child_bytes =
      encode_recursion(tree, child_id, packet, bag, params, stats, encode_level);
    if child_bytes == 0 {
      final_in_packet &= !(1 << octant);
      if params.stop_reason == StopReason::DidntFit {
        bag.insert(child_id);
      }
    } else {
      sections.push((octant, section_start, child_bytes));
    }
  }
  if final_in_packet != in_packet_bits {
    packet.update_prior_bitmask(in_packet_offset, final_in_packet);
  }
  // The wire format is octant-ordered; when the priority order wrote the
  // sections shuffled, swap the byte ranges back into octant order.
  if sections.windows(2).any(|pair| pair[0].0 > pair[1].0) {
    let region_start = sections.iter().map(|s| s.1).min().unwrap_or(0);
    let mut by_octant = sections.clone();
    by_octant.sort_by_key(|s| s.0);
    let mut reordered = Vec::with_capacity(sections.iter().map(|s| s.2).sum());
    for &(_, start, len) in &by_octant {
      reordered.extend_from_slice(&packet.uncompressed_bytes()[start..start + len]);
    }
    packet.update_prior_bytes(region_start, &reordered);
  }

  let written = packet.end_level(level_bracket);
  // Degenerate section: a colored bitmask of zero plus an empty
  // continuation carries no information when exists bits are off.
  if written == 2
    && params.include_color
    && !packet.settings().include_exists_bits
    && colored_bits == 0
    && final_in_packet == 0
  {
    packet.discard_level(level_bracket);
    return 0;
  }
  // The level stop reason only survives if nothing was kept.
  params.stop_reason = StopReason::Unknown;
  written
}

fn sorted_children(
  tree: &TreeStore,
  element: &OctreeElement,
  frustum: Option<&ViewFrustum>,
) -> smallvec::SmallVec<[(u8, ElementId); 8]> {
  let mut children: smallvec::SmallVec<[(u8, ElementId); 8]> = element
    .children()
    .iter()
    .enumerate()
    .filter_map(|(octant, child)| child.map(|id| (octant as u8, id)))
    .collect();
  if let Some(frustum) = frustum {
    let position = frustum.position();
    children.sort_by(|a, b| {
      let da = child_distance(tree, a.1, position);
      let db = child_distance(tree, b.1, position);
      da.total_cmp(&db)
    });
  }
  children
}

fn child_distance(tree: &TreeStore, id: ElementId, position: Vec3) -> f32 {
  match tree.element(id) {
    Some(element) => position.distance_squared(element.cube().scaled(TREE_SCALE).center()),
    None => f32::INFINITY,
  }
}

// -------------------------------------------------------------------------
// Decode
// -------------------------------------------------------------------------

/// Decode-side toggles, mirroring the flags the packet was encoded with.
#[derive(Clone, Copy, Debug)]
pub struct DecodeParams {
  pub include_color: bool,
  pub include_exists_bits: bool,
}

impl Default for DecodeParams {
  fn default() -> Self {
    Self {
      include_color: true,
      include_exists_bits: true,
    }
  }
}

/// Apply a finalized (already inflated) bitstream to the tree. Returns the
/// bytes consumed. Unknown trailing bytes are an error, not a warning: a
/// misaligned stream would corrupt the tree silently otherwise.
pub fn read_bitstream_to_tree(
  tree: &mut TreeStore,
  bytes: &[u8],
  params: DecodeParams,
) -> Result<usize, ProtocolError> {
  let mut offset = 0;
  while offset < bytes.len() {
    let (code, code_bytes) = OctalCode::from_wire(&bytes[offset..])?;
    offset += code_bytes;
    let element = tree.get_or_create_path(&code);
    offset += read_element_data(tree, element, &bytes[offset..], params)?;
  }
  tree.reaverage();
  Ok(offset)
}

fn read_element_data(
  tree: &mut TreeStore,
  element_id: ElementId,
  bytes: &[u8],
  params: DecodeParams,
) -> Result<usize, ProtocolError> {
  let mut offset = 0;

  let colored_bits = if params.include_color {
    take(bytes, &mut offset, 1)?[0]
  } else {
    0
  };
  let mut colors: [Option<VoxelData>; 8] = [None; 8];
  for (octant, slot) in colors.iter_mut().enumerate() {
    if colored_bits & (1 << octant) != 0 {
      let rgb = take(bytes, &mut offset, 3)?;
      *slot = Some(VoxelData::new(rgb[0], rgb[1], rgb[2]));
    }
  }
  let exists_bits = if params.include_exists_bits {
    Some(take(bytes, &mut offset, 1)?[0])
  } else {
    None
  };
  let in_packet_bits = take(bytes, &mut offset, 1)?[0];
  let header = offset;

  let base_code = match tree.element(element_id) {
    Some(element) => element.code().clone(),
    None => return Err(ProtocolError::Truncated),
  };

  // Colors first: they may create leaves the continuation then descends into.
  for (octant, color) in colors.iter().enumerate() {
    if let Some(data) = color {
      let child_code = base_code.child(octant as u8);
      tree.insert(&child_code, *data);
    }
  }
  // Exists-in-tree bits are authoritative for delta viewers: a local child
  // the server no longer has gets pruned.
  if let Some(exists_bits) = exists_bits {
    for octant in 0..8u8 {
      if exists_bits & (1 << octant) == 0 {
        let child_code = base_code.child(octant);
        if tree.find_by_code(&child_code).is_some() {
          tree.delete(&child_code, false);
        }
      }
    }
  }
  let mut consumed = header;
  for octant in 0..8u8 {
    if in_packet_bits & (1 << octant) != 0 {
      let child_code = base_code.child(octant);
      let child = tree.get_or_create_path(&child_code);
      consumed += read_element_data(tree, child, &bytes[consumed..], params)?;
    }
  }
  Ok(consumed)
}

fn take<'a>(bytes: &'a [u8], offset: &mut usize, n: usize) -> Result<&'a [u8], ProtocolError> {
  let slice = bytes
    .get(*offset..*offset + n)
    .ok_or(ProtocolError::Truncated)?;
  *offset += n;
  Ok(slice)
}

/// Apply an erase-subtree stream: a run of wire octal codes, each deleting
/// the addressed subtree (pruning now-empty ancestors).
pub fn process_remove_bitstream(tree: &mut TreeStore, bytes: &[u8]) -> Result<usize, ProtocolError> {
  let mut offset = 0;
  let mut removed = 0;
  while offset < bytes.len() {
    let (code, code_bytes) = OctalCode::from_wire(&bytes[offset..])?;
    offset += code_bytes;
    if tree.delete(&code, true) {
      removed += 1;
    }
  }
  Ok(removed)
}

#[cfg(test)]
#[path = "encode_test.rs"]
mod encode_test;
