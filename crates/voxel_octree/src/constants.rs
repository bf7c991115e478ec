//! Shared constants for the octree and its wire protocol.
//!
//! The tree lives in unit space: the root cube is `[0,1)³` and each level
//! halves the edge. `TREE_SCALE` converts unit space to meters for all
//! camera-relative math (LOD distances, frustum tests, occlusion
//! projection).

/// Edge length of the root cube in meters.
pub const TREE_SCALE: f32 = 16384.0;

/// Number of children per element.
pub const NUMBER_OF_CHILDREN: usize = 8;

/// Deepest level the codec will walk. Codes longer than this are rejected
/// at the wire boundary.
pub const MAX_TREE_DEPTH: usize = 128;

/// Default viewer size scale. Controls how far away an element of a given
/// level is still worth sending; see [`boundary_distance_for_render_level`].
pub const DEFAULT_OCTREE_SIZE_SCALE: f32 = TREE_SCALE * 400.0;

/// Slop applied when comparing element change timestamps against the
/// last-sent time, so an edit racing the scene completion is not missed.
pub const CHANGE_FUDGE_USECS: u64 = 1000;

/// Largest datagram we will hand to the transport.
pub const MAX_PACKET_SIZE: usize = 1450;

/// Distance (meters) inside which an element at `render_level` is still
/// detailed enough to send. Scale halves per level: deeper elements must
/// be closer to matter.
#[inline]
pub fn boundary_distance_for_render_level(render_level: u32, size_scale: f32) -> f32 {
  size_scale / 2.0_f32.powi(render_level as i32)
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
