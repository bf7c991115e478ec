//! voxel_octree - Mutable spatially-shared octree with a streaming codec
//!
//! This crate is the engine-independent core of the octree streaming stack:
//! a mutable octree of colored voxels addressed by octal codes, plus the
//! machinery to serialize view-dependent slices of it into bounded datagram
//! payloads and apply them on the receiving side.
//!
//! # Features
//!
//! - **Octal codes**: compact path addresses, one 3-bit octant per level,
//!   with a byte-comparable wire form
//! - **Generational arena storage**: elements reference each other by id,
//!   so queued work survives concurrent edits without dangling pointers
//! - **View-dependent encoding**: frustum culling, distance-based LOD,
//!   delta-since-last-scene suppression, and screen-space occlusion culling
//! - **Bounded packets**: every subtree section fits the datagram budget or
//!   is re-queued so the next packet resumes exactly where this one stopped

pub mod constants;
pub mod cube;
pub mod error;
pub mod octal_code;
pub mod time;

pub use constants::{
  boundary_distance_for_render_level, CHANGE_FUDGE_USECS, DEFAULT_OCTREE_SIZE_SCALE,
  MAX_PACKET_SIZE, MAX_TREE_DEPTH, NUMBER_OF_CHILDREN, TREE_SCALE,
};
pub use cube::{AACube, BoxFace};
pub use error::ProtocolError;
pub use octal_code::OctalCode;

// Tree storage and traversal
pub mod element;
pub mod tree;
pub use element::{ElementArena, ElementId, OctreeElement, VoxelData};
pub use tree::{LockPolicy, Octree, RayHit, TraversalOrder, TreeStore, Visitor};

// View culling
pub mod coverage;
pub mod frustum;
pub use coverage::{CoverageMap, CoverageResult};
pub use frustum::{FrustumLocation, ProjectedPolygon, ViewFrustum};

// Streaming codec
pub mod bag;
pub mod encode;
pub mod jurisdiction;
pub mod packet_data;
pub mod stats;
pub use bag::ElementBag;
pub use encode::{
  encode_tree_bitstream, process_remove_bitstream, read_bitstream_to_tree, DecodeParams,
  EncodeParams, StopReason,
};
pub use jurisdiction::{Containment, JurisdictionMap};
pub use packet_data::{PacketData, PacketSettings};
pub use stats::{SceneStats, PACKED_STATS_SIZE};
