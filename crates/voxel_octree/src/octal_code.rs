//! OctalCode - path-encoded address of an element in the octree.
//!
//! One 3-bit octant selector per depth level; the root is the empty code.
//! Octant bit layout matches the cube math everywhere else in this crate:
//! bit 0 = +X half, bit 1 = +Y half, bit 2 = +Z half.
//!
//! Wire form is a length byte (number of 3-bit sections) followed by the
//! sections packed MSB-first, which keeps sibling codes byte-comparable.

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::constants::MAX_TREE_DEPTH;
use crate::cube::AACube;
use crate::error::ProtocolError;

/// Path-encoded octree address. Cheap to clone; most codes fit inline.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct OctalCode {
  octants: SmallVec<[u8; 16]>,
}

impl OctalCode {
  /// The root element's code (depth 0).
  pub fn root() -> Self {
    Self::default()
  }

  /// Build a code from explicit octant selectors. Selectors must be < 8.
  pub fn from_octants(octants: &[u8]) -> Self {
    debug_assert!(octants.iter().all(|&o| o < 8));
    Self {
      octants: SmallVec::from_slice(octants),
    }
  }

  /// Tree depth this code addresses (root = 0).
  #[inline]
  pub fn depth(&self) -> usize {
    self.octants.len()
  }

  #[inline]
  pub fn is_root(&self) -> bool {
    self.octants.is_empty()
  }

  /// Octant selector at `level` (0 = first branch below the root).
  #[inline]
  pub fn octant_at(&self, level: usize) -> u8 {
    self.octants[level]
  }

  /// Code of the child in the given octant.
  pub fn child(&self, octant: u8) -> Self {
    debug_assert!(octant < 8);
    let mut octants = self.octants.clone();
    octants.push(octant);
    Self { octants }
  }

  /// Code of the parent, or None for the root.
  pub fn parent(&self) -> Option<Self> {
    if self.octants.is_empty() {
      return None;
    }
    let mut octants = self.octants.clone();
    octants.pop();
    Some(Self { octants })
  }

  /// True when `self` addresses a proper ancestor of `other`.
  pub fn is_ancestor_of(&self, other: &OctalCode) -> bool {
    self.depth() < other.depth() && other.octants[..self.depth()] == self.octants[..]
  }

  /// Unit-space cube addressed by this code. The root cube is `[0,1)³`.
  pub fn cube(&self) -> AACube {
    let mut corner = glam::Vec3::ZERO;
    let mut scale = 1.0_f32;
    for &octant in &self.octants {
      scale *= 0.5;
      if octant & 1 != 0 {
        corner.x += scale;
      }
      if octant & 2 != 0 {
        corner.y += scale;
      }
      if octant & 4 != 0 {
        corner.z += scale;
      }
    }
    AACube::new(corner, scale)
  }

  /// Code for the unit-space cube at `(x, y, z)` with edge `scale`.
  ///
  /// `scale` must be a power-of-two fraction of the root edge; the depth is
  /// derived from it. Coordinates outside `[0,1)` yield None.
  pub fn for_cube(x: f32, y: f32, z: f32, scale: f32) -> Option<Self> {
    if !(0.0..1.0).contains(&x) || !(0.0..1.0).contains(&y) || !(0.0..1.0).contains(&z) {
      return None;
    }
    if scale <= 0.0 || scale > 1.0 {
      return None;
    }
    let depth = (1.0 / scale).log2().round() as usize;
    if depth > MAX_TREE_DEPTH {
      return None;
    }
    let mut octants = SmallVec::new();
    let (mut cx, mut cy, mut cz) = (0.0_f32, 0.0_f32, 0.0_f32);
    let mut half = 0.5_f32;
    for _ in 0..depth {
      let mut octant = 0u8;
      if x >= cx + half {
        octant |= 1;
        cx += half;
      }
      if y >= cy + half {
        octant |= 2;
        cy += half;
      }
      if z >= cz + half {
        octant |= 4;
        cz += half;
      }
      octants.push(octant);
      half *= 0.5;
    }
    Some(Self { octants })
  }

  /// Serialize: length byte + packed 3-bit sections, MSB-first.
  pub fn to_wire(&self) -> Vec<u8> {
    let depth = self.octants.len();
    let mut out = vec![depth as u8];
    out.resize(1 + Self::wire_bytes_for_depth(depth), 0);
    for (level, &octant) in self.octants.iter().enumerate() {
      let bit_offset = level * 3;
      for bit in 0..3 {
        if octant & (1 << (2 - bit)) != 0 {
          let absolute = bit_offset + bit;
          out[1 + absolute / 8] |= 0x80 >> (absolute % 8);
        }
      }
    }
    out
  }

  /// Deserialize from the head of `bytes`; returns the code and the number
  /// of bytes consumed.
  pub fn from_wire(bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
    let &depth = bytes.first().ok_or(ProtocolError::Truncated)?;
    let depth = depth as usize;
    if depth > MAX_TREE_DEPTH {
      return Err(ProtocolError::BadOctalCode);
    }
    let byte_count = Self::wire_bytes_for_depth(depth);
    if bytes.len() < 1 + byte_count {
      return Err(ProtocolError::Truncated);
    }
    let packed = &bytes[1..1 + byte_count];
    let mut octants = SmallVec::with_capacity(depth);
    for level in 0..depth {
      let mut octant = 0u8;
      for bit in 0..3 {
        let absolute = level * 3 + bit;
        if packed[absolute / 8] & (0x80 >> (absolute % 8)) != 0 {
          octant |= 1 << (2 - bit);
        }
      }
      octants.push(octant);
    }
    Ok((Self { octants }, 1 + byte_count))
  }

  /// Packed bytes needed for `depth` 3-bit sections (excluding the length
  /// byte).
  #[inline]
  pub fn wire_bytes_for_depth(depth: usize) -> usize {
    (depth * 3).div_ceil(8)
  }

  /// Total wire size of this code.
  #[inline]
  pub fn wire_len(&self) -> usize {
    1 + Self::wire_bytes_for_depth(self.depth())
  }
}

/// Codes order by octant at the first differing level, ancestors before
/// descendants. This is the in-order traversal position of the subtree.
impl Ord for OctalCode {
  fn cmp(&self, other: &Self) -> Ordering {
    let shared = self.depth().min(other.depth());
    for level in 0..shared {
      match self.octants[level].cmp(&other.octants[level]) {
        Ordering::Equal => continue,
        unequal => return unequal,
      }
    }
    self.depth().cmp(&other.depth())
  }
}

impl PartialOrd for OctalCode {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

#[cfg(test)]
#[path = "octal_code_test.rs"]
mod octal_code_test;
