//! Wire messages between servers and viewers.
//!
//! Every datagram starts with a one-byte packet type and a one-byte
//! protocol version. Octree data packets follow with a small preamble
//! (flags, sequence, server send time) and then the bitstream payload
//! produced by the codec; everything is little-endian.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use voxel_octree::{OctalCode, ProtocolError};

/// Protocol version carried in every header. Mismatches are dropped by the
/// receiver with a warning rather than misparsed.
pub const PROTOCOL_VERSION: u8 = 1;

/// Data-packet preamble size after the header: flags + sequence + send time.
pub const DATA_PREAMBLE_SIZE: usize = 1 + 2 + 8;

pub const FLAG_COMPRESSED: u8 = 1 << 0;
pub const FLAG_FULL_SCENE: u8 = 1 << 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum PacketType {
  /// Viewer to server: view and stream preferences.
  Query = 0,
  /// Server to viewer: bitstream payload.
  Data = 1,
  /// Server to viewer: subtree erase codes, framed by [`erase_packet`].
  Erase = 2,
  /// Server to viewer: scene statistics, piggybacked at scene end.
  Stats = 3,
  /// Server to viewer: jurisdiction announcement.
  Jurisdiction = 4,
}

impl PacketType {
  pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
    match byte {
      0 => Ok(Self::Query),
      1 => Ok(Self::Data),
      2 => Ok(Self::Erase),
      3 => Ok(Self::Stats),
      4 => Ok(Self::Jurisdiction),
      _ => Err(ProtocolError::BadPacketType),
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PacketHeader {
  pub packet_type: PacketType,
  pub version: u8,
  pub sender: ServerId,
}

pub const HEADER_SIZE: usize = 2 + 16;

impl PacketHeader {
  pub fn new(packet_type: PacketType, sender: ServerId) -> Self {
    Self {
      packet_type,
      version: PROTOCOL_VERSION,
      sender,
    }
  }

  pub fn pack(&self, out: &mut Vec<u8>) {
    out.push(self.packet_type as u8);
    out.push(self.version);
    out.extend_from_slice(&self.sender.0.to_le_bytes());
  }

  pub fn unpack(bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
      return Err(ProtocolError::Truncated);
    }
    let packet_type = PacketType::from_byte(bytes[0])?;
    if bytes[1] != PROTOCOL_VERSION {
      return Err(ProtocolError::BadVersion);
    }
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&bytes[2..HEADER_SIZE]);
    Ok((
      Self {
        packet_type,
        version: bytes[1],
        sender: ServerId(u128::from_le_bytes(raw)),
      },
      HEADER_SIZE,
    ))
  }
}

/// Identity of a server process, stable across restarts of the viewer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct ServerId(pub u128);

// Query want-flags.
pub const WANT_DELTA: u8 = 1 << 0;
pub const WANT_COMPRESSION: u8 = 1 << 1;
pub const WANT_OCCLUSION_CULLING: u8 = 1 << 2;
pub const WANT_LOW_RES_MOVING: u8 = 1 << 3;

/// Viewer query: the view volume plus stream preferences. Sent every time
/// the view moves meaningfully and periodically as a keepalive.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct OctreeQuery {
  pub position: Vec3,
  pub orientation: Quat,
  pub field_of_view: f32,
  pub aspect_ratio: f32,
  pub near_clip: f32,
  pub far_clip: f32,
  pub octree_size_scale: f32,
  pub boundary_level_adjust: u8,
  /// Packets per second this viewer is willing to receive, across all
  /// servers.
  pub max_packets_per_second: u16,
  pub flags: u8,
}

impl Default for OctreeQuery {
  fn default() -> Self {
    Self {
      position: Vec3::ZERO,
      orientation: Quat::IDENTITY,
      field_of_view: 45.0,
      aspect_ratio: 16.0 / 9.0,
      near_clip: 0.08,
      far_clip: voxel_octree::TREE_SCALE,
      octree_size_scale: voxel_octree::DEFAULT_OCTREE_SIZE_SCALE,
      boundary_level_adjust: 0,
      max_packets_per_second: 600,
      flags: WANT_DELTA | WANT_COMPRESSION,
    }
  }
}

impl OctreeQuery {
  pub fn wants_delta(&self) -> bool {
    self.flags & WANT_DELTA != 0
  }

  pub fn wants_compression(&self) -> bool {
    self.flags & WANT_COMPRESSION != 0
  }

  pub fn wants_occlusion_culling(&self) -> bool {
    self.flags & WANT_OCCLUSION_CULLING != 0
  }

  pub fn wants_low_res_moving(&self) -> bool {
    self.flags & WANT_LOW_RES_MOVING != 0
  }

  pub fn pack(&self, out: &mut Vec<u8>) {
    for component in [
      self.position.x,
      self.position.y,
      self.position.z,
      self.orientation.x,
      self.orientation.y,
      self.orientation.z,
      self.orientation.w,
      self.field_of_view,
      self.aspect_ratio,
      self.near_clip,
      self.far_clip,
      self.octree_size_scale,
    ] {
      out.extend_from_slice(&component.to_le_bytes());
    }
    out.push(self.boundary_level_adjust);
    out.extend_from_slice(&self.max_packets_per_second.to_le_bytes());
    out.push(self.flags);
  }

  pub fn unpack(bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
    const FLOATS: usize = 12;
    const SIZE: usize = FLOATS * 4 + 1 + 2 + 1;
    if bytes.len() < SIZE {
      return Err(ProtocolError::Truncated);
    }
    let mut floats = [0.0f32; FLOATS];
    for (index, slot) in floats.iter_mut().enumerate() {
      let offset = index * 4;
      *slot = f32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
      ]);
    }
    let tail = FLOATS * 4;
    let query = Self {
      position: Vec3::new(floats[0], floats[1], floats[2]),
      orientation: Quat::from_xyzw(floats[3], floats[4], floats[5], floats[6]),
      field_of_view: floats[7],
      aspect_ratio: floats[8],
      near_clip: floats[9],
      far_clip: floats[10],
      octree_size_scale: floats[11],
      boundary_level_adjust: bytes[tail],
      max_packets_per_second: u16::from_le_bytes([bytes[tail + 1], bytes[tail + 2]]),
      flags: bytes[tail + 3],
    };
    Ok((query, SIZE))
  }
}

/// Frame an erase datagram for subtrees an edit removed. The payload is the
/// run of wire codes `process_remove_bitstream` consumes on the receiving
/// side.
pub fn erase_packet(sender: ServerId, codes: &[OctalCode]) -> Vec<u8> {
  let mut out = Vec::new();
  PacketHeader::new(PacketType::Erase, sender).pack(&mut out);
  for code in codes {
    out.extend_from_slice(&code.to_wire());
  }
  out
}

/// Jurisdiction announcement payload: root code plus end codes.
#[derive(Clone, PartialEq, Debug)]
pub struct JurisdictionAnnouncement {
  pub root: OctalCode,
  pub ends: Vec<OctalCode>,
}

impl JurisdictionAnnouncement {
  pub fn pack(&self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.root.to_wire());
    out.extend_from_slice(&(self.ends.len() as u16).to_le_bytes());
    for end in &self.ends {
      out.extend_from_slice(&end.to_wire());
    }
  }

  pub fn unpack(bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
    let (root, mut offset) = OctalCode::from_wire(bytes)?;
    let count_bytes = bytes
      .get(offset..offset + 2)
      .ok_or(ProtocolError::Truncated)?;
    let count = u16::from_le_bytes([count_bytes[0], count_bytes[1]]) as usize;
    offset += 2;
    let mut ends = Vec::with_capacity(count);
    for _ in 0..count {
      let (end, used) = OctalCode::from_wire(&bytes[offset..])?;
      offset += used;
      ends.push(end);
    }
    Ok((Self { root, ends }, offset))
  }
}

/// Preamble of every data packet: stream flags, a wrapping sequence number,
/// and the server's send timestamp in microseconds.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DataPreamble {
  pub flags: u8,
  pub sequence: u16,
  pub sent_at: u64,
}

impl DataPreamble {
  pub fn pack(&self, out: &mut Vec<u8>) {
    out.push(self.flags);
    out.extend_from_slice(&self.sequence.to_le_bytes());
    out.extend_from_slice(&self.sent_at.to_le_bytes());
  }

  pub fn unpack(bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
    if bytes.len() < DATA_PREAMBLE_SIZE {
      return Err(ProtocolError::Truncated);
    }
    let mut time = [0u8; 8];
    time.copy_from_slice(&bytes[3..11]);
    Ok((
      Self {
        flags: bytes[0],
        sequence: u16::from_le_bytes([bytes[1], bytes[2]]),
        sent_at: u64::from_le_bytes(time),
      },
      DATA_PREAMBLE_SIZE,
    ))
  }

  pub fn is_compressed(&self) -> bool {
    self.flags & FLAG_COMPRESSED != 0
  }

  pub fn is_full_scene(&self) -> bool {
    self.flags & FLAG_FULL_SCENE != 0
  }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod message_test;
