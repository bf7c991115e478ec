//! SceneStats - per-viewer accounting of one scene traversal.
//!
//! Counters accumulate across all packets of a scene and travel to the
//! viewer in a compact wire form piggybacked on the scene-end packet, so
//! clients can display why elements were withheld (distance, view, delta,
//! occlusion) without guessing.

use crate::error::ProtocolError;
use crate::time::timestamp_now;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SceneStats {
  /// Monotonic number of the scene these counters describe.
  pub scene_number: u32,
  pub is_full_scene: bool,
  pub is_moving: bool,
  /// Microsecond timestamps bracketing the traversal.
  pub scene_start: u64,
  pub scene_end: u64,

  pub traversed: u64,
  pub internal: u64,
  pub leaves: u64,

  pub skipped_distance: u64,
  pub skipped_out_of_view: u64,
  pub skipped_was_in_view: u64,
  pub skipped_no_change: u64,
  pub skipped_occluded: u64,
  pub didnt_fit: u64,

  pub colors_sent: u64,
  pub bitmasks_sent: u64,
  pub existence_updates_sent: u64,

  /// Time spent inside the encoder, summed across the scene's packets.
  pub encode_time_usecs: u64,
  /// Time spent waiting on the tree lock before encoding could begin.
  pub lock_wait_usecs: u64,

  pub packets: u32,
  pub bytes: u64,
}

/// Byte size of [`SceneStats::pack`] output.
pub const PACKED_STATS_SIZE: usize = 4 + 1 + 1 + 8 + 8 + 14 * 8 + 4 + 8;

impl SceneStats {
  /// Begin accounting for a new scene; counters restart from zero.
  pub fn scene_started(&mut self, is_full_scene: bool, is_moving: bool) {
    let scene_number = self.scene_number.wrapping_add(1);
    *self = Self {
      scene_number,
      is_full_scene,
      is_moving,
      scene_start: timestamp_now(),
      ..Self::default()
    };
  }

  pub fn scene_completed(&mut self) {
    self.scene_end = timestamp_now();
  }

  pub fn elapsed_usecs(&self) -> u64 {
    self.scene_end.saturating_sub(self.scene_start)
  }

  pub fn packet_sent(&mut self, bytes: usize) {
    self.packets += 1;
    self.bytes += bytes as u64;
  }

  /// Skipped-element total across all stop reasons.
  pub fn total_skipped(&self) -> u64 {
    self.skipped_distance
      + self.skipped_out_of_view
      + self.skipped_was_in_view
      + self.skipped_no_change
      + self.skipped_occluded
  }

  /// Serialize for the scene-end piggyback.
  pub fn pack(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(PACKED_STATS_SIZE);
    out.extend_from_slice(&self.scene_number.to_le_bytes());
    out.push(self.is_full_scene as u8);
    out.push(self.is_moving as u8);
    out.extend_from_slice(&self.scene_start.to_le_bytes());
    out.extend_from_slice(&self.scene_end.to_le_bytes());
    for counter in [
      self.traversed,
      self.internal,
      self.leaves,
      self.skipped_distance,
      self.skipped_out_of_view,
      self.skipped_was_in_view,
      self.skipped_no_change,
      self.skipped_occluded,
      self.didnt_fit,
      self.colors_sent,
      self.bitmasks_sent,
      self.existence_updates_sent,
      self.encode_time_usecs,
      self.lock_wait_usecs,
    ] {
      out.extend_from_slice(&counter.to_le_bytes());
    }
    out.extend_from_slice(&self.packets.to_le_bytes());
    out.extend_from_slice(&self.bytes.to_le_bytes());
    out
  }

  pub fn unpack(bytes: &[u8]) -> Result<Self, ProtocolError> {
    if bytes.len() < PACKED_STATS_SIZE {
      return Err(ProtocolError::Truncated);
    }
    let mut offset = 0;
    let mut read_u32 = |o: &mut usize| {
      let value = u32::from_le_bytes([bytes[*o], bytes[*o + 1], bytes[*o + 2], bytes[*o + 3]]);
      *o += 4;
      value
    };
    let scene_number = read_u32(&mut offset);
    let is_full_scene = bytes[offset] != 0;
    let is_moving = bytes[offset + 1] != 0;
    offset += 2;
    let mut read_u64 = |o: &mut usize| {
      let mut raw = [0u8; 8];
      raw.copy_from_slice(&bytes[*o..*o + 8]);
      *o += 8;
      u64::from_le_bytes(raw)
    };
    let scene_start = read_u64(&mut offset);
    let scene_end = read_u64(&mut offset);
    let mut counters = [0u64; 14];
    for counter in &mut counters {
      *counter = read_u64(&mut offset);
    }
    let packets = u32::from_le_bytes([
      bytes[offset],
      bytes[offset + 1],
      bytes[offset + 2],
      bytes[offset + 3],
    ]);
    offset += 4;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    let total_bytes = u64::from_le_bytes(raw);

    Ok(Self {
      scene_number,
      is_full_scene,
      is_moving,
      scene_start,
      scene_end,
      traversed: counters[0],
      internal: counters[1],
      leaves: counters[2],
      skipped_distance: counters[3],
      skipped_out_of_view: counters[4],
      skipped_was_in_view: counters[5],
      skipped_no_change: counters[6],
      skipped_occluded: counters[7],
      didnt_fit: counters[8],
      colors_sent: counters[9],
      bitmasks_sent: counters[10],
      existence_updates_sent: counters[11],
      encode_time_usecs: counters[12],
      lock_wait_usecs: counters[13],
      packets,
      bytes: total_bytes,
    })
  }
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod stats_test;
