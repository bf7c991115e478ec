//! PacketData - an append-only packet payload with rewind markers.
//!
//! The encoder writes speculatively: it opens a subtree, opens a level per
//! recursion depth, appends bitmasks and colors, and either keeps the level
//! or discards it when the content did not fit. Child-existence bitmasks
//! written before the children are encoded get patched afterwards through
//! [`PacketData::update_prior_bitmask`].
//!
//! Finalization optionally deflates the accumulated payload; the encoder
//! budgets against a conservative uncompressed target so the compressed
//! result stays under the datagram MTU.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::constants::MAX_PACKET_SIZE;
use crate::octal_code::OctalCode;

/// Slack held back from the packet target so framing never pushes the
/// datagram over the MTU.
pub const COMPRESS_PADDING: usize = 15;

/// Uncompressed bytes we allow per packet when compression is on. Deflate on
/// octree bitstreams reliably beats 2:1, so budgeting at this size keeps the
/// compressed payload under [`MAX_PACKET_SIZE`].
pub const MAX_UNCOMPRESSED_SIZE: usize = 4500;

/// Buffer settings, fixed for the lifetime of one packet.
#[derive(Clone, Copy, Debug)]
pub struct PacketSettings {
  pub want_compression: bool,
  /// Include the two-bitmask existence encoding (in-tree + in-packet). When
  /// off, only the color bitmask is written and degenerate interior sections
  /// collapse.
  pub include_exists_bits: bool,
  pub target_size: usize,
}

impl Default for PacketSettings {
  fn default() -> Self {
    Self {
      want_compression: false,
      include_exists_bits: true,
      target_size: MAX_PACKET_SIZE,
    }
  }
}

impl PacketSettings {
  /// Byte budget for the uncompressed stream under these settings.
  pub fn uncompressed_budget(&self) -> usize {
    if self.want_compression {
      MAX_UNCOMPRESSED_SIZE
    } else {
      self.target_size.saturating_sub(COMPRESS_PADDING)
    }
  }
}

/// Opaque marker for one open level; holds enough to rewind it.
#[derive(Clone, Copy, Debug)]
pub struct LevelDetails {
  start_index: usize,
}

pub struct PacketData {
  settings: PacketSettings,
  uncompressed: Vec<u8>,
  /// Start of the currently open subtree, rewound wholesale on discard.
  subtree_start: usize,
  /// Sections successfully closed in this packet.
  subtree_count: usize,
}

impl PacketData {
  pub fn new(settings: PacketSettings) -> Self {
    Self {
      settings,
      uncompressed: Vec::with_capacity(settings.uncompressed_budget()),
      subtree_start: 0,
      subtree_count: 0,
    }
  }

  pub fn settings(&self) -> PacketSettings {
    self.settings
  }

  /// Change settings for the next packet. Only valid on an empty buffer.
  pub fn change_settings(&mut self, settings: PacketSettings) {
    debug_assert!(self.uncompressed.is_empty());
    self.settings = settings;
  }

  pub fn uncompressed_size(&self) -> usize {
    self.uncompressed.len()
  }

  pub fn uncompressed_bytes(&self) -> &[u8] {
    &self.uncompressed
  }

  pub fn bytes_available(&self) -> usize {
    self
      .settings
      .uncompressed_budget()
      .saturating_sub(self.uncompressed.len())
  }

  pub fn is_empty(&self) -> bool {
    self.uncompressed.is_empty()
  }

  /// Number of subtree sections closed into this packet.
  pub fn subtree_count(&self) -> usize {
    self.subtree_count
  }

  pub fn has_content(&self) -> bool {
    self.subtree_count > 0
  }

  // ---------------------------------------------------------------------
  // Subtree / level brackets
  // ---------------------------------------------------------------------

  /// Open a subtree section rooted at `code`. Fails (and leaves the buffer
  /// untouched) when even the octal code does not fit.
  pub fn start_subtree(&mut self, code: &OctalCode) -> bool {
    self.subtree_start = self.uncompressed.len();
    let wire = code.to_wire();
    if wire.len() > self.bytes_available() {
      return false;
    }
    self.uncompressed.extend_from_slice(&wire);
    true
  }

  pub fn end_subtree(&mut self) {
    self.subtree_count += 1;
  }

  pub fn discard_subtree(&mut self) {
    self.uncompressed.truncate(self.subtree_start);
  }

  /// Open a level bracket; everything appended after this marker can be
  /// dropped with [`PacketData::discard_level`].
  pub fn start_level(&mut self) -> LevelDetails {
    LevelDetails {
      start_index: self.uncompressed.len(),
    }
  }

  /// Keep the level. Returns the bytes it contributed.
  pub fn end_level(&mut self, level: LevelDetails) -> usize {
    self.uncompressed.len() - level.start_index
  }

  /// Rewind the buffer to where the level began.
  pub fn discard_level(&mut self, level: LevelDetails) {
    self.uncompressed.truncate(level.start_index);
  }

  // ---------------------------------------------------------------------
  // Appends and prior patches (offsets relative to the open subtree)
  // ---------------------------------------------------------------------

  /// Append one bitmask byte, returning its offset for later patching.
  pub fn append_bitmask(&mut self, bitmask: u8) -> Option<usize> {
    if self.bytes_available() < 1 {
      return None;
    }
    let offset = self.uncompressed.len();
    self.uncompressed.push(bitmask);
    Some(offset)
  }

  /// Overwrite a bitmask appended earlier in this packet.
  pub fn update_prior_bitmask(&mut self, offset: usize, bitmask: u8) {
    debug_assert!(offset < self.uncompressed.len());
    if let Some(slot) = self.uncompressed.get_mut(offset) {
      *slot = bitmask;
    }
  }

  /// Overwrite bytes appended earlier in this packet.
  pub fn update_prior_bytes(&mut self, offset: usize, bytes: &[u8]) {
    debug_assert!(offset + bytes.len() <= self.uncompressed.len());
    if let Some(slice) = self.uncompressed.get_mut(offset..offset + bytes.len()) {
      slice.copy_from_slice(bytes);
    }
  }

  pub fn append_color(&mut self, color: [u8; 3]) -> bool {
    self.append_bytes(&color)
  }

  pub fn append_bytes(&mut self, bytes: &[u8]) -> bool {
    if bytes.len() > self.bytes_available() {
      return false;
    }
    self.uncompressed.extend_from_slice(bytes);
    true
  }

  // ---------------------------------------------------------------------
  // Finalization
  // ---------------------------------------------------------------------

  /// Close the packet and return the wire payload, deflating when the
  /// settings ask for compression. A deflate failure falls back to the
  /// uncompressed bytes; the flag in the header tells the decoder which
  /// form it got.
  pub fn finalize(&self) -> (Vec<u8>, bool) {
    if !self.settings.want_compression {
      return (self.uncompressed.clone(), false);
    }
    let mut encoder = ZlibEncoder::new(
      Vec::with_capacity(self.uncompressed.len() / 2),
      Compression::default(),
    );
    let compressed = encoder
      .write_all(&self.uncompressed)
      .and_then(|_| encoder.finish());
    match compressed {
      Ok(bytes) => (bytes, true),
      Err(_) => (self.uncompressed.clone(), false),
    }
  }

  /// Reset for the next packet, keeping the settings.
  pub fn reset(&mut self) {
    self.uncompressed.clear();
    self.subtree_start = 0;
    self.subtree_count = 0;
  }
}

/// Inflate a compressed payload produced by [`PacketData::finalize`].
pub fn inflate(payload: &[u8]) -> std::io::Result<Vec<u8>> {
  use std::io::Read;
  let mut decoder = flate2::read::ZlibDecoder::new(payload);
  let mut out = Vec::new();
  decoder.read_to_end(&mut out)?;
  Ok(out)
}

#[cfg(test)]
#[path = "packet_data_test.rs"]
mod packet_data_test;
