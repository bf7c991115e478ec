//! ServerConfig - runtime settings of one streaming server, loadable from
//! JSON.

use serde::{Deserialize, Serialize};

use voxel_octree::{JurisdictionMap, OctalCode};

use crate::message::ServerId;

fn default_tick_rate() -> u32 {
  ServerConfig::DEFAULT_TICKS_PER_SECOND
}

fn default_pps_cap() -> u32 {
  ServerConfig::DEFAULT_MAX_PPS
}

fn default_true() -> bool {
  true
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
  /// Identity stamped into every outgoing packet header.
  #[serde(default)]
  pub server_id: ServerId,
  /// Scheduler ticks per second; packet budgets are sliced per tick.
  #[serde(default = "default_tick_rate")]
  pub ticks_per_second: u32,
  /// Hard per-viewer packets-per-second cap, regardless of what the viewer
  /// asks for.
  #[serde(default = "default_pps_cap")]
  pub max_packets_per_second: u32,
  /// Offer compressed payloads to viewers that want them.
  #[serde(default = "default_true")]
  pub allow_compression: bool,
  /// Suppress resends of identical payloads within the duplicate window.
  #[serde(default = "default_true")]
  pub suppress_duplicates: bool,
  /// Octant path of this server's jurisdiction root; empty means the whole
  /// tree.
  #[serde(default)]
  pub jurisdiction_root: Vec<u8>,
  /// Octant paths below which other servers take over.
  #[serde(default)]
  pub jurisdiction_ends: Vec<Vec<u8>>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      server_id: ServerId::default(),
      ticks_per_second: Self::DEFAULT_TICKS_PER_SECOND,
      max_packets_per_second: Self::DEFAULT_MAX_PPS,
      allow_compression: true,
      suppress_duplicates: true,
      jurisdiction_root: Vec::new(),
      jurisdiction_ends: Vec::new(),
    }
  }
}

impl ServerConfig {
  pub const DEFAULT_TICKS_PER_SECOND: u32 = 60;
  pub const DEFAULT_MAX_PPS: u32 = 600;

  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  /// Jurisdiction map described by this config, or None for whole-tree
  /// servers (no sharding in play).
  pub fn jurisdiction(&self) -> Option<JurisdictionMap> {
    if self.jurisdiction_root.is_empty() && self.jurisdiction_ends.is_empty() {
      return None;
    }
    let root = OctalCode::from_octants(&self.jurisdiction_root);
    let ends = self
      .jurisdiction_ends
      .iter()
      .map(|octants| OctalCode::from_octants(octants))
      .collect();
    Some(JurisdictionMap::new(root, ends))
  }

  /// This server's slice of a viewer's requested packet rate, per tick.
  pub fn packets_per_tick(&self, client_pps: u16) -> u32 {
    let pps = (client_pps as u32).min(self.max_packets_per_second);
    (pps / self.ticks_per_second).max(1)
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
