//! StreamScheduler - the per-viewer send loop.
//!
//! Each tick spends the viewer's packet budget draining its element bag:
//! encode under a read lock, frame, send, repeat. When the bag empties the
//! scene is complete; the next scene starts when the tree has changed since
//! the delta baseline or the view warrants it. [`tick`] is a pure function
//! of (tree, viewer state, clock) so the whole policy is testable without
//! threads; [`SendLoop`] is the thin thread wrapper production uses.

use std::sync::Arc;
use std::thread::{Builder as ThreadBuilder, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};

use voxel_octree::encode::encode_tree_bitstream;
use voxel_octree::time::timestamp_now;
use voxel_octree::{
  EncodeParams, LockPolicy, Octree, PacketData, PacketSettings, SceneStats, StopReason,
  CHANGE_FUDGE_USECS, MAX_PACKET_SIZE, PACKED_STATS_SIZE,
};

use crate::config::ServerConfig;
use crate::message::{
  DataPreamble, PacketHeader, PacketType, OctreeQuery, ServerId, DATA_PREAMBLE_SIZE,
  FLAG_COMPRESSED, FLAG_FULL_SCENE, HEADER_SIZE,
};
use crate::transport::{Transport, TransportError};
use crate::viewer::ViewerStreamState;

/// Extra LOD coarsening applied while the view is in motion, for viewers
/// that asked for low-res-while-moving.
pub const LOW_RES_MOVING_ADJUST: u32 = 1;

/// A tick holding the tree lock longer than this is worth a warning.
const LOCK_WATCHDOG: Duration = Duration::from_millis(100);

/// What one tick did, for callers that meter or test the loop.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TickOutcome {
  pub scene_started: bool,
  pub scene_completed: bool,
  pub packets_sent: u32,
  pub packets_suppressed: u32,
  pub bytes_sent: usize,
}

/// Run one scheduler tick for one viewer.
pub fn tick(
  tree: &Octree,
  viewer: &mut ViewerStreamState,
  config: &ServerConfig,
  transport: &dyn Transport,
  now: u64,
) -> Result<TickOutcome, TransportError> {
  let mut outcome = TickOutcome::default();

  if viewer.bag.is_empty() && !viewer.scene_in_progress() {
    // consume the just-stopped edge exactly once per tick
    let full_needed = viewer.should_send_full_scene(now) || !viewer.has_completed_a_scene();
    let start = full_needed
      || viewer.view_changed_since_scene()
      || tree_changed_since(tree, viewer.delta_since());
    if !start {
      return Ok(outcome);
    }
    viewer.start_scene(full_needed, now);
    if let Some(store) = tree.read(LockPolicy::Block) {
      viewer.bag.insert(store.root());
    }
    outcome.scene_started = true;
  }

  let budget = config.packets_per_tick(viewer.query().max_packets_per_second);
  let full_scene = viewer.stats.is_full_scene;
  let want_compression = viewer.query().wants_compression() && config.allow_compression;
  let settings = PacketSettings {
    want_compression,
    include_exists_bits: true,
    target_size: viewer.payload_budget(),
  };

  let view = viewer.current_view().clone();
  // Delta-frustum mode only applies when the view actually moved since the
  // last scene; against a still view, unchanged elements drop out as
  // no-change rather than was-in-view.
  let last_view = if viewer.view_changed_since_scene() {
    viewer.last_sent_view().cloned()
  } else {
    None
  };
  let query = *viewer.query();

  for _ in 0..budget {
    if viewer.bag.is_empty() {
      break;
    }
    let mut packet = PacketData::new(settings);
    let mut stalled = false;

    let lock_started = Instant::now();
    {
      let Some(store) = tree.read(LockPolicy::Block) else {
        break;
      };
      viewer.stats.lock_wait_usecs += lock_started.elapsed().as_micros() as u64;
      let encode_started = Instant::now();
      // Pack as many subtree sections as fit; the bag re-queues whatever
      // ran out of room, which is also our signal that the packet is full.
      while let Some(element) = viewer.bag.extract() {
        let mut params = EncodeParams::new(query.octree_size_scale);
        params.view_frustum = Some(&view);
        params.want_delta = query.wants_delta() && !full_scene;
        if params.want_delta {
          params.last_view_frustum = last_view.as_ref();
          params.delta_since = viewer.delta_since();
        }
        params.boundary_level_adjust = query.boundary_level_adjust as u32
          + if viewer.is_view_moving() && query.wants_low_res_moving() {
            LOW_RES_MOVING_ADJUST
          } else {
            0
          };
        if query.wants_occlusion_culling() {
          params.want_occlusion_culling = true;
          params.coverage = Some(&mut viewer.coverage);
        }
        let written = encode_tree_bitstream(
          &store,
          element,
          &mut packet,
          &mut viewer.bag,
          &mut params,
          &mut viewer.stats,
        );
        if written == 0 && params.stop_reason() == StopReason::DidntFit {
          stalled = !packet.has_content();
          break;
        }
      }
      viewer.stats.encode_time_usecs += encode_started.elapsed().as_micros() as u64;
    }
    let held = lock_started.elapsed();
    if held > LOCK_WATCHDOG {
      tracing::warn!(held_ms = held.as_millis() as u64, "slow octree encode tick");
    }

    if packet.has_content() {
      let (payload, compressed) = packet.finalize();
      let mut flags = 0u8;
      if compressed {
        flags |= FLAG_COMPRESSED;
      }
      if full_scene {
        flags |= FLAG_FULL_SCENE;
      }
      if config.suppress_duplicates && viewer.is_duplicate_send(&payload, now) {
        outcome.packets_suppressed += 1;
      } else {
        viewer.record_send(&payload, now);
        let scene_ending = viewer.bag.is_empty() && viewer.scene_in_progress();
        let framed = if scene_ending
          && HEADER_SIZE + PACKED_STATS_SIZE + DATA_PREAMBLE_SIZE + payload.len()
            <= MAX_PACKET_SIZE
        {
          // scene end: the stats ride the final datagram when both fit the
          // MTU; a lone stats datagram below is the fallback
          viewer.scene_completed();
          outcome.scene_completed = true;
          frame_scene_end_packet(
            config.server_id,
            &viewer.stats,
            flags,
            viewer.sequence(),
            now,
            &payload,
          )
        } else {
          frame_data_packet(config.server_id, flags, viewer.sequence(), now, &payload)
        };
        transport.send(&framed)?;
        viewer.stats.packet_sent(framed.len());
        outcome.packets_sent += 1;
        outcome.bytes_sent += framed.len();
      }
    }
    if stalled {
      // a single subtree section should always fit an empty packet; bail
      // out of the tick rather than spin on it
      tracing::warn!("subtree section exceeds an empty packet; deferring");
      break;
    }
  }

  if viewer.bag.is_empty() && viewer.scene_in_progress() {
    viewer.scene_completed();
    outcome.scene_completed = true;
    // the final data packet had no room for the stats, or was suppressed:
    // they go out on their own
    let mut stats_packet = Vec::new();
    PacketHeader::new(PacketType::Stats, config.server_id).pack(&mut stats_packet);
    stats_packet.extend_from_slice(&viewer.stats.pack());
    transport.send(&stats_packet)?;
  }

  Ok(outcome)
}

fn tree_changed_since(tree: &Octree, delta_since: u64) -> bool {
  // the root timestamp covers every descendant change
  let Some(store) = tree.read(LockPolicy::Try) else {
    return false;
  };
  match store.element(store.root()) {
    Some(root) => root.has_changed_since(delta_since.saturating_sub(CHANGE_FUDGE_USECS)),
    None => false,
  }
}

/// Scene-end datagram: the scene's stats followed by its final data
/// section, sharing the frame.
fn frame_scene_end_packet(
  sender: ServerId,
  stats: &SceneStats,
  flags: u8,
  sequence: u16,
  now: u64,
  payload: &[u8],
) -> Vec<u8> {
  let mut framed =
    Vec::with_capacity(HEADER_SIZE + PACKED_STATS_SIZE + DATA_PREAMBLE_SIZE + payload.len());
  PacketHeader::new(PacketType::Stats, sender).pack(&mut framed);
  framed.extend_from_slice(&stats.pack());
  DataPreamble {
    flags,
    sequence,
    sent_at: now,
  }
  .pack(&mut framed);
  framed.extend_from_slice(payload);
  framed
}

fn frame_data_packet(
  sender: ServerId,
  flags: u8,
  sequence: u16,
  now: u64,
  payload: &[u8],
) -> Vec<u8> {
  let mut framed = Vec::with_capacity(payload.len() + 32);
  PacketHeader::new(PacketType::Data, sender).pack(&mut framed);
  DataPreamble {
    flags,
    sequence,
    sent_at: now,
  }
  .pack(&mut framed);
  framed.extend_from_slice(payload);
  framed
}

enum Control {
  UpdateQuery(OctreeQuery),
  Shutdown,
}

/// Owns the scheduler thread for one viewer. Queries are fed in through a
/// channel; dropping the handle shuts the thread down.
pub struct SendLoop {
  control: Sender<Control>,
  handle: Option<JoinHandle<()>>,
}

impl SendLoop {
  pub fn spawn(
    tree: Arc<Octree>,
    query: OctreeQuery,
    config: ServerConfig,
    transport: Box<dyn Transport>,
  ) -> std::io::Result<Self> {
    let (control, inbox) = unbounded::<Control>();
    let interval = Duration::from_micros(1_000_000 / config.ticks_per_second.max(1) as u64);
    let handle = ThreadBuilder::new()
      .name("octree-send".into())
      .spawn(move || {
        let mut viewer = ViewerStreamState::new(query, timestamp_now());
        loop {
          match inbox.recv_timeout(interval) {
            Ok(Control::UpdateQuery(query)) => {
              viewer.update_query(query, timestamp_now());
            }
            Ok(Control::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
          }
          match tick(&tree, &mut viewer, &config, transport.as_ref(), timestamp_now()) {
            Ok(_) => {}
            Err(TransportError::Backpressure) => {
              // receiver is behind; try again next tick
            }
            Err(TransportError::Disconnected) => {
              tracing::info!("viewer transport closed; stopping send loop");
              break;
            }
          }
        }
      })?;
    Ok(Self {
      control,
      handle: Some(handle),
    })
  }

  pub fn update_query(&self, query: OctreeQuery) {
    let _ = self.control.send(Control::UpdateQuery(query));
  }
}

impl Drop for SendLoop {
  fn drop(&mut self) {
    let _ = self.control.send(Control::Shutdown);
    if let Some(handle) = self.handle.take() {
      let _ = handle.join();
    }
  }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
