//! voxel_stream - server-side streaming of a shared voxel octree
//!
//! Builds on [`voxel_octree`]'s codec to run the viewer-facing half of an
//! octree server: per-viewer scene scheduling with packet budgets, the wire
//! messages viewers and servers exchange, pluggable datagram transports,
//! and the viewer-side split of a packet budget across multiple servers.
//!
//! The unit of work is one [`ViewerStreamState`] driven by [`tick`]; the
//! [`SendLoop`] wraps that in a thread per connected viewer.

pub mod apportion;
pub mod config;
pub mod message;
pub mod scheduler;
pub mod transport;
pub mod viewer;

pub use apportion::{apportion_query_pps, ServerViewStatus, DISCOVERY_PPS};
pub use config::ServerConfig;
pub use message::{
  erase_packet, DataPreamble, JurisdictionAnnouncement, OctreeQuery, PacketHeader, PacketType,
  ServerId, PROTOCOL_VERSION, WANT_COMPRESSION, WANT_DELTA, WANT_LOW_RES_MOVING,
  WANT_OCCLUSION_CULLING,
};
pub use scheduler::{tick, SendLoop, TickOutcome, LOW_RES_MOVING_ADJUST};
pub use transport::{ChannelTransport, Transport, TransportError};
pub use viewer::{
  ViewerStreamState, DUPLICATE_WINDOW_USECS, VIEW_FRUSTUM_FOV_OVERSEND, VIEW_STABLE_USECS,
};
