//! Transport seam between the scheduler and the wire.
//!
//! The scheduler only needs fire-and-forget datagram delivery; sockets,
//! reliability layers, and in-process channels all hide behind [`Transport`].

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransportError {
  #[error("peer disconnected")]
  Disconnected,
  #[error("send queue full")]
  Backpressure,
}

pub trait Transport: Send {
  fn send(&self, payload: &[u8]) -> Result<(), TransportError>;
}

/// In-process transport over a crossbeam channel. The receiving half is a
/// plain channel receiver, so viewers (and tests) drain it at their own
/// pace.
pub struct ChannelTransport {
  sender: Sender<Vec<u8>>,
}

impl ChannelTransport {
  pub fn pair() -> (Self, Receiver<Vec<u8>>) {
    let (sender, receiver) = unbounded();
    (Self { sender }, receiver)
  }
}

impl Transport for ChannelTransport {
  fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
    match self.sender.try_send(payload.to_vec()) {
      Ok(()) => Ok(()),
      Err(TrySendError::Disconnected(_)) => Err(TransportError::Disconnected),
      Err(TrySendError::Full(_)) => Err(TransportError::Backpressure),
    }
  }
}
