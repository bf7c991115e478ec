//! Protocol-level errors.
//!
//! Encoding stop reasons are NOT errors; they live in
//! [`crate::encode::StopReason`] and drive re-queueing. The variants here
//! cover malformed inbound data only: the message is discarded and the
//! sender's prior state is left unchanged.

use thiserror::Error;

#[derive(Error, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProtocolError {
  #[error("buffer truncated mid-message")]
  Truncated,

  #[error("unsupported protocol version")]
  BadVersion,

  #[error("unrecognized packet type")]
  BadPacketType,

  #[error("malformed octal code")]
  BadOctalCode,
}
