//! `canterproto`: command payloads spoken between the game client and the
//! canter server tiers.
//!
//! Every command is a plain struct with explicit `read` and/or `write`
//! routines over the [`wire`] primitives. The wire is asymmetric: a command
//! the server only ever receives has `read`, a command it only ever sends
//! has `write`, and the handful used by both sides (and by test clients)
//! have both.
//!
//! Decoding is "zero-copy" where it can be: strings come back as
//! `bytes::Bytes` slices referencing the frame payload. Strings are opaque
//! byte sequences at this layer; the client speaks EUC-KR, and conversion
//! happens at display and validation sites only, never in the codec.

pub mod id;
pub mod lobby;
pub mod race;
pub mod shared;
pub mod wire;

/// A protocol command id as carried in the frame header.
pub type CommandId = u16;

#[derive(Debug, Clone)]
pub enum ProtoError {
    TooShort { need: usize, got: usize },
    UnknownCommand(CommandId),
    Malformed(&'static str),
}

impl std::fmt::Display for ProtoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtoError::TooShort { need, got } => {
                write!(f, "payload too short: need {need}, got {got}")
            }
            ProtoError::UnknownCommand(c) => write!(f, "unknown command id: 0x{c:04X}"),
            ProtoError::Malformed(s) => write!(f, "malformed payload: {s}"),
        }
    }
}

impl std::error::Error for ProtoError {}

/// A message the server sends to a client.
///
/// The command server frames `write` output under `COMMAND` and queues it on
/// the client's write worker.
pub trait Clientbound {
    const COMMAND: CommandId;

    fn write(&self, w: &mut wire::Writer);
}
