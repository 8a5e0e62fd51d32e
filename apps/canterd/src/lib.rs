//! canterd: the dedicated race server.
//!
//! Three tiers serve the game: the lobby authenticates and hands out
//! one-time passwords, the race tier simulates rooms and races, and a UDP
//! relay fans out in-race peer traffic. The binary wires them together;
//! the library form exists so the end-to-end tests can assemble the same
//! tiers on ephemeral ports.

pub mod config;
pub mod courses;
pub mod datastore;
pub mod infractions;
pub mod lobby;
pub mod locale;
pub mod net;
pub mod otp;
pub mod race;
pub mod relay;
pub mod rooms;
pub mod scheduler;
pub mod tracker;

use bytes::Bytes;
use canterproto::lobby::LobbyCommand;
use canterproto::race::RaceCommand;
use canterproto::{CommandId, ProtoError};

/// Payload decoding for the lobby tier.
pub struct LobbyProtocol;

impl net::Protocol for LobbyProtocol {
    type Incoming = LobbyCommand;

    fn decode(command: CommandId, payload: Bytes) -> Result<LobbyCommand, ProtoError> {
        LobbyCommand::decode(command, payload)
    }
}

/// Payload decoding for the race tier.
pub struct RaceProtocol;

impl net::Protocol for RaceProtocol {
    type Incoming = RaceCommand;

    fn decode(command: CommandId, payload: Bytes) -> Result<RaceCommand, ProtoError> {
        RaceCommand::decode(command, payload)
    }
}
