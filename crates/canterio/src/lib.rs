//! `canterio`: framed transport shared by the canter server tiers.
//!
//! Every message on the wire is:
//! - a 4-byte little-endian "magic" word carrying the command id and the
//!   payload length, both mixed with a fixed bit pattern (see [`magic`]),
//! - followed by the payload, XOR-scrambled with a per-client 4-byte key
//!   (see [`scramble`]).
//!
//! Payload decoding is left to `canterproto`; this crate only deals in
//! `(command id, payload bytes)` frames.

pub mod frame;
pub mod magic;
pub mod scramble;

pub use frame::{Frame, FrameError, FrameReader, FrameWriter, RawFrame};
pub use magic::{MessageMagic, MAX_PAYLOAD_LEN};
pub use scramble::Scrambler;
