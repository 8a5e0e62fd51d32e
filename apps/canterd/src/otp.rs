//! One-time passwords for cross-tier handoff.
//!
//! The lobby mints a code against an identity hash combining the character
//! and the resource the code is for (a room, or the character alone for the
//! messenger), so a code can never be replayed against a different room.
//! A code authorizes exactly one successful verify.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::RngCore;

/// Combine a value into a running identity hash.
fn hash_combine(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Identity of a character entering a specific room.
pub fn room_identity(character_uid: u32, room_uid: u32) -> u64 {
    hash_combine(u64::from(character_uid), u64::from(room_uid))
}

/// Identity of a character alone, for handoffs not bound to a room.
pub fn character_identity(character_uid: u32) -> u64 {
    hash_combine(u64::from(character_uid), 0)
}

#[derive(Debug, Default)]
pub struct OtpRegistry {
    codes: Mutex<HashMap<u64, u32>>,
}

impl OtpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a non-zero code for the identity, replacing any outstanding one.
    pub fn grant(&self, identity: u64) -> u32 {
        let mut code = 0u32;
        while code == 0 {
            code = OsRng.next_u32();
        }

        self.codes
            .lock()
            .expect("otp registry lock poisoned")
            .insert(identity, code);
        code
    }

    /// Verify a code and consume it on success.
    pub fn authorize(&self, identity: u64, code: u32) -> bool {
        let mut codes = self.codes.lock().expect("otp registry lock poisoned");
        match codes.get(&identity) {
            Some(&stored) if stored == code && code != 0 => {
                codes.remove(&identity);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_authorizes_exactly_once() {
        let otp = OtpRegistry::new();
        let identity = room_identity(44, 3);
        let code = otp.grant(identity);
        assert_ne!(code, 0);

        assert!(otp.authorize(identity, code));
        assert!(!otp.authorize(identity, code));
    }

    #[test]
    fn code_is_bound_to_the_room() {
        let otp = OtpRegistry::new();
        let code = otp.grant(room_identity(44, 3));

        // Same character, different room: replay must fail and must not
        // burn the outstanding code.
        assert!(!otp.authorize(room_identity(44, 4), code));
        assert!(otp.authorize(room_identity(44, 3), code));
    }

    #[test]
    fn wrong_code_does_not_consume() {
        let otp = OtpRegistry::new();
        let identity = character_identity(44);
        let code = otp.grant(identity);
        assert!(!otp.authorize(identity, code.wrapping_add(1)));
        assert!(otp.authorize(identity, code));
    }

    #[test]
    fn regrant_replaces_the_outstanding_code() {
        let otp = OtpRegistry::new();
        let identity = room_identity(7, 7);
        let old = otp.grant(identity);
        let new = otp.grant(identity);
        if old != new {
            assert!(!otp.authorize(identity, old));
        }
        assert!(otp.authorize(identity, new));
    }
}
