//! Payload scrambling.
//!
//! Payloads are XORed byte-by-byte with a repeating 4-byte key indexed by
//! position modulo 4, so the same operation scrambles and unscrambles. Every
//! connection starts from the fixed key; a tier may later re-arm the key
//! with a 4-byte code it handed to the client (the lobby does this with the
//! scrambling constant carried in its login acknowledgement).

/// The initial scrambling key every connection starts with.
pub const SCRAMBLE_KEY: [u8; 4] = [0xCB, 0x91, 0x01, 0xA2];

/// Per-direction scrambler state for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scrambler {
    key: [u8; 4],
}

impl Default for Scrambler {
    fn default() -> Self {
        Self { key: SCRAMBLE_KEY }
    }
}

impl Scrambler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-arms the key with a code agreed with the client. A code of zero
    /// restores the initial key.
    pub fn set_code(&mut self, code: u32) {
        let code = code.to_le_bytes();
        for (k, c) in self.key.iter_mut().zip(code) {
            *k = c;
        }
        if code == [0; 4] {
            self.key = SCRAMBLE_KEY;
        }
    }

    /// Restores the initial key.
    pub fn reset(&mut self) {
        self.key = SCRAMBLE_KEY;
    }

    /// Applies the key in place. Involutive: applying twice restores the
    /// input.
    pub fn apply(&self, buf: &mut [u8]) {
        for (idx, byte) in buf.iter_mut().enumerate() {
            *byte ^= self.key[idx % 4];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_twice_restores_input() {
        let original: Vec<u8> = (0..=255).collect();
        let mut buf = original.clone();

        let s = Scrambler::new();
        s.apply(&mut buf);
        assert_ne!(buf, original);
        s.apply(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn default_key_pattern() {
        let mut buf = [0u8; 8];
        Scrambler::new().apply(&mut buf);
        assert_eq!(buf, [0xCB, 0x91, 0x01, 0xA2, 0xCB, 0x91, 0x01, 0xA2]);
    }

    #[test]
    fn code_replacement_round_trips() {
        let mut a = Scrambler::new();
        let mut b = Scrambler::new();
        a.set_code(0xDEAD_BEEF);
        b.set_code(0xDEAD_BEEF);

        let original = b"race payload".to_vec();
        let mut buf = original.clone();
        a.apply(&mut buf);
        b.apply(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn zero_code_restores_initial_key() {
        let mut s = Scrambler::new();
        s.set_code(0x1234_5678);
        s.set_code(0);
        assert_eq!(s, Scrambler::new());
    }
}
