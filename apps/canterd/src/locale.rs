//! Boundary string helpers.
//!
//! The client speaks EUC-KR; the codec keeps strings as opaque bytes and
//! conversion happens only here, at display and validation sites. Nickname
//! validation is two-script aware: Latin names need at least three
//! letters, pure-Korean names at least two, and the whole name must fit
//! the client-side byte budget where Hangul syllables are two bytes wide.

const EUC_KR_WIDE_BYTES: usize = 2;
const EUC_KR_NARROW_BYTES: usize = 1;

const MIN_LATIN_LETTERS: usize = 3;
const MIN_KOREAN_LETTERS: usize = 2;

/// Default nickname byte budget in the client encoding.
pub const MAX_NAME_BYTES: usize = 16;

/// Lossy display form for logging. Names on the wire are raw bytes; logs
/// want something printable.
pub fn display(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Validates a nickname against the two-script rules.
///
/// The input is the wire bytes interpreted as UTF-8; a name that does not
/// decode is invalid outright.
pub fn is_name_valid(input: &[u8], max_byte_capacity: usize) -> bool {
    let Ok(name) = std::str::from_utf8(input) else {
        return false;
    };
    if name.is_empty() {
        return false;
    }

    let mut korean_letters = 0usize;
    let mut latin_letters = 0usize;
    let mut codepoints = 0usize;
    for c in name.chars() {
        codepoints += 1;
        if is_hangul_syllable(c) {
            korean_letters += 1;
        } else if is_latin_letter(c) {
            latin_letters += 1;
        } else {
            return false;
        }
    }

    // Length limit counts bytes in the client encoding, not codepoints.
    let byte_count = korean_letters * EUC_KR_WIDE_BYTES + latin_letters * EUC_KR_NARROW_BYTES;
    if byte_count > max_byte_capacity {
        return false;
    }

    // Arabic numerals count as Latin, so Korean names with digits are held
    // to the longer Latin minimum.
    let is_pure_korean = latin_letters == 0 && korean_letters > 0;
    let min_letters = if is_pure_korean {
        MIN_KOREAN_LETTERS
    } else {
        MIN_LATIN_LETTERS
    };

    codepoints >= min_letters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_names() {
        for name in [
            "validName1",
            "valid-name2",
            "valid_name3",
            "valid.name4",
            "가123-",
            "가가.가가9",
            "가가",
        ] {
            assert!(is_name_valid(name.as_bytes(), MAX_NAME_BYTES), "{name}");
        }
    }

    #[test]
    fn rejects_invalid_names() {
        for name in [
            "",
            // Too long in the client encoding.
            "invalidLatinNameBEcauseOfLength211",
            "가가가가가가가가가가가가",
            // Symbols outside both scripts.
            "%!@^",
            "name with space",
            // Below the per-script minimums.
            "ab",
            "가",
        ] {
            assert!(!is_name_valid(name.as_bytes(), MAX_NAME_BYTES), "{name}");
        }
    }

    #[test]
    fn korean_with_digits_needs_latin_minimum() {
        // One syllable plus one digit is two codepoints, below the Latin
        // minimum of three that applies once a digit appears.
        assert!(!is_name_valid("가1".as_bytes(), MAX_NAME_BYTES));
        assert!(is_name_valid("가12".as_bytes(), MAX_NAME_BYTES));
    }

    #[test]
    fn non_utf8_input_is_invalid() {
        assert!(!is_name_valid(&[0xB1, 0xB8], MAX_NAME_BYTES));
    }

    #[test]
    fn display_is_lossy_not_panicky() {
        assert_eq!(display(b"rider"), "rider");
        let _ = display(&[0xFF, 0xFE]);
    }
}
