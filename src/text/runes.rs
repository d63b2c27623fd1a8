//! UTF-8 text <-> codepoint (rune) conversions

use crate::utf::{utf8_decode, utf8_encode};

/// Decode UTF-8 bytes into codepoints.
///
/// Ill-formed sequences become U+FFFD, one per offending byte.
pub fn runes_from_cstring(bytes: &[u8]) -> Vec<char> {
    utf8_decode(bytes)
}

/// Encode codepoints back into UTF-8 text.
pub fn runes_to_cstring(runes: &[char]) -> String {
    utf8_encode(runes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runes_round_trip() {
        for s in ["", "abc", "héllo", "Привет, мир", "日本語テキスト", "🎉x🎉"] {
            let runes = runes_from_cstring(s.as_bytes());
            assert_eq!(runes.len(), s.chars().count());
            assert_eq!(runes_to_cstring(&runes), s);
        }
    }

    #[test]
    fn test_runes_invalid_input() {
        let runes = runes_from_cstring(b"a\xffb");
        assert_eq!(runes, vec!['a', '\u{FFFD}', 'b']);
    }
}
