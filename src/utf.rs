//! UTF-8 decoding and encoding helpers.
//!
//! Decoding is strict: every ill-formed sequence (stray continuation byte,
//! truncated sequence, overlong form, surrogate, value above U+10FFFF)
//! becomes U+FFFD and consumes exactly one byte, so decoding never fails and
//! well-formed input always round-trips.

/// Byte order mark written by some editors at the start of UTF-8 files.
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

// Sequence length and payload mask for each lead byte class (0xC0..=0xFF),
// indexed by (lead >> 3) - 0x18.
const UTF8_LEAD: [(usize, u8); 8] = [
    (2, 0x1f), // 110xx...
    (2, 0x1f),
    (2, 0x1f),
    (2, 0x1f),
    (3, 0x0f), // 1110x...
    (3, 0x0f),
    (4, 0x07), // 11110...
    (0, 0x00), // 11111... never valid
];

// Smallest codepoint that may use a sequence of the given length.
const MIN_FOR_LEN: [u32; 5] = [0, 0, 0x80, 0x800, 0x10000];

/// Read one UTF-8 character starting at `pos` and advance `pos`.
///
/// Returns `None` at the end of the buffer.
pub fn utf8_read(bytes: &[u8], pos: &mut usize) -> Option<char> {
    let lead = *bytes.get(*pos)?;
    *pos += 1;

    if lead < 0x80 {
        return Some(lead as char);
    }
    if lead < 0xc0 {
        return Some(REPLACEMENT_CHAR);
    }

    let (len, mask) = UTF8_LEAD[((lead >> 3) - 0x18) as usize];
    if len == 0 || *pos + len - 1 > bytes.len() {
        return Some(REPLACEMENT_CHAR);
    }

    let mut v = (lead & mask) as u32;
    for &b in &bytes[*pos..*pos + len - 1] {
        if b & 0xc0 != 0x80 {
            return Some(REPLACEMENT_CHAR);
        }
        v = (v << 6) | (b & 0x3f) as u32;
    }
    if v < MIN_FOR_LEN[len] {
        return Some(REPLACEMENT_CHAR);
    }
    match char::from_u32(v) {
        Some(c) => {
            *pos += len - 1;
            Some(c)
        }
        None => Some(REPLACEMENT_CHAR),
    }
}

/// Decode a whole buffer into codepoints.
pub fn utf8_decode(bytes: &[u8]) -> Vec<char> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while let Some(c) = utf8_read(bytes, &mut pos) {
        out.push(c);
    }
    out
}

/// Number of bytes the codepoints occupy once encoded.
pub fn utf8_size(chars: &[char]) -> usize {
    chars.iter().map(|c| c.len_utf8()).sum()
}

/// Encode codepoints as UTF-8.
pub fn utf8_encode(chars: &[char]) -> String {
    let mut out = String::with_capacity(utf8_size(chars));
    out.extend(chars.iter());
    out
}
