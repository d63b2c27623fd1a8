//! ByteString: a string indexed by bytes.

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteString<'a> {
    bytes: Cow<'a, [u8]>,
}

impl Default for ByteString<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Whitespace as C's isspace() sees it.
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

impl<'a> ByteString<'a> {
    pub fn new() -> Self {
        ByteString {
            bytes: Cow::Borrowed(&[]),
        }
    }

    /// Borrowed view over existing bytes.
    pub fn from_cstring(bytes: &'a [u8]) -> Self {
        ByteString {
            bytes: Cow::Borrowed(bytes),
        }
    }

    fn owned(bytes: Vec<u8>) -> ByteString<'static> {
        ByteString {
            bytes: Cow::Owned(bytes),
        }
    }

    fn view(&self, start: usize, end: usize) -> ByteString<'_> {
        ByteString::from_cstring(&self.bytes[start..end])
    }

    fn whole(&self) -> ByteString<'_> {
        self.view(0, self.length())
    }

    /// Text form; invalid UTF-8 is replaced.
    pub fn to_cstring(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn length(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_owning(&self) -> bool {
        matches!(self.bytes, Cow::Owned(_))
    }

    pub fn into_owned(self) -> ByteString<'static> {
        ByteString::owned(self.bytes.into_owned())
    }

    pub fn at(&self, idx: usize) -> Option<u8> {
        self.bytes.get(idx).copied()
    }

    /// Bytes in `[start, end)`, negative indices counting from the end.
    pub fn slice(&self, start: i64, end: i64) -> ByteString<'_> {
        let len = self.length() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start.min(len) };
        let end = if end < 0 { (len + end).max(0) } else { end.min(len) };
        if start >= end {
            return ByteString::new();
        }
        self.view(start as usize, end as usize)
    }

    pub fn substring(&self, start: usize, length: usize) -> ByteString<'_> {
        let start = start.min(self.length());
        let end = start.saturating_add(length).min(self.length());
        self.view(start, end)
    }

    pub fn index(&self, other: &ByteString<'_>) -> i64 {
        find(&self.bytes, &other.bytes).map_or(-1, |i| i as i64)
    }

    pub fn last_index(&self, other: &ByteString<'_>) -> i64 {
        let needle = other.as_bytes();
        if needle.is_empty() {
            return self.length() as i64;
        }
        self.bytes
            .windows(needle.len())
            .rposition(|w| w == needle)
            .map_or(-1, |i| i as i64)
    }

    pub fn contains(&self, other: &ByteString<'_>) -> bool {
        self.index(other) >= 0
    }

    pub fn equals(&self, other: &ByteString<'_>) -> bool {
        self.bytes == other.bytes
    }

    pub fn has_prefix(&self, other: &ByteString<'_>) -> bool {
        self.bytes.starts_with(&other.bytes)
    }

    pub fn has_suffix(&self, other: &ByteString<'_>) -> bool {
        self.bytes.ends_with(&other.bytes)
    }

    /// Non-overlapping occurrences of `other`; zero for an empty needle.
    pub fn count(&self, other: &ByteString<'_>) -> usize {
        let needle = other.as_bytes();
        if needle.is_empty() {
            return 0;
        }
        let mut count = 0;
        let mut rest: &[u8] = &self.bytes;
        while let Some(pos) = find(rest, needle) {
            count += 1;
            rest = &rest[pos + needle.len()..];
        }
        count
    }

    /// The `part`-th (0-based) piece when splitting by `sep`; empty when
    /// there is no such piece.
    pub fn split_part(&self, sep: &ByteString<'_>, part: usize) -> ByteString<'_> {
        let sep = sep.as_bytes();
        if sep.is_empty() {
            return if part == 0 { self.whole() } else { ByteString::new() };
        }
        let mut start = 0;
        let mut idx = 0;
        loop {
            let next = find(&self.bytes[start..], sep).map(|pos| start + pos);
            let end = next.unwrap_or(self.length());
            if idx == part {
                return self.view(start, end);
            }
            match next {
                Some(pos) => {
                    start = pos + sep.len();
                    idx += 1;
                }
                None => return ByteString::new(),
            }
        }
    }

    pub fn join(strings: &[ByteString<'_>], sep: &ByteString<'_>) -> ByteString<'static> {
        let parts: Vec<&[u8]> = strings.iter().map(|s| s.as_bytes()).collect();
        ByteString::owned(parts.join(sep.as_bytes()))
    }

    pub fn concat(strings: &[ByteString<'_>]) -> ByteString<'static> {
        let parts: Vec<&[u8]> = strings.iter().map(|s| s.as_bytes()).collect();
        ByteString::owned(parts.concat())
    }

    pub fn repeat(&self, count: usize) -> ByteString<'_> {
        match count {
            0 => ByteString::new(),
            1 => self.whole(),
            _ => ByteString::owned(self.bytes.repeat(count)),
        }
    }

    /// Replace at most `max_count` leftmost non-overlapping occurrences of
    /// `old` by `new`.
    pub fn replace(
        &self,
        old: &ByteString<'_>,
        new: &ByteString<'_>,
        max_count: usize,
    ) -> ByteString<'_> {
        let old = old.as_bytes();
        if old.is_empty() || max_count == 0 || find(&self.bytes, old).is_none() {
            return self.whole();
        }
        let mut out = Vec::with_capacity(self.length());
        let mut rest: &[u8] = &self.bytes;
        let mut replaced = 0;
        while replaced < max_count {
            match find(rest, old) {
                Some(pos) => {
                    out.extend_from_slice(&rest[..pos]);
                    out.extend_from_slice(new.as_bytes());
                    rest = &rest[pos + old.len()..];
                    replaced += 1;
                }
                None => break,
            }
        }
        out.extend_from_slice(rest);
        ByteString::owned(out)
    }

    pub fn replace_all(&self, old: &ByteString<'_>, new: &ByteString<'_>) -> ByteString<'_> {
        self.replace(old, new, usize::MAX)
    }

    pub fn reverse(&self) -> ByteString<'_> {
        if self.length() < 2 {
            return self.whole();
        }
        ByteString::owned(self.bytes.iter().rev().copied().collect())
    }

    pub fn trim_left(&self) -> ByteString<'_> {
        let start = self
            .bytes
            .iter()
            .position(|&b| !is_space(b))
            .unwrap_or(self.length());
        self.view(start, self.length())
    }

    pub fn trim_right(&self) -> ByteString<'_> {
        let end = self
            .bytes
            .iter()
            .rposition(|&b| !is_space(b))
            .map_or(0, |i| i + 1);
        self.view(0, end)
    }

    pub fn trim(&self) -> ByteString<'_> {
        let start = self
            .bytes
            .iter()
            .position(|&b| !is_space(b))
            .unwrap_or(self.length());
        let end = self
            .bytes
            .iter()
            .rposition(|&b| !is_space(b))
            .map_or(start, |i| i + 1);
        self.view(start, end.max(start))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl fmt::Display for ByteString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}
