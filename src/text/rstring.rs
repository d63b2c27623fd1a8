//! RuneString: a string indexed by codepoints rather than bytes.
//!
//! Slices and unchanged results borrow from the string they came from;
//! anything that needs new storage owns its runes. The borrow checker keeps
//! a view from outliving its parent.

use std::borrow::Cow;
use std::fmt;

use super::runes::{runes_from_cstring, runes_to_cstring};
use crate::utf::utf8_size;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuneString<'a> {
    runes: Cow<'a, [char]>,
    /// Bytes of the UTF-8 text the runes came from.
    size: usize,
}

impl Default for RuneString<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RuneString<'a> {
    /// Empty string.
    pub fn new() -> Self {
        RuneString {
            runes: Cow::Borrowed(&[]),
            size: 0,
        }
    }

    /// Decode UTF-8 text into an owned string.
    pub fn from_cstring(text: impl AsRef<[u8]>) -> RuneString<'static> {
        let bytes = text.as_ref();
        RuneString {
            runes: Cow::Owned(runes_from_cstring(bytes)),
            size: bytes.len(),
        }
    }

    /// Borrowed view over existing runes.
    pub fn from_runes(runes: &'a [char]) -> Self {
        RuneString {
            size: utf8_size(runes),
            runes: Cow::Borrowed(runes),
        }
    }

    fn owned(runes: Vec<char>) -> RuneString<'static> {
        RuneString {
            size: utf8_size(&runes),
            runes: Cow::Owned(runes),
        }
    }

    fn view(&self, start: usize, end: usize) -> RuneString<'_> {
        RuneString::from_runes(&self.runes[start..end])
    }

    pub fn to_cstring(&self) -> String {
        runes_to_cstring(&self.runes)
    }

    /// Number of codepoints.
    pub fn length(&self) -> usize {
        self.runes.len()
    }

    /// Number of bytes in the UTF-8 form.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.runes.is_empty()
    }

    /// True when this string owns its runes, false for a borrowed view.
    pub fn is_owning(&self) -> bool {
        matches!(self.runes, Cow::Owned(_))
    }

    pub fn as_runes(&self) -> &[char] {
        &self.runes
    }

    pub fn into_owned(self) -> RuneString<'static> {
        RuneString {
            runes: Cow::Owned(self.runes.into_owned()),
            size: self.size,
        }
    }

    /// Codepoint at `idx`, `None` when out of range.
    pub fn at(&self, idx: usize) -> Option<char> {
        self.runes.get(idx).copied()
    }

    /// Runes in `[start, end)`. Negative indices count from the end; both
    /// bounds are clamped to the string.
    pub fn slice(&self, start: i64, end: i64) -> RuneString<'_> {
        let len = self.length() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start.min(len) };
        let end = if end < 0 { (len + end).max(0) } else { end.min(len) };
        if start >= end {
            return RuneString::new();
        }
        self.view(start as usize, end as usize)
    }

    /// `length` runes starting at `start`.
    pub fn substring(&self, start: usize, length: usize) -> RuneString<'_> {
        let end = start.saturating_add(length);
        self.slice(to_index(start), to_index(end))
    }

    /// Position of the first occurrence of `other`, -1 if absent.
    pub fn index(&self, other: &RuneString<'_>) -> i64 {
        let needle = other.as_runes();
        if needle.is_empty() {
            return 0;
        }
        self.runes
            .windows(needle.len())
            .position(|w| w == needle)
            .map_or(-1, |i| i as i64)
    }

    /// Position of the last occurrence of `other`, -1 if absent.
    pub fn last_index(&self, other: &RuneString<'_>) -> i64 {
        let needle = other.as_runes();
        if needle.is_empty() {
            return self.length() as i64;
        }
        self.runes
            .windows(needle.len())
            .rposition(|w| w == needle)
            .map_or(-1, |i| i as i64)
    }

    /// Replace each rune found in `from` by the rune at the same position in
    /// `to`. Runes of `from` with no counterpart in `to` are deleted.
    pub fn translate(&self, from: &RuneString<'_>, to: &RuneString<'_>) -> RuneString<'_> {
        let from = from.as_runes();
        let to = to.as_runes();
        if !self.runes.iter().any(|c| from.contains(c)) {
            return self.view(0, self.length());
        }
        let mut out = Vec::with_capacity(self.length());
        for c in self.runes.iter() {
            match from.iter().position(|f| f == c) {
                Some(pos) => {
                    if let Some(&replacement) = to.get(pos) {
                        out.push(replacement);
                    }
                }
                None => out.push(*c),
            }
        }
        RuneString::owned(out)
    }

    pub fn reverse(&self) -> RuneString<'_> {
        if self.length() < 2 {
            return self.view(0, self.length());
        }
        RuneString::owned(self.runes.iter().rev().copied().collect())
    }

    /// Drop the leading run of runes contained in `chars`.
    pub fn trim_left(&self, chars: &RuneString<'_>) -> RuneString<'_> {
        let chars = chars.as_runes();
        let start = self
            .runes
            .iter()
            .position(|c| !chars.contains(c))
            .unwrap_or(self.length());
        self.view(start, self.length())
    }

    /// Drop the trailing run of runes contained in `chars`.
    pub fn trim_right(&self, chars: &RuneString<'_>) -> RuneString<'_> {
        let chars = chars.as_runes();
        let end = self
            .runes
            .iter()
            .rposition(|c| !chars.contains(c))
            .map_or(0, |i| i + 1);
        self.view(0, end)
    }

    pub fn trim(&self, chars: &RuneString<'_>) -> RuneString<'_> {
        let set = chars.as_runes();
        let start = self
            .runes
            .iter()
            .position(|c| !set.contains(c))
            .unwrap_or(self.length());
        let end = self
            .runes
            .iter()
            .rposition(|c| !set.contains(c))
            .map_or(start, |i| i + 1);
        self.view(start, end.max(start))
    }

    /// Prepend copies of `fill` until the string is `length` runes long.
    /// Longer strings are returned unchanged. An empty fill pads with spaces.
    pub fn pad_left(&self, length: usize, fill: &RuneString<'_>) -> RuneString<'_> {
        if self.length() >= length {
            return self.view(0, self.length());
        }
        let padding = fill_runes(fill, length - self.length());
        let mut out = Vec::with_capacity(length);
        out.extend(padding);
        out.extend_from_slice(&self.runes);
        RuneString::owned(out)
    }

    /// Append copies of `fill` until the string is `length` runes long.
    pub fn pad_right(&self, length: usize, fill: &RuneString<'_>) -> RuneString<'_> {
        if self.length() >= length {
            return self.view(0, self.length());
        }
        let padding = fill_runes(fill, length - self.length());
        let mut out = Vec::with_capacity(length);
        out.extend_from_slice(&self.runes);
        out.extend(padding);
        RuneString::owned(out)
    }
}

fn fill_runes<'f>(fill: &'f RuneString<'_>, count: usize) -> impl Iterator<Item = char> + 'f {
    const SPACE: &[char] = &[' '];
    let fill = if fill.is_empty() {
        SPACE
    } else {
        fill.as_runes()
    };
    fill.iter().copied().cycle().take(count)
}

fn to_index(v: usize) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

impl fmt::Display for RuneString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cstring())
    }
}
