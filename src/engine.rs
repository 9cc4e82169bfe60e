//! Literal, in-memory substitution of an ordered list of pairs.
//!
//! Pairs are applied left to right, each against the output of the previous
//! one. Matching is non-overlapping and leftmost: after a match the scan
//! resumes past the matched bytes. Content is treated as raw bytes, so files
//! that are not valid UTF-8 are handled without loss.

use crate::config::ReplacePair;
use std::borrow::Cow;

/// The result of applying a pair list to one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// The content after every pair has been applied.
    pub content: Vec<u8>,
    /// Matches per pair, in the same order as the input list.
    pub counts: Vec<usize>,
    /// `true` iff `content` differs byte-for-byte from the input.
    pub changed: bool,
}

impl Substitution {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Applies `pairs` in order to `content`.
///
/// A pair with an empty search string matches nothing.
pub fn apply(content: &[u8], pairs: &[ReplacePair]) -> Substitution {
    let mut current = Cow::Borrowed(content);
    let mut counts = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let (next, count) = replace_all(
            current.as_ref(),
            pair.search.as_bytes(),
            pair.replace.as_bytes(),
        );
        counts.push(count);
        if let Some(next) = next {
            current = Cow::Owned(next);
        }
    }

    let changed = current.as_ref() != content;
    Substitution {
        content: current.into_owned(),
        counts,
        changed,
    }
}

/// Replaces every non-overlapping occurrence of `needle`.
///
/// Returns `None` for the buffer when nothing matched, so callers can keep
/// borrowing the input.
fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> (Option<Vec<u8>>, usize) {
    let Some(first) = find(haystack, needle, 0) else {
        return (None, 0);
    };

    let mut out = Vec::with_capacity(haystack.len());
    let mut count = 0;
    let mut last = 0;
    let mut next = Some(first);
    while let Some(start) = next {
        out.extend_from_slice(&haystack[last..start]);
        out.extend_from_slice(replacement);
        last = start + needle.len();
        count += 1;
        next = find(haystack, needle, last);
    }
    out.extend_from_slice(&haystack[last..]);
    (Some(out), count)
}

/// Leftmost position of `needle` at or after `from`.
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() || haystack.len() - from < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}
