//! Loose version parsing and comparison
//!
//! Business Central app versions (`18.0.2.0`), release tags (`v18.0.2`) and
//! hand-typed strings (`18.1-beta`) do not share a format, so versions are
//! reduced to the sequence of integer runs they contain and compared
//! segment by segment.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

/// Integer segments extracted from a version string, left to right.
///
/// An empty `ParsedVersion` means the input contained no digits and cannot
/// be ordered against anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParsedVersion {
    segments: Vec<u64>,
}

impl ParsedVersion {
    pub fn new(segments: Vec<u64>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Compare with zero padding; see [`compare_segments`].
    pub fn compare(&self, other: &ParsedVersion) -> Ordering {
        compare_segments(&self.segments, &other.segments)
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Parse a version string into its integer segments.
///
/// Every maximal run of ASCII digits becomes one segment; everything else
/// (`v` prefixes, `.` separators, `-beta` suffixes) is discarded.
/// Runs that overflow `u64` saturate.
///
/// Examples:
/// - "1.4.2.0" -> [1, 4, 2, 0]
/// - "v2.0" -> [2, 0]
/// - "18.1-beta" -> [18, 1]
/// - "latest" -> []
pub fn parse(version: &str) -> ParsedVersion {
    let segments = DIGIT_RUN
        .find_iter(version)
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
        .collect();
    ParsedVersion { segments }
}

/// Compare two segment sequences, treating missing trailing segments as zero.
///
/// An empty sequence compares `Equal` to everything, so unparseable input
/// never ranks below a real version.
pub fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
    if a.is_empty() || b.is_empty() {
        return Ordering::Equal;
    }

    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let left = a.get(i).copied().unwrap_or(0);
            let right = b.get(i).copied().unwrap_or(0);
            left.cmp(&right)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Parse and compare two version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    parse(a).compare(&parse(b))
}

/// Strip a leading `v`/`V` from a release tag (`v18.0` -> `18.0`).
pub fn strip_tag_prefix(tag: &str) -> &str {
    match tag.strip_prefix(['v', 'V']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => tag,
    }
}
