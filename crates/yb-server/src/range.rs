//! Client byte-range parsing.
//!
//! Only single ranges are translated upstream. A multi-range or malformed
//! `Range` header is ignored and the full resource is requested, which is a
//! valid response to any range request.

use std::fmt;

/// A single byte range from a client `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-` or `bytes=start-end` (inclusive).
    From { start: u64, end: Option<u64> },
    /// `bytes=-n`: the last `n` bytes.
    Suffix(u64),
}

impl ByteRange {
    /// Parse a `Range` header value.
    ///
    /// Returns `None` for anything other than exactly one well-formed byte
    /// range.
    pub fn parse(value: &str) -> Option<Self> {
        let set = value.trim().strip_prefix("bytes=")?.trim();
        if set.contains(',') {
            return None;
        }
        let (start, end) = set.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            let n: u64 = end.parse().ok()?;
            return (n > 0).then_some(ByteRange::Suffix(n));
        }

        let start: u64 = start.parse().ok()?;
        let end = if end.is_empty() {
            None
        } else {
            let end: u64 = end.parse().ok()?;
            if end < start {
                return None;
            }
            Some(end)
        };
        Some(ByteRange::From { start, end })
    }

    /// Resolve against a known total length into inclusive `(start, end)`,
    /// or `None` when the range is unsatisfiable.
    pub fn resolve(&self, total: u64) -> Option<(u64, u64)> {
        if total == 0 {
            return None;
        }
        match *self {
            ByteRange::From { start, end } => {
                if start >= total {
                    return None;
                }
                let end = end.map_or(total - 1, |e| e.min(total - 1));
                Some((start, end))
            }
            ByteRange::Suffix(n) => Some((total.saturating_sub(n), total - 1)),
        }
    }
}

/// Canonical header form, as sent upstream.
impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteRange::From { start, end: Some(end) } => write!(f, "bytes={start}-{end}"),
            ByteRange::From { start, end: None } => write!(f, "bytes={start}-"),
            ByteRange::Suffix(n) => write!(f, "bytes=-{n}"),
        }
    }
}

/// Parse a `Content-Range: bytes start-end/total` value.
pub fn parse_content_range(value: &str) -> Option<(u64, u64, Option<u64>)> {
    let rest = value.trim().strip_prefix("bytes ")?;
    let (span, total) = rest.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?, total))
}
