//! Range table entries and binary-search lookup.
//!
//! A CMap's mappings live in two arrays: a table of [`RangeEntry`] values
//! sorted by `low`, and a flat overflow table of `i32` payloads that
//! `Table` and `Multi` entries point into.

/// How a [`RangeEntry`] interprets its `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKind {
    /// One code mapped to `offset`.
    Single,
    /// Contiguous codes mapped to contiguous destinations starting at `offset`.
    Range,
    /// Codes mapped through `table[offset + (code - low)]`.
    Table,
    /// One code mapped to `table[offset + 1 ..= offset + table[offset]]`.
    Multi,
}

/// One entry of the range table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeEntry {
    /// First code covered.
    pub low: u32,
    /// Last code covered (inclusive).
    pub high: u32,
    /// Lookup strategy.
    pub kind: RangeKind,
    /// Destination of `low`, or an index into the overflow table.
    pub offset: i32,
}

impl RangeEntry {
    /// Create an entry. Usable in `static` tables.
    pub const fn new(low: u32, high: u32, kind: RangeKind, offset: i32) -> Self {
        Self {
            low,
            high,
            kind,
            offset,
        }
    }

    /// True if `code` lies within `low..=high`.
    #[inline]
    pub fn contains(&self, code: u32) -> bool {
        self.low <= code && code <= self.high
    }

    /// Number of codes covered.
    #[inline]
    pub fn len(&self) -> u64 {
        (self.high - self.low) as u64 + 1
    }

    /// Always false: an entry covers at least its `low` code.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `offset + (code - low)`, the destination for `Single`/`Range` entries
    /// and the overflow index for `Table` entries.
    #[inline]
    pub(crate) fn offset_for(&self, code: u32) -> i32 {
        self.offset.wrapping_add((code - self.low) as i32)
    }
}

/// Binary search a sorted, non-overlapping range table for `code`.
pub fn find_range(ranges: &[RangeEntry], code: u32) -> Option<&RangeEntry> {
    let idx = ranges.partition_point(|r| r.high < code);
    ranges.get(idx).filter(|r| r.contains(code))
}
