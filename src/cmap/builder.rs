//! Incremental CMap construction and range-table optimization.
//!
//! Mappings are appended in whatever order the source supplies them. Once
//! everything is in, [`CMapBuilder::sort_and_merge`] sorts the range table
//! and coalesces neighbours:
//!
//! - contiguous codes with contiguous destinations become one `Range`;
//! - contiguous single codes with scattered destinations become a `Table`;
//! - one-to-many (`Multi`) entries are left alone.

use super::codespace::{CodespaceRange, MAX_CODESPACES};
use super::range::{RangeEntry, RangeKind};
use super::{CMap, WritingMode};
use crate::error::{Error, Result};

/// Mutable CMap under construction.
///
/// # Examples
///
/// ```
/// use cmap_oxide::cmap::CMapBuilder;
///
/// let mut builder = CMapBuilder::new();
/// builder.add_codespace(0x0000, 0xFFFF, 2).unwrap();
/// builder.map_range_to_range(0x0020, 0x007E, 1).unwrap();
/// builder.map_one_to_many(0x0080, &[0x66, 0x69]).unwrap();
/// let cmap = builder.build().unwrap();
///
/// assert_eq!(cmap.resolve_code(0x0041), Some(0x22));
/// assert_eq!(cmap.resolve_code_multi(0x0080), Some(&[0x66, 0x69][..]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CMapBuilder {
    name: String,
    use_cmap_name: Option<String>,
    writing_mode: WritingMode,
    codespaces: Vec<CodespaceRange>,
    ranges: Vec<RangeEntry>,
    table: Vec<i32>,
}

impl CMapBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CMap name (`/CMapName`).
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Record the name of the parent CMap (`usecmap`).
    pub fn set_use_cmap_name(&mut self, name: impl Into<String>) {
        self.use_cmap_name = Some(name.into());
    }

    /// Set the writing mode (`/WMode`).
    pub fn set_writing_mode(&mut self, mode: WritingMode) {
        self.writing_mode = mode;
    }

    /// Registered codespace ranges, in insertion order.
    pub fn codespaces(&self) -> &[CodespaceRange] {
        &self.codespaces
    }

    /// Current range table (unsorted until [`sort_and_merge`](Self::sort_and_merge)).
    pub fn ranges(&self) -> &[RangeEntry] {
        &self.ranges
    }

    /// Current overflow table.
    pub fn table(&self) -> &[i32] {
        &self.table
    }

    /// Append a codespace range of `n` bytes.
    ///
    /// Fails with [`Error::TooManyCodespaces`] once `MAX_CODESPACES - 1`
    /// ranges exist; the builder is left unchanged.
    pub fn add_codespace(&mut self, lo: u32, hi: u32, n: usize) -> Result<()> {
        if self.codespaces.len() + 1 >= MAX_CODESPACES {
            return Err(Error::TooManyCodespaces(MAX_CODESPACES - 1));
        }
        let range = CodespaceRange::new(lo, hi, n)?;
        self.codespaces.push(range);
        Ok(())
    }

    /// Map `low..=high` to `offset..`.
    pub fn map_range_to_range(&mut self, low: u32, high: u32, offset: i32) -> Result<()> {
        if low > high {
            return Err(Error::InvalidRange { low, high });
        }
        let kind = if low == high { RangeKind::Single } else { RangeKind::Range };
        self.add_range(RangeEntry::new(low, high, kind, offset))
    }

    /// Map `low..low + values.len()` through an explicit table.
    pub fn map_range_to_table(&mut self, low: u32, values: &[i32]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let high = u32::try_from(values.len() - 1)
            .ok()
            .and_then(|span| low.checked_add(span))
            .ok_or(Error::InvalidRange { low, high: u32::MAX })?;

        let offset = self.table_offset()?;
        self.extend_table(values)?;
        self.add_range(RangeEntry::new(low, high, RangeKind::Table, offset))
    }

    /// Map the single code `low` to a sequence of values.
    ///
    /// A one-element sequence is stored as a plain one-to-one mapping.
    pub fn map_one_to_many(&mut self, low: u32, values: &[i32]) -> Result<()> {
        match values {
            [] => Ok(()),
            [value] => self.add_range(RangeEntry::new(low, low, RangeKind::Single, *value)),
            _ => {
                let count = i32::try_from(values.len())
                    .map_err(|_| Error::OutOfMemory("cmap one-to-many mapping"))?;
                let offset = self.table_offset()?;
                self.table
                    .try_reserve(values.len() + 1)
                    .map_err(|_| Error::OutOfMemory("cmap table"))?;
                self.table.push(count);
                self.table.extend_from_slice(values);
                self.add_range(RangeEntry::new(low, low, RangeKind::Multi, offset))
            },
        }
    }

    fn add_range(&mut self, entry: RangeEntry) -> Result<()> {
        self.ranges
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory("cmap ranges"))?;
        self.ranges.push(entry);
        Ok(())
    }

    fn extend_table(&mut self, values: &[i32]) -> Result<()> {
        self.table
            .try_reserve(values.len())
            .map_err(|_| Error::OutOfMemory("cmap table"))?;
        self.table.extend_from_slice(values);
        Ok(())
    }

    fn table_offset(&self) -> Result<i32> {
        i32::try_from(self.table.len()).map_err(|_| Error::OutOfMemory("cmap table"))
    }

    /// Sort the range table and merge adjacent entries.
    ///
    /// Every code mapped before the call resolves to the same value(s)
    /// afterwards. Entries sharing the same `low` are not supported.
    pub fn sort_and_merge(&mut self) -> Result<()> {
        if self.ranges.is_empty() {
            return Ok(());
        }

        let before = self.ranges.len();
        self.ranges.sort_unstable_by_key(|r| r.low);

        let input = std::mem::take(&mut self.ranges);
        let mut out: Vec<RangeEntry> = Vec::new();
        out.try_reserve_exact(input.len())
            .map_err(|_| Error::OutOfMemory("cmap ranges"))?;

        let mut input = input.into_iter();
        if let Some(first) = input.next() {
            out.push(first);
        }

        for b in input {
            let last = out.len() - 1;
            let a = out[last];

            let input_contiguous = b.kind != RangeKind::Multi && a.high.checked_add(1) == Some(b.low);
            if !input_contiguous {
                out.push(b);
                continue;
            }

            match (a.kind, b.kind) {
                (RangeKind::Single | RangeKind::Range, RangeKind::Single | RangeKind::Range)
                    if output_contiguous(&a, &b) =>
                {
                    out[last].kind = RangeKind::Range;
                    out[last].high = b.high;
                },
                (RangeKind::Table, RangeKind::Single) => {
                    self.append_to_table(&mut out[last], b.offset)?;
                },
                (RangeKind::Single, RangeKind::Single) => {
                    let start = self.table_offset()?;
                    self.extend_table(&[a.offset, b.offset])?;
                    out[last] = RangeEntry::new(a.low, b.high, RangeKind::Table, start);
                },
                _ => out.push(b),
            }
        }

        out.shrink_to_fit();
        self.table.shrink_to_fit();
        self.ranges = out;

        log::debug!(
            "sorted cmap '{}': {} -> {} ranges, {} table entries",
            self.name,
            before,
            self.ranges.len(),
            self.table.len()
        );
        Ok(())
    }

    /// Grow a `Table` entry by one code mapped to `value`.
    ///
    /// The entry's slice must end at the tail of the overflow table for the
    /// append to land next to it; if another table was appended after it,
    /// the slice is copied to the tail first.
    fn append_to_table(&mut self, entry: &mut RangeEntry, value: i32) -> Result<()> {
        let start = entry.offset as usize;
        let len = (entry.high - entry.low) as usize + 1;

        if start + len != self.table.len() {
            self.table
                .try_reserve(len + 1)
                .map_err(|_| Error::OutOfMemory("cmap table"))?;
            entry.offset = self.table_offset()?;
            self.table.extend_from_within(start..start + len);
        }

        self.extend_table(&[value])?;
        entry.high += 1;
        Ok(())
    }

    /// Optimize and freeze into an immutable [`CMap`].
    pub fn build(mut self) -> Result<CMap> {
        self.sort_and_merge()?;
        Ok(CMap::from_parts(
            self.name,
            self.use_cmap_name,
            self.writing_mode,
            self.codespaces,
            self.ranges,
            self.table,
        ))
    }
}

/// True if `b`'s destinations continue where `a`'s stop.
fn output_contiguous(a: &RangeEntry, b: &RangeEntry) -> bool {
    (a.high - a.low) as i64 + a.offset as i64 + 1 == b.offset as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(builder: &mut CMapBuilder) -> Vec<RangeEntry> {
        builder.sort_and_merge().unwrap();
        builder.ranges().to_vec()
    }

    // ========================================================================
    // Append Operations
    // ========================================================================

    #[test]
    fn test_codespace_cap() {
        let mut builder = CMapBuilder::new();
        for i in 0..9 {
            builder.add_codespace(i, i, 1).unwrap();
        }
        let err = builder.add_codespace(0x20, 0x20, 1).unwrap_err();
        assert!(matches!(err, Error::TooManyCodespaces(9)));
        assert_eq!(builder.codespaces().len(), 9);
    }

    #[test]
    fn test_range_to_range_kinds() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_range(5, 5, 50).unwrap();
        builder.map_range_to_range(10, 20, 100).unwrap();
        assert_eq!(builder.ranges()[0].kind, RangeKind::Single);
        assert_eq!(builder.ranges()[1].kind, RangeKind::Range);
    }

    #[test]
    fn test_range_to_range_rejects_inverted() {
        let mut builder = CMapBuilder::new();
        let err = builder.map_range_to_range(10, 5, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { low: 10, high: 5 }));
        assert!(builder.ranges().is_empty());
    }

    #[test]
    fn test_range_to_table_spans_len_codes() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_table(0x40, &[9, 3, 7]).unwrap();
        assert_eq!(builder.ranges(), &[RangeEntry::new(0x40, 0x42, RangeKind::Table, 0)]);
        assert_eq!(builder.table(), &[9, 3, 7]);
    }

    #[test]
    fn test_range_to_table_overflowing_code_space() {
        let mut builder = CMapBuilder::new();
        assert!(builder.map_range_to_table(u32::MAX, &[1, 2]).is_err());
        assert!(builder.table().is_empty());
    }

    #[test]
    fn test_one_to_many_collapses_single_value() {
        let mut builder = CMapBuilder::new();
        builder.map_one_to_many(0x41, &[0x2000]).unwrap();
        assert_eq!(builder.ranges(), &[RangeEntry::new(0x41, 0x41, RangeKind::Single, 0x2000)]);
        assert!(builder.table().is_empty());
    }

    #[test]
    fn test_one_to_many_record_layout() {
        let mut builder = CMapBuilder::new();
        builder.map_one_to_many(0x41, &[0x66, 0x66, 0x69]).unwrap();
        assert_eq!(builder.ranges(), &[RangeEntry::new(0x41, 0x41, RangeKind::Multi, 0)]);
        assert_eq!(builder.table(), &[3, 0x66, 0x66, 0x69]);
    }

    // ========================================================================
    // Sort and Merge
    // ========================================================================

    #[test]
    fn test_merge_contiguous_ranges() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_range(6, 10, 106).unwrap();
        builder.map_range_to_range(0, 5, 100).unwrap();
        assert_eq!(sorted(&mut builder), vec![RangeEntry::new(0, 10, RangeKind::Range, 100)]);
    }

    #[test]
    fn test_merge_singles_into_range() {
        let mut builder = CMapBuilder::new();
        for code in 0..4 {
            builder.map_range_to_range(code, code, 0x30 + code as i32).unwrap();
        }
        assert_eq!(sorted(&mut builder), vec![RangeEntry::new(0, 3, RangeKind::Range, 0x30)]);
    }

    #[test]
    fn test_merge_scattered_singles_into_table() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_range(0x21, 0x21, 900).unwrap();
        builder.map_range_to_range(0x20, 0x20, 50).unwrap();
        builder.map_range_to_range(0x22, 0x22, 7).unwrap();
        let ranges = sorted(&mut builder);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].kind, RangeKind::Table);
        assert_eq!((ranges[0].low, ranges[0].high), (0x20, 0x22));
        let start = ranges[0].offset as usize;
        assert_eq!(&builder.table()[start..start + 3], &[50, 900, 7]);
    }

    #[test]
    fn test_table_followed_by_range_stays_split() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_table(0, &[5, 9]).unwrap();
        builder.map_range_to_range(2, 8, 10).unwrap();
        let ranges = sorted(&mut builder);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1], RangeEntry::new(2, 8, RangeKind::Range, 10));
    }

    #[test]
    fn test_range_followed_by_table_stays_split() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_range(0, 1, 0).unwrap();
        // table index 0 happens to equal the "next" destination
        builder.map_range_to_table(2, &[77]).unwrap();
        let cmap = builder.build().unwrap();
        assert_eq!(cmap.ranges().len(), 2);
        assert_eq!(cmap.resolve_code(2), Some(77));
    }

    #[test]
    fn test_multi_never_merged() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_range(1, 1, 10).unwrap();
        builder.map_one_to_many(2, &[11, 12]).unwrap();
        builder.map_range_to_range(3, 3, 13).unwrap();
        let ranges = sorted(&mut builder);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[1].kind, RangeKind::Multi);
    }

    #[test]
    fn test_table_extension_relocates_when_not_at_tail() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_table(0x10, &[1, 2]).unwrap();
        builder.map_range_to_table(0x50, &[8, 9]).unwrap();
        builder.map_range_to_range(0x12, 0x12, 3).unwrap();
        let cmap = builder.build().unwrap();

        assert_eq!(cmap.resolve_code(0x10), Some(1));
        assert_eq!(cmap.resolve_code(0x11), Some(2));
        assert_eq!(cmap.resolve_code(0x12), Some(3));
        assert_eq!(cmap.resolve_code(0x50), Some(8));
        assert_eq!(cmap.resolve_code(0x51), Some(9));
    }

    #[test]
    fn test_input_separated_entries_copied() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_range(0, 0, 1).unwrap();
        builder.map_range_to_range(5, 5, 2).unwrap();
        let ranges = sorted(&mut builder);
        assert_eq!(ranges.len(), 2);
        assert!(ranges.iter().all(|r| r.kind == RangeKind::Single));
    }

    #[test]
    fn test_sort_empty_is_noop() {
        let mut builder = CMapBuilder::new();
        assert!(sorted(&mut builder).is_empty());
    }

    #[test]
    fn test_max_code_does_not_overflow() {
        let mut builder = CMapBuilder::new();
        builder.map_range_to_range(u32::MAX, u32::MAX, 1).unwrap();
        builder.map_range_to_range(0, 0, 2).unwrap();
        let cmap = builder.build().unwrap();
        assert_eq!(cmap.resolve_code(u32::MAX), Some(1));
        assert_eq!(cmap.resolve_code(0), Some(2));
    }
}
