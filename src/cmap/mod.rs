//! CMap (Character Map) support.
//!
//! A CMap translates the variable-length byte codes of a PDF string into
//! CIDs or Unicode values. Mappings are held in a sorted range table plus a
//! flat overflow table, and a CMap may fall back to a parent through
//! `usecmap`.
//!
//! # Example
//!
//! ```
//! use cmap_oxide::cmap::{CMap, Lookup};
//!
//! let data = b"
//!     /CMapName /Example-H def
//!     1 begincodespacerange <00> <FF> endcodespacerange
//!     1 begincidrange <20> <7E> 1 endcidrange
//!     1 beginbfchar <80> <00660069> endbfchar
//! ";
//! let cmap = CMap::parse(data).unwrap();
//!
//! let (code, len) = cmap.decode_next_code(b"A");
//! assert_eq!((code, len), (0x41, 1));
//! assert_eq!(cmap.resolve_code(code), Some(0x22));
//! assert_eq!(cmap.lookup(0x80), Lookup::Multi(&[0x66, 0x69]));
//! ```

pub mod builder;
pub mod builtin;
pub mod codegen;
pub mod codespace;
pub mod loader;
pub mod parser;
pub mod range;

pub use builder::CMapBuilder;
pub use builtin::StaticCMap;
pub use codespace::{CodespaceRange, MAX_CODESPACES};
pub use loader::{CMapLoader, DirectoryLocator, ResourceLocator};
pub use range::{RangeEntry, RangeKind};

use crate::config::LoaderOptions;
use crate::error::Result;
use crate::object::{ObjectRef, ObjectResolver};
use range::find_range;
use std::borrow::Cow;
use std::io::Write;
use std::sync::Arc;

/// Writing mode of a CMap (`/WMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WritingMode {
    /// Horizontal writing (`/WMode 0`)
    #[default]
    Horizontal,
    /// Vertical writing (`/WMode 1`)
    Vertical,
}

impl WritingMode {
    /// Interpret a `/WMode` value: zero is horizontal, anything else vertical.
    pub fn from_pdf(value: i64) -> Self {
        if value == 0 {
            WritingMode::Horizontal
        } else {
            WritingMode::Vertical
        }
    }

    /// The `/WMode` value.
    pub fn as_pdf(self) -> i64 {
        match self {
            WritingMode::Horizontal => 0,
            WritingMode::Vertical => 1,
        }
    }
}

/// Result of [`CMap::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// One-to-one mapping
    Scalar(i32),
    /// One-to-many mapping
    Multi(&'a [i32]),
    /// Not mapped by this CMap or any ancestor
    Unmapped,
}

/// An immutable, optimized CMap.
///
/// Built by [`CMapBuilder::build`], [`CMap::parse`] or the [`CMapLoader`].
/// Share it with `Arc<CMap>`; lookups take `&self` and have no side effects.
#[derive(Debug, Clone)]
pub struct CMap {
    name: String,
    use_cmap_name: Option<String>,
    use_cmap: Option<Arc<CMap>>,
    writing_mode: WritingMode,
    codespaces: Cow<'static, [CodespaceRange]>,
    ranges: Cow<'static, [RangeEntry]>,
    table: Cow<'static, [i32]>,
}

impl CMap {
    pub(crate) fn from_parts(
        name: String,
        use_cmap_name: Option<String>,
        writing_mode: WritingMode,
        codespaces: Vec<CodespaceRange>,
        ranges: Vec<RangeEntry>,
        table: Vec<i32>,
    ) -> Self {
        Self {
            name,
            use_cmap_name,
            use_cmap: None,
            writing_mode,
            codespaces: Cow::Owned(codespaces),
            ranges: Cow::Owned(ranges),
            table: Cow::Owned(table),
        }
    }

    /// Wrap a compiled-in CMap without copying its tables.
    pub fn from_static(cmap: &'static StaticCMap) -> Self {
        Self {
            name: cmap.name.to_string(),
            use_cmap_name: cmap.use_cmap_name.map(str::to_string),
            use_cmap: None,
            writing_mode: cmap.writing_mode,
            codespaces: Cow::Borrowed(cmap.codespaces),
            ranges: Cow::Borrowed(cmap.ranges),
            table: Cow::Borrowed(cmap.table),
        }
    }

    /// An identity CMap: every `bytes`-byte code maps to itself.
    ///
    /// Named `Identity-H` or `Identity-V` after `writing_mode`. `bytes` must
    /// be in `1..=4`.
    ///
    /// ```
    /// use cmap_oxide::cmap::{CMap, WritingMode};
    ///
    /// let cmap = CMap::identity(WritingMode::Vertical, 2).unwrap();
    /// assert_eq!(cmap.name(), "Identity-V");
    /// assert_eq!(cmap.decode_next_code(&[0x12, 0x34]), (0x1234, 2));
    /// assert_eq!(cmap.resolve_code(0x1234), Some(0x1234));
    /// ```
    pub fn identity(writing_mode: WritingMode, bytes: usize) -> Result<Self> {
        let mut builder = CMapBuilder::new();
        builder.set_name(match writing_mode {
            WritingMode::Horizontal => "Identity-H",
            WritingMode::Vertical => "Identity-V",
        });
        builder.set_writing_mode(writing_mode);
        builder.add_codespace(0x0000, 0xFFFF, bytes)?;
        builder.map_range_to_range(0x0000, 0xFFFF, 0)?;
        builder.build()
    }

    /// Parse CMap program text.
    pub fn parse(data: &[u8]) -> Result<Self> {
        parser::parse_cmap(data)
    }

    /// Load a predefined CMap by name with default [`LoaderOptions`].
    ///
    /// Built-in CMaps are found first; others are read from the directory
    /// named by the `CMAPDIR` environment variable.
    ///
    /// Each call runs on a fresh [`CMapLoader`], so nothing is cached between
    /// calls: a file CMap and its `usecmap` parents are read and parsed again
    /// every time, and the returned `Arc`s are never shared. Keep one
    /// [`CMapLoader`] per document to reuse parsed CMaps.
    pub fn from_predefined_name(name: &str) -> Result<Arc<Self>> {
        CMapLoader::new(LoaderOptions::default()).load_predefined(name)
    }

    /// Load the CMap stream `obj_ref` from `doc` with default options.
    ///
    /// Like [`CMap::from_predefined_name`], this uses a fresh loader per call.
    pub fn from_embedded_stream<R>(doc: &mut R, obj_ref: ObjectRef) -> Result<Arc<Self>>
    where
        R: ObjectResolver + ?Sized,
    {
        CMapLoader::new(LoaderOptions::default()).load_embedded(doc, obj_ref)
    }

    /// CMap name (`/CMapName`), empty if the source had none.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the parent CMap, if one was declared.
    pub fn use_cmap_name(&self) -> Option<&str> {
        self.use_cmap_name.as_deref()
    }

    /// The attached parent CMap.
    pub fn use_cmap(&self) -> Option<&Arc<CMap>> {
        self.use_cmap.as_ref()
    }

    /// Writing mode.
    pub fn writing_mode(&self) -> WritingMode {
        self.writing_mode
    }

    /// Codespace ranges in precedence order.
    pub fn codespaces(&self) -> &[CodespaceRange] {
        &self.codespaces
    }

    /// Sorted range table.
    pub fn ranges(&self) -> &[RangeEntry] {
        &self.ranges
    }

    /// Overflow table referenced by `Table` and `Multi` entries.
    pub fn table(&self) -> &[i32] {
        &self.table
    }

    /// Attach the parent CMap.
    ///
    /// A CMap with no codespace ranges of its own takes the parent's.
    pub fn set_use_cmap(&mut self, parent: Arc<CMap>) {
        if self.codespaces.is_empty() {
            self.codespaces = parent.codespaces.clone();
        }
        if self.use_cmap_name.is_none() {
            self.use_cmap_name = Some(parent.name.clone());
        }
        self.use_cmap = Some(parent);
    }

    pub(crate) fn with_writing_mode(mut self, writing_mode: WritingMode) -> Self {
        self.writing_mode = writing_mode;
        self
    }

    /// Look up `code` in this CMap, then in its ancestors.
    pub fn lookup(&self, code: u32) -> Lookup<'_> {
        let Some(entry) = find_range(&self.ranges, code) else {
            return match &self.use_cmap {
                Some(parent) => parent.lookup(code),
                None => Lookup::Unmapped,
            };
        };

        match entry.kind {
            RangeKind::Single | RangeKind::Range => Lookup::Scalar(entry.offset_for(code)),
            RangeKind::Table => usize::try_from(entry.offset_for(code))
                .ok()
                .and_then(|idx| self.table.get(idx))
                .map_or(Lookup::Unmapped, |&value| Lookup::Scalar(value)),
            RangeKind::Multi => self.multi_values(entry).map_or(Lookup::Unmapped, Lookup::Multi),
        }
    }

    fn multi_values(&self, entry: &RangeEntry) -> Option<&[i32]> {
        let start = usize::try_from(entry.offset).ok()?;
        let count = usize::try_from(*self.table.get(start)?).ok()?;
        self.table.get(start + 1..start + 1 + count)
    }

    /// The one-to-one mapping of `code`.
    ///
    /// `None` if the code is unmapped or maps to several values.
    pub fn resolve_code(&self, code: u32) -> Option<i32> {
        match self.lookup(code) {
            Lookup::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// The one-to-many mapping of `code`.
    pub fn resolve_code_multi(&self, code: u32) -> Option<&[i32]> {
        match self.lookup(code) {
            Lookup::Multi(values) => Some(values),
            _ => None,
        }
    }

    /// Decode one code from the start of `buf`, returning `(code, bytes_consumed)`.
    ///
    /// See [`codespace::decode_next_code`] for the fallback rules.
    pub fn decode_next_code(&self, buf: &[u8]) -> (u32, usize) {
        codespace::decode_next_code(&self.codespaces, buf)
    }

    /// Iterate over the codes of `buf` as `(code, source_bytes)` pairs.
    pub fn codes<'a>(&'a self, buf: &'a [u8]) -> Codes<'a> {
        Codes { cmap: self, buf }
    }

    /// Write a human-readable listing of this CMap.
    pub fn write_debug<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "cmap {} /WMode {} {{", self.name, self.writing_mode.as_pdf())?;
        if let Some(parent) = &self.use_cmap_name {
            writeln!(out, "  usecmap /{}", parent)?;
        }

        writeln!(out, "  codespaces {{")?;
        for cs in self.codespaces.iter() {
            writeln!(out, "    <{}> <{}>", hex(cs.low_bytes()), hex(cs.high_bytes()))?;
        }
        writeln!(out, "  }}")?;

        writeln!(out, "  ranges ({},{}) {{", self.ranges.len(), self.table.len())?;
        for entry in self.ranges.iter() {
            write!(out, "    <{:04x}> <{:04x}> ", entry.low, entry.high)?;
            match entry.kind {
                RangeKind::Single | RangeKind::Range => writeln!(out, "{}", entry.offset)?,
                RangeKind::Table => {
                    let start = entry.offset.max(0) as usize;
                    let end = (start as u64 + entry.len()).min(self.table.len() as u64) as usize;
                    let values = self.table.get(start..end).unwrap_or_default();
                    writeln!(out, "[ {} ]", join(values))?;
                },
                RangeKind::Multi => {
                    let values = self.multi_values(entry).unwrap_or_default();
                    writeln!(out, "< {} >", join(values))?;
                },
            }
        }
        writeln!(out, "  }}")?;
        writeln!(out, "}}")?;
        Ok(())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn join(values: &[i32]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

/// Iterator returned by [`CMap::codes`].
#[derive(Debug, Clone)]
pub struct Codes<'a> {
    cmap: &'a CMap,
    buf: &'a [u8],
}

impl<'a> Iterator for Codes<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (code, len) = self.cmap.decode_next_code(self.buf);
        if len == 0 {
            return None;
        }
        let (bytes, rest) = self.buf.split_at(len);
        self.buf = rest;
        Some((code, bytes))
    }
}
