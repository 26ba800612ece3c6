//! Compiled-in CMaps.
//!
//! Predefined CMaps that are always available without a CMap directory.
//! Tables are `static` data borrowed by [`CMap::from_static`](super::CMap::from_static);
//! new entries can be generated from CMap files with the `cmap2rs` tool.

use super::codespace::CodespaceRange;
use super::range::{RangeEntry, RangeKind};
use super::WritingMode;
use phf::phf_map;

/// A CMap whose tables live in static memory.
#[derive(Debug)]
pub struct StaticCMap {
    /// CMap name
    pub name: &'static str,
    /// Parent CMap name, if any
    pub use_cmap_name: Option<&'static str>,
    /// Writing mode
    pub writing_mode: WritingMode,
    /// Codespace ranges in precedence order
    pub codespaces: &'static [CodespaceRange],
    /// Sorted, merged range table
    pub ranges: &'static [RangeEntry],
    /// Overflow table
    pub table: &'static [i32],
}

static IDENTITY_CODESPACES: [CodespaceRange; 1] =
    [CodespaceRange::from_bytes(2, [0x00, 0x00, 0, 0], [0xFF, 0xFF, 0, 0])];

static IDENTITY_RANGES: [RangeEntry; 1] = [RangeEntry::new(0x0000, 0xFFFF, RangeKind::Range, 0)];

/// Two-byte identity mapping, horizontal.
pub static IDENTITY_H: StaticCMap = StaticCMap {
    name: "Identity-H",
    use_cmap_name: None,
    writing_mode: WritingMode::Horizontal,
    codespaces: &IDENTITY_CODESPACES,
    ranges: &IDENTITY_RANGES,
    table: &[],
};

/// Two-byte identity mapping, vertical.
pub static IDENTITY_V: StaticCMap = StaticCMap {
    name: "Identity-V",
    use_cmap_name: None,
    writing_mode: WritingMode::Vertical,
    codespaces: &IDENTITY_CODESPACES,
    ranges: &IDENTITY_RANGES,
    table: &[],
};

static BUILTIN_CMAPS: phf::Map<&'static str, &'static StaticCMap> = phf_map! {
    "Identity-H" => &IDENTITY_H,
    "Identity-V" => &IDENTITY_V,
};

/// Look up a compiled-in CMap by name.
pub fn find_builtin(name: &str) -> Option<&'static StaticCMap> {
    BUILTIN_CMAPS.get(name).copied()
}

/// Names of all compiled-in CMaps.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_CMAPS.keys().copied()
}
