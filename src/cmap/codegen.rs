//! Rust source generation for compiled-in CMaps.
//!
//! Turns a parsed [`CMap`] into a `static` [`StaticCMap`](super::StaticCMap)
//! definition that can be dropped into the built-in registry.

use super::{CMap, RangeKind, WritingMode};
use crate::error::Result;
use std::io::Write;

/// Values per line in generated tables.
const VALUES_PER_LINE: usize = 12;

/// Rust identifier for a CMap name: `UniJIS-UCS2-H` becomes `UNIJIS_UCS2_H`.
pub fn static_ident(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert_str(0, "CMAP_");
    }
    ident
}

/// Write a `pub static` definition of `cmap` named `ident`.
///
/// The output is a self-contained module body with its own `use` lines.
pub fn write_static_cmap<W: Write>(cmap: &CMap, ident: &str, out: &mut W) -> Result<()> {
    writeln!(out, "// Generated by cmap2rs from CMap {:?}. Do not edit.", cmap.name())?;
    writeln!(out)?;
    writeln!(out, "use crate::cmap::builtin::StaticCMap;")?;
    writeln!(out, "use crate::cmap::{{CodespaceRange, RangeEntry, RangeKind, WritingMode}};")?;
    writeln!(out)?;

    writeln!(out, "static {}_CODESPACES: [CodespaceRange; {}] = [", ident, cmap.codespaces().len())?;
    for cs in cmap.codespaces() {
        writeln!(
            out,
            "    CodespaceRange::from_bytes({}, {}, {}),",
            cs.width(),
            byte_array(cs.low_bytes()),
            byte_array(cs.high_bytes())
        )?;
    }
    writeln!(out, "];")?;
    writeln!(out)?;

    writeln!(out, "static {}_RANGES: [RangeEntry; {}] = [", ident, cmap.ranges().len())?;
    for entry in cmap.ranges() {
        writeln!(
            out,
            "    RangeEntry::new(0x{:04X}, 0x{:04X}, RangeKind::{}, {}),",
            entry.low,
            entry.high,
            kind_name(entry.kind),
            entry.offset
        )?;
    }
    writeln!(out, "];")?;
    writeln!(out)?;

    writeln!(out, "static {}_TABLE: [i32; {}] = [", ident, cmap.table().len())?;
    for chunk in cmap.table().chunks(VALUES_PER_LINE) {
        let line: Vec<String> = chunk.iter().map(|v| v.to_string()).collect();
        writeln!(out, "    {},", line.join(", "))?;
    }
    writeln!(out, "];")?;
    writeln!(out)?;

    writeln!(out, "pub static {}: StaticCMap = StaticCMap {{", ident)?;
    writeln!(out, "    name: {:?},", cmap.name())?;
    match cmap.use_cmap_name() {
        Some(parent) => writeln!(out, "    use_cmap_name: Some({:?}),", parent)?,
        None => writeln!(out, "    use_cmap_name: None,")?,
    }
    writeln!(out, "    writing_mode: WritingMode::{},", mode_name(cmap.writing_mode()))?;
    writeln!(out, "    codespaces: &{}_CODESPACES,", ident)?;
    writeln!(out, "    ranges: &{}_RANGES,", ident)?;
    writeln!(out, "    table: &{}_TABLE,", ident)?;
    writeln!(out, "}};")?;
    Ok(())
}

fn kind_name(kind: RangeKind) -> &'static str {
    match kind {
        RangeKind::Single => "Single",
        RangeKind::Range => "Range",
        RangeKind::Table => "Table",
        RangeKind::Multi => "Multi",
    }
}

/// `[0x81, 0x40, 0, 0]` padded to four bytes.
fn byte_array(bytes: &[u8]) -> String {
    let mut padded = [0u8; 4];
    padded[..bytes.len()].copy_from_slice(bytes);
    format!(
        "[0x{:02X}, 0x{:02X}, 0x{:02X}, 0x{:02X}]",
        padded[0], padded[1], padded[2], padded[3]
    )
}

fn mode_name(mode: WritingMode) -> &'static str {
    match mode {
        WritingMode::Horizontal => "Horizontal",
        WritingMode::Vertical => "Vertical",
    }
}
