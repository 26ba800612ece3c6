//! CMap program parser.
//!
//! CMap resources are PostScript programs, but only a handful of operators
//! carry mapping data. The parser walks the token stream, reacts to those
//! operators, and skips everything else (`findresource`, `begin`, dictionary
//! setup and so on).
//!
//! # Format Example
//!
//! ```text
//! /CIDInit /ProcSet findresource begin
//! 12 dict begin
//! begincmap
//! /CMapName /Adobe-Identity-UCS def
//! /WMode 0 def
//! 1 begincodespacerange
//! <0000> <FFFF>
//! endcodespacerange
//! 2 beginbfchar
//! <0003> <0020>
//! <00B1> <00660069>
//! endbfchar
//! 1 beginbfrange
//! <0010> <0019> <0030>
//! endbfrange
//! endcmap
//! ```

use super::builder::CMapBuilder;
use super::{CMap, WritingMode};
use crate::error::{Error, Result};
use crate::lexer::{Lexer, Token};

/// Largest `hi - lo` accepted for a bfrange whose destination expands into
/// one entry per code. This is the span of a full 2-byte source range.
pub const MAX_BF_RANGE_SPAN: u32 = 0xFFFF;

/// Parse a CMap program into an optimized [`CMap`].
///
/// Any syntax error aborts the parse; no partial CMap is returned.
pub fn parse_cmap(data: &[u8]) -> Result<CMap> {
    CMapParser::new(data).parse()
}

/// Token-driven CMap reader.
pub struct CMapParser<'a> {
    lexer: Lexer<'a>,
    builder: CMapBuilder,
    /// Most recent name that was not a recognized key, the operand of `usecmap`.
    last_name: Option<String>,
}

impl<'a> CMapParser<'a> {
    /// Create a parser over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            builder: CMapBuilder::new(),
            last_name: None,
        }
    }

    /// Read the whole program and build the CMap.
    pub fn parse(mut self) -> Result<CMap> {
        while let Some(token) = self.lexer.next_token()? {
            match token {
                Token::Name(key) if key == "CMapName" => {
                    let name = self.expect_name("/CMapName")?;
                    log::trace!("CMapName: {}", name);
                    self.builder.set_name(name);
                },
                Token::Name(key) if key == "WMode" => {
                    let mode = self.expect_integer("/WMode")?;
                    self.builder.set_writing_mode(WritingMode::from_pdf(mode));
                },
                Token::Name(name) => self.last_name = Some(name),
                Token::Keyword(keyword) => match keyword {
                    b"usecmap" => match self.last_name.take() {
                        Some(parent) => {
                            log::trace!("usecmap: {}", parent);
                            self.builder.set_use_cmap_name(parent);
                        },
                        None => log::warn!("usecmap without a preceding name at byte {}", self.lexer.offset()),
                    },
                    b"begincodespacerange" => self.parse_codespace_range()?,
                    b"begincidrange" => self.parse_cid_range()?,
                    b"begincidchar" => self.parse_cid_char()?,
                    b"beginbfrange" => self.parse_bf_range()?,
                    b"beginbfchar" => self.parse_bf_char()?,
                    _ => {},
                },
                _ => {},
            }
        }

        self.builder.build()
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::syntax(self.lexer.offset(), reason)
    }

    /// Next token, treating end of input as an error inside `context`.
    fn next_required(&mut self, context: &str) -> Result<Token<'a>> {
        self.lexer
            .next_token()?
            .ok_or_else(|| self.error(format!("unexpected end of input in {}", context)))
    }

    fn expect_name(&mut self, context: &str) -> Result<String> {
        match self.next_required(context)? {
            Token::Name(name) => Ok(name),
            other => Err(self.error(format!("expected name after {}, found {}", context, other.describe()))),
        }
    }

    fn expect_integer(&mut self, context: &str) -> Result<i64> {
        match self.next_required(context)? {
            Token::Integer(value) => Ok(value),
            other => Err(self.error(format!("expected integer after {}, found {}", context, other.describe()))),
        }
    }

    fn expect_string(&mut self, context: &str) -> Result<Vec<u8>> {
        let token = self.next_required(context)?;
        token
            .string_bytes()
            .ok_or_else(|| self.error(format!("expected string in {}, found {}", context, token.describe())))
    }

    fn expect_dst_integer(&mut self, context: &str) -> Result<i32> {
        let value = self.expect_integer(context)?;
        i32::try_from(value).map_err(|_| self.error(format!("destination {} out of range in {}", value, context)))
    }

    /// Start of the next entry in a block: `Some(bytes)` for a source string,
    /// `None` when the block's end keyword is reached.
    fn entry_start(&mut self, end: &str) -> Result<Option<Vec<u8>>> {
        let token = self.next_required(end)?;
        if token.is_keyword(end) {
            return Ok(None);
        }
        match token.string_bytes() {
            Some(bytes) => Ok(Some(bytes)),
            None => Err(self.error(format!("expected string or {}, found {}", end, token.describe()))),
        }
    }

    fn code(&self, bytes: &[u8]) -> Result<u32> {
        code_from_bytes(bytes).ok_or_else(|| self.error(format!("code string of {} bytes is too long", bytes.len())))
    }

    fn parse_codespace_range(&mut self) -> Result<()> {
        while let Some(lo) = self.entry_start("endcodespacerange")? {
            let hi = self.expect_string("codespacerange")?;
            if hi.is_empty() {
                return Err(self.error("empty codespace range bound"));
            }
            let (lo_code, hi_code) = (self.code(&lo)?, self.code(&hi)?);
            self.builder.add_codespace(lo_code, hi_code, hi.len())?;
        }
        Ok(())
    }

    fn parse_cid_range(&mut self) -> Result<()> {
        while let Some(lo) = self.entry_start("endcidrange")? {
            let hi = self.expect_string("cidrange")?;
            let dst = self.expect_dst_integer("cidrange")?;
            let (lo, hi) = (self.code(&lo)?, self.code(&hi)?);
            if self.check_range(lo, hi) {
                self.builder.map_range_to_range(lo, hi, dst)?;
            }
        }
        Ok(())
    }

    fn parse_cid_char(&mut self) -> Result<()> {
        while let Some(src) = self.entry_start("endcidchar")? {
            let dst = self.expect_dst_integer("cidchar")?;
            let src = self.code(&src)?;
            self.builder.map_range_to_range(src, src, dst)?;
        }
        Ok(())
    }

    fn parse_bf_range(&mut self) -> Result<()> {
        while let Some(lo) = self.entry_start("endbfrange")? {
            let hi = self.expect_string("bfrange")?;
            let (lo, hi) = (self.code(&lo)?, self.code(&hi)?);
            let valid = self.check_range(lo, hi);

            match self.next_required("bfrange")? {
                Token::ArrayStart => self.parse_bf_range_array(lo, hi, valid)?,
                token => {
                    let dst = token.string_bytes().ok_or_else(|| {
                        self.error(format!("expected string or array in bfrange, found {}", token.describe()))
                    })?;
                    if valid {
                        self.map_bf_range(lo, hi, &dst)?;
                    }
                },
            }
        }
        Ok(())
    }

    /// `<lo> <hi> <dst>`: a short destination is an ordinary offset, a
    /// longer one is a UTF-16 sequence whose last unit counts up.
    fn map_bf_range(&mut self, lo: u32, hi: u32, dst: &[u8]) -> Result<()> {
        if dst.is_empty() {
            log::warn!("empty bfrange destination for <{:X}>..<{:X}>, skipping", lo, hi);
            return Ok(());
        }
        if dst.len() <= 2 {
            let offset = self.code(dst)? as i32;
            return self.builder.map_range_to_range(lo, hi, offset);
        }

        if hi - lo > MAX_BF_RANGE_SPAN {
            return Err(self.error(format!(
                "bfrange <{:X}>..<{:X}> with a {}-byte destination spans more than {} codes",
                lo,
                hi,
                dst.len(),
                MAX_BF_RANGE_SPAN + 1
            )));
        }

        let mut units = destination_units(dst);
        let Some(last) = units.last().copied() else {
            return Ok(());
        };
        for code in lo..=hi {
            if let Some(unit) = units.last_mut() {
                *unit = last.wrapping_add((code - lo) as i32);
            }
            self.builder.map_one_to_many(code, &units)?;
        }
        Ok(())
    }

    /// `<lo> <hi> [ <dst0> <dst1> ... ]`, one destination per code.
    fn parse_bf_range_array(&mut self, lo: u32, hi: u32, valid: bool) -> Result<()> {
        let mut code = Some(lo).filter(|_| valid);
        let mut extra = 0usize;

        loop {
            match self.next_required("bfrange array")? {
                Token::ArrayEnd => break,
                Token::Name(name) => {
                    return Err(self.error(format!("glyph name /{} in bfrange array is not supported", name)));
                },
                token => {
                    let dst = token.string_bytes().ok_or_else(|| {
                        self.error(format!("expected string or ] in bfrange array, found {}", token.describe()))
                    })?;
                    match code {
                        Some(c) => {
                            self.builder.map_one_to_many(c, &destination_units(&dst))?;
                            code = c.checked_add(1).filter(|&next| next <= hi);
                        },
                        None => extra += 1,
                    }
                },
            }
        }

        if valid {
            if extra > 0 {
                log::warn!("bfrange <{:X}>..<{:X}>: {} extra destinations ignored", lo, hi, extra);
            } else if let Some(c) = code {
                log::warn!("bfrange <{:X}>..<{:X}>: no destination from <{:X}>", lo, hi, c);
            }
        }
        Ok(())
    }

    fn parse_bf_char(&mut self) -> Result<()> {
        while let Some(src) = self.entry_start("endbfchar")? {
            let src = self.code(&src)?;
            match self.next_required("bfchar")? {
                Token::Name(name) => {
                    return Err(self.error(format!("glyph name /{} in bfchar is not supported", name)));
                },
                token => {
                    let dst = token.string_bytes().ok_or_else(|| {
                        self.error(format!("expected string in bfchar, found {}", token.describe()))
                    })?;
                    log::trace!("bfchar: <{:X}> -> {} bytes", src, dst.len());
                    self.builder.map_one_to_many(src, &destination_units(&dst))?;
                },
            }
        }
        Ok(())
    }

    fn check_range(&self, lo: u32, hi: u32) -> bool {
        if lo > hi {
            log::warn!("skipping inverted range <{:X}> <{:X}> at byte {}", lo, hi, self.lexer.offset());
            return false;
        }
        true
    }
}

/// Big-endian integer value of a code string of at most 4 bytes.
fn code_from_bytes(bytes: &[u8]) -> Option<u32> {
    if bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

/// Split a destination string into big-endian 16-bit units.
///
/// A single byte is its own value; a trailing odd byte is dropped.
fn destination_units(bytes: &[u8]) -> Vec<i32> {
    if let [byte] = bytes {
        return vec![*byte as i32];
    }
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]) as i32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmap::{Lookup, RangeKind};

    // ========================================================================
    // Header and Codespaces
    // ========================================================================

    #[test]
    fn test_parse_name_and_wmode() {
        let cmap = parse_cmap(b"/CMapName /UniJIS-UCS2-V def /WMode 1 def").unwrap();
        assert_eq!(cmap.name(), "UniJIS-UCS2-V");
        assert_eq!(cmap.writing_mode(), WritingMode::Vertical);
    }

    #[test]
    fn test_cmap_name_requires_name() {
        let err = parse_cmap(b"/CMapName (oops) def").unwrap_err();
        assert!(matches!(err, Error::SyntaxError { .. }));
    }

    #[test]
    fn test_wmode_requires_integer() {
        assert!(parse_cmap(b"/WMode /Vertical def").is_err());
    }

    #[test]
    fn test_parse_usecmap() {
        let cmap = parse_cmap(b"/Adobe-Japan1-UCS2 usecmap").unwrap();
        assert_eq!(cmap.use_cmap_name(), Some("Adobe-Japan1-UCS2"));
    }

    #[test]
    fn test_usecmap_without_name_is_ignored() {
        let cmap = parse_cmap(b"usecmap").unwrap();
        assert_eq!(cmap.use_cmap_name(), None);
    }

    #[test]
    fn test_parse_codespace_widths() {
        let cmap = parse_cmap(b"2 begincodespacerange <00> <80> <8140> <9FFC> endcodespacerange").unwrap();
        assert_eq!(cmap.codespaces().len(), 2);
        assert_eq!(cmap.codespaces()[0].width(), 1);
        assert_eq!(cmap.codespaces()[1].width(), 2);
        assert_eq!(cmap.decode_next_code(&[0x81, 0x40]), (0x8140, 2));
    }

    #[test]
    fn test_codespace_requires_strings() {
        let err = parse_cmap(b"1 begincodespacerange <00> 255 endcodespacerange").unwrap_err();
        assert!(matches!(err, Error::SyntaxError { .. }));
    }

    #[test]
    fn test_empty_codespace_reports_offset() {
        let data = b"/CMapName /Test def 1 begincodespacerange <> <> endcodespacerange";
        match parse_cmap(data) {
            Err(Error::SyntaxError { offset, reason }) => {
                assert!(offset > 40 && offset <= data.len(), "offset {}", offset);
                assert!(reason.contains("codespace"), "{}", reason);
            },
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_block() {
        assert!(parse_cmap(b"1 begincidrange <00> <FF> 1").is_err());
    }

    // ========================================================================
    // CID Blocks
    // ========================================================================

    #[test]
    fn test_parse_cidrange_and_cidchar() {
        let data = b"
            1 begincidrange <0020> <007E> 1 endcidrange
            1 begincidchar <00A0> 633 endcidchar
        ";
        let cmap = parse_cmap(data).unwrap();
        assert_eq!(cmap.resolve_code(0x20), Some(1));
        assert_eq!(cmap.resolve_code(0x7E), Some(95));
        assert_eq!(cmap.resolve_code(0xA0), Some(633));
    }

    #[test]
    fn test_cidrange_requires_integer() {
        assert!(parse_cmap(b"1 begincidrange <00> <10> <20> endcidrange").is_err());
    }

    #[test]
    fn test_inverted_range_skipped() {
        let cmap = parse_cmap(b"2 begincidrange <30> <20> 1 <40> <41> 7 endcidrange").unwrap();
        assert_eq!(cmap.ranges().len(), 1);
        assert_eq!(cmap.resolve_code(0x41), Some(8));
    }

    // ========================================================================
    // BF Blocks
    // ========================================================================

    #[test]
    fn test_bfrange_short_destination() {
        let cmap = parse_cmap(b"1 beginbfrange <0010> <0019> <0030> endbfrange").unwrap();
        assert_eq!(cmap.ranges()[0].kind, RangeKind::Range);
        assert_eq!(cmap.resolve_code(0x15), Some(0x35));
    }

    #[test]
    fn test_bfrange_long_destination_increments_last_unit() {
        let cmap = parse_cmap(b"1 beginbfrange <01> <03> <D835DC00> endbfrange").unwrap();
        assert_eq!(cmap.resolve_code_multi(0x01), Some(&[0xD835, 0xDC00][..]));
        assert_eq!(cmap.resolve_code_multi(0x03), Some(&[0xD835, 0xDC02][..]));
    }

    #[test]
    fn test_bfrange_long_destination_full_span() {
        let cmap = parse_cmap(b"1 beginbfrange <0000> <FFFF> <00410042> endbfrange").unwrap();
        assert_eq!(cmap.resolve_code_multi(0xFFFF), Some(&[0x41, 0x42 + 0xFFFF][..]));
    }

    #[test]
    fn test_bfrange_long_destination_span_too_large() {
        let data = b"1 beginbfrange <00000000> <003FFFFF> <00410042> endbfrange";
        match parse_cmap(data) {
            Err(Error::SyntaxError { offset, reason }) => {
                assert!(offset > 0 && offset <= data.len());
                assert!(reason.contains("bfrange"), "{}", reason);
            },
            other => panic!("expected syntax error, got {:?}", other),
        }
        assert!(parse_cmap(b"1 beginbfrange <00000000> <FFFFFFFF> <00410042> endbfrange").is_err());
    }

    #[test]
    fn test_bfrange_short_destination_wide_span_allowed() {
        let cmap = parse_cmap(b"1 beginbfrange <00000000> <003FFFFF> <0041> endbfrange").unwrap();
        assert_eq!(cmap.ranges().len(), 1);
        assert_eq!(cmap.resolve_code(0x003F_FFFF), Some(0x41 + 0x003F_FFFF));
    }

    #[test]
    fn test_bfrange_array() {
        let cmap = parse_cmap(b"1 beginbfrange <05> <07> [<0041> <00660066> <42>] endbfrange").unwrap();
        assert_eq!(cmap.resolve_code(0x05), Some(0x41));
        assert_eq!(cmap.lookup(0x06), Lookup::Multi(&[0x66, 0x66]));
        assert_eq!(cmap.resolve_code(0x07), Some(0x42));
    }

    #[test]
    fn test_bfrange_array_rejects_names() {
        let err = parse_cmap(b"1 beginbfrange <05> <06> [/A /B] endbfrange").unwrap_err();
        assert!(matches!(err, Error::SyntaxError { .. }));
    }

    #[test]
    fn test_bfrange_array_extra_destinations_ignored() {
        let cmap = parse_cmap(b"1 beginbfrange <05> <05> [<0041> <0042>] endbfrange").unwrap();
        assert_eq!(cmap.resolve_code(0x05), Some(0x41));
        assert_eq!(cmap.resolve_code(0x06), None);
    }

    #[test]
    fn test_parse_bfchar() {
        let data = b"
            3 beginbfchar
            <0003> <0020>
            <00B1> <00660069>
            <00B2> (A)
            endbfchar
        ";
        let cmap = parse_cmap(data).unwrap();
        assert_eq!(cmap.resolve_code(0x03), Some(0x20));
        assert_eq!(cmap.resolve_code_multi(0xB1), Some(&[0x66, 0x69][..]));
        assert_eq!(cmap.resolve_code(0xB2), Some(0x41));
    }

    #[test]
    fn test_bfchar_rejects_names() {
        assert!(parse_cmap(b"1 beginbfchar <01> /space endbfchar").is_err());
    }

    #[test]
    fn test_bfchar_empty_destination_skipped() {
        let cmap = parse_cmap(b"1 beginbfchar <01> <> endbfchar").unwrap();
        assert!(cmap.ranges().is_empty());
    }

    #[test]
    fn test_source_code_too_long() {
        assert!(parse_cmap(b"1 begincidchar <0102030405> 1 endcidchar").is_err());
    }

    // ========================================================================
    // Whole Programs
    // ========================================================================

    #[test]
    fn test_ignores_postscript_noise() {
        let data = b"%!PS-Adobe-3.0 Resource-CMap
            /CIDInit /ProcSet findresource begin
            12 dict begin
            begincmap
            /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
            /CMapName /Adobe-Identity-UCS def
            /CMapType 2 def
            1 begincodespacerange <0000> <FFFF> endcodespacerange
            1 beginbfchar <0041> <0061> endbfchar
            endcmap
            CMapName currentdict /CMap defineresource pop
            end
            end
        ";
        let cmap = parse_cmap(data).unwrap();
        assert_eq!(cmap.name(), "Adobe-Identity-UCS");
        assert_eq!(cmap.resolve_code(0x41), Some(0x61));
        assert_eq!(cmap.use_cmap_name(), None);
    }

    #[test]
    fn test_unrecognized_byte_is_error() {
        assert!(parse_cmap(b"1 begincidchar <01> 1 endcidchar )").is_err());
    }

    #[test]
    fn test_destination_units() {
        assert_eq!(destination_units(&[0x41]), vec![0x41]);
        assert_eq!(destination_units(&[0x00, 0x66, 0x00, 0x69]), vec![0x66, 0x69]);
        assert_eq!(destination_units(&[0x00, 0x66, 0x01]), vec![0x66]);
        assert!(destination_units(&[]).is_empty());
    }
}
