//! Codespace ranges: the rules that split a byte string into codes.

use crate::error::{Error, Result};

/// Hard limit on codespace slots per CMap. The last slot is reserved, so at
/// most `MAX_CODESPACES - 1` ranges can be registered.
pub const MAX_CODESPACES: usize = 10;

/// A codespace rule: `n` bytes, each constrained to `lo[i]..=hi[i]`.
///
/// Only the first `n` bytes of `lo` and `hi` are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodespaceRange {
    n: u8,
    lo: [u8; 4],
    hi: [u8; 4],
}

impl CodespaceRange {
    /// Build a rule from big-endian byte arrays. Usable in `static` tables.
    ///
    /// `n` must be in `1..=4`.
    pub const fn from_bytes(n: u8, lo: [u8; 4], hi: [u8; 4]) -> Self {
        Self { n, lo, hi }
    }

    /// Split `lo`/`hi` into `n` big-endian bytes.
    pub fn new(lo: u32, hi: u32, n: usize) -> Result<Self> {
        if !(1..=4).contains(&n) {
            return Err(Error::syntax(0, format!("codespace range must be 1-4 bytes, got {}", n)));
        }

        let mut range = Self {
            n: n as u8,
            lo: [0; 4],
            hi: [0; 4],
        };
        for i in 0..n {
            let shift = (n - i - 1) * 8;
            range.lo[i] = (lo >> shift) as u8;
            range.hi[i] = (hi >> shift) as u8;
        }
        Ok(range)
    }

    /// Number of bytes per code.
    pub fn width(&self) -> usize {
        self.n as usize
    }

    /// Lower byte bounds.
    pub fn low_bytes(&self) -> &[u8] {
        &self.lo[..self.width()]
    }

    /// Upper byte bounds.
    pub fn high_bytes(&self) -> &[u8] {
        &self.hi[..self.width()]
    }

    /// If the leading bytes of `buf` fall within this rule, the big-endian
    /// code they form.
    pub fn match_prefix(&self, buf: &[u8]) -> Option<u32> {
        let n = self.width();
        let bytes = buf.get(..n)?;

        let mut code = 0u32;
        for (i, &b) in bytes.iter().enumerate() {
            if b < self.lo[i] || b > self.hi[i] {
                return None;
            }
            code = (code << 8) | b as u32;
        }
        Some(code)
    }
}

/// Decode one code from the start of `buf`.
///
/// Rules are tried in order and the first full match wins. With no match one
/// byte is consumed and code `0` is returned, so a bad byte can always be
/// skipped. An empty buffer yields `(0, 0)`.
pub fn decode_next_code(codespaces: &[CodespaceRange], buf: &[u8]) -> (u32, usize) {
    if buf.is_empty() {
        return (0, 0);
    }

    codespaces
        .iter()
        .find_map(|cs| cs.match_prefix(buf).map(|code| (code, cs.width())))
        .unwrap_or((0, 1))
}
