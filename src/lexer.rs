//! PDF lexer (tokenizer).
//!
//! This module provides low-level tokenization of the PostScript-like syntax
//! shared by PDF content and CMap resources. It recognizes numbers, strings,
//! names, bare keywords and delimiters.
//!
//! # Syntax Overview
//!
//! - Numbers: integers (42, -123) and reals (3.14, -2.5)
//! - Strings: literal ((Hello)) and hexadecimal (<48656C6C6F>)
//! - Names: identifiers starting with / (/CMapName, /WMode)
//! - Keywords: bare words such as `begincodespacerange`, `usecmap`, `def`
//! - Delimiters: `[`, `]`, `<<`, `>>`, `{`, `}`
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.

use crate::error::{Error, Result};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
};

/// Token types recognized by the lexer.
///
/// The CMap parser consumes these one at a time from a [`Lexer`].
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string bytes (e.g., content of "(Hello)")
    /// Note: Escape sequences are NOT decoded at lexer level
    LiteralString(&'a [u8]),

    /// Hexadecimal string digits (e.g., content of "<48656C6C6F>")
    /// Whitespace is preserved; see [`Token::string_bytes`]
    HexString(&'a [u8]),

    /// Name (e.g., "CMapName" from "/CMapName")
    /// Note: # escape sequences ARE decoded at lexer level
    Name(String),

    /// Bare keyword (e.g., `begincidrange`, `usecmap`, `def`)
    Keyword(&'a [u8]),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// Procedure start delimiter {
    ProcStart,

    /// Procedure end delimiter }
    ProcEnd,
}

impl Token<'_> {
    /// Decoded bytes of a literal or hexadecimal string token.
    ///
    /// Returns `None` for every other token kind.
    pub fn string_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Token::LiteralString(raw) => Some(decode_literal_string(raw)),
            Token::HexString(raw) => Some(decode_hex(raw)),
            _ => None,
        }
    }

    /// True if this is the bare keyword `word`.
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Token::Keyword(k) if *k == word.as_bytes())
    }

    /// Short human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Integer(i) => format!("integer {}", i),
            Token::Real(r) => format!("real {}", r),
            Token::LiteralString(_) | Token::HexString(_) => "string".to_string(),
            Token::Name(n) => format!("name /{}", n),
            Token::Keyword(k) => format!("keyword '{}'", String::from_utf8_lossy(k)),
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            Token::Null => "null".to_string(),
            Token::ArrayStart => "[".to_string(),
            Token::ArrayEnd => "]".to_string(),
            Token::DictStart => "<<".to_string(),
            Token::DictEnd => ">>".to_string(),
            Token::ProcStart => "{".to_string(),
            Token::ProcEnd => "}".to_string(),
        }
    }
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

/// Parse whitespace characters.
///
/// Returns an error if no whitespace is found (requires at least one whitespace char).
fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    value((), take_while1(is_whitespace))(input)
}

/// Parse a comment (% to end of line).
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
fn skip_ws(input: &[u8]) -> &[u8] {
    let mut remaining = input;

    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }

        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }

        break;
    }

    remaining
}

fn digit_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// Parse an integer or real number.
///
/// Numbers may carry a leading sign and may start with a decimal point, but a
/// bare `.` must be followed by digits (`.notdef` is not a number).
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    match (int_part, frac_part) {
        (None, None) | (None, Some(None)) => return Err(digit_error(input)),
        _ => {},
    }

    if let Some(frac) = frac_part {
        let mut num_str = String::new();
        if sign == Some('-') {
            num_str.push('-');
        }
        match int_part {
            Some(int) => num_str.push_str(std::str::from_utf8(int).map_err(|_| digit_error(input))?),
            None => num_str.push('0'),
        }
        num_str.push('.');
        match frac {
            Some(frac) => num_str.push_str(std::str::from_utf8(frac).map_err(|_| digit_error(input))?),
            None => num_str.push('0'),
        }

        let num: f64 = num_str.parse().map_err(|_| digit_error(input))?;
        Ok((input, Token::Real(num)))
    } else {
        let int_bytes = int_part.ok_or_else(|| digit_error(input))?;
        let int_str = std::str::from_utf8(int_bytes).map_err(|_| digit_error(input))?;
        let mut num: i64 = int_str.parse().map_err(|_| digit_error(input))?;
        if sign == Some('-') {
            num = -num;
        }
        Ok((input, Token::Integer(num)))
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Handles balanced nested parentheses and skips over escape sequences.
/// The raw bytes are returned; see [`decode_literal_string`].
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => {
                // Escaped byte (octal escapes contain only digits, so they
                // never affect the parenthesis depth)
                pos += 2;
            },
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// Parse a hexadecimal string enclosed in angle brackets.
///
/// Examples: <48656C6C6F> = "Hello", <901FA3> = bytes [0x90, 0x1F, 0xA3]
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode #XX escape sequences in names.
///
/// # Examples
///
/// ```
/// # use cmap_oxide::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes("A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes("Identity-H"), "Identity-H");
/// assert_eq!(decode_name_escapes("A#"), "A#"); // Invalid sequence preserved
/// ```
pub fn decode_name_escapes(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '#' {
            result.push(ch);
            continue;
        }

        let hex1 = chars.next();
        let hex2 = chars.next();
        match (hex1, hex2) {
            (Some(h1), Some(h2)) => {
                match (h1.to_digit(16), h2.to_digit(16)) {
                    (Some(hi), Some(lo)) => result.push(((hi << 4) | lo) as u8 as char),
                    _ => {
                        result.push('#');
                        result.push(h1);
                        result.push(h2);
                    },
                }
            },
            (Some(h1), None) => {
                result.push('#');
                result.push(h1);
            },
            _ => result.push('#'),
        }
    }

    result
}

/// Parse a name starting with /.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_whitespace(c) && !is_delimiter(c)),
            |bytes: &[u8]| Token::Name(decode_name_escapes(&String::from_utf8_lossy(bytes))),
        ),
    )(input)
}

/// Parse delimiters.
///
/// `<<` and `>>` are checked before the single-character forms.
fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        value(Token::ProcStart, tag(b"{")),
        value(Token::ProcEnd, tag(b"}")),
    ))(input)
}

/// Parse a bare word and classify it.
///
/// `true`, `false` and `null` get their own tokens; every other word is a
/// [`Token::Keyword`].
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(|c: u8| !is_whitespace(c) && !is_delimiter(c)), |word: &[u8]| match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        _ => Token::Keyword(word),
    })(input)
}

/// Parse a single token.
///
/// Skips whitespace/comments and then tries, in order: delimiters, names,
/// numbers, literal strings, hex strings and bare keywords.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);

    alt((
        parse_delimiter,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
        parse_keyword,
    ))(input)
}

/// Forward-only token stream over a byte buffer.
///
/// # Examples
///
/// ```
/// use cmap_oxide::lexer::{Lexer, Token};
///
/// let mut lexer = Lexer::new(b"1 begincodespacerange <00> <FF>");
/// assert_eq!(lexer.next_token().unwrap(), Some(Token::Integer(1)));
/// assert!(lexer.next_token().unwrap().unwrap().is_keyword("begincodespacerange"));
/// ```
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `input`.
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Byte offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Read the next token, or `None` at end of input.
    ///
    /// Bytes that start no valid token produce [`Error::SyntaxError`].
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        let remaining = skip_ws(&self.input[self.pos..]);
        self.pos = self.input.len() - remaining.len();

        if remaining.is_empty() {
            return Ok(None);
        }

        match token(remaining) {
            Ok((rest, tok)) => {
                self.pos = self.input.len() - rest.len();
                Ok(Some(tok))
            },
            Err(_) => Err(Error::syntax(
                self.pos,
                format!("unrecognized token starting with byte 0x{:02X}", remaining[0]),
            )),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

fn hex_digit_to_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

/// Decode the digits of a hexadecimal string into bytes.
///
/// Whitespace and any non-hex byte are ignored; an odd trailing digit is
/// padded with `0`.
///
/// ```
/// # use cmap_oxide::lexer::decode_hex;
/// assert_eq!(decode_hex(b"48 65 6C"), b"Hel");
/// assert_eq!(decode_hex(b"901"), vec![0x90, 0x10]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Vec<u8> {
    let mut digits = hex_bytes.iter().filter_map(|&c| hex_digit_to_value(c));
    let mut result = Vec::with_capacity(hex_bytes.len() / 2 + 1);

    while let Some(high) = digits.next() {
        let low = digits.next().unwrap_or(0);
        result.push((high << 4) | low);
    }

    result
}

/// Decode the escape sequences of a literal string.
///
/// Supported escapes: `\n`, `\r`, `\t`, `\b`, `\f`, `\(`, `\)`, `\\`,
/// `\ddd` (1-3 octal digits) and backslash line continuation. Unknown
/// escapes keep the backslash.
///
/// ```
/// # use cmap_oxide::lexer::decode_literal_string;
/// assert_eq!(decode_literal_string(b"Adobe\\051"), b"Adobe)");
/// ```
pub fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        match raw[i + 1] {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(8),
            b'f' => result.push(12),
            b'(' | b')' | b'\\' => result.push(raw[i + 1]),
            b'\n' => {},
            b'\r' => {
                if raw.get(i + 2) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut octal_value = 0u32;
                let mut octal_len = 0;
                while octal_len < 3 {
                    match raw.get(i + 1 + octal_len) {
                        Some(&d @ b'0'..=b'7') => {
                            octal_value = octal_value * 8 + (d - b'0') as u32;
                            octal_len += 1;
                        },
                        _ => break,
                    }
                }
                result.push((octal_value & 0xFF) as u8);
                i += 1 + octal_len;
                continue;
            },
            _ => {
                result.push(b'\\');
                i += 1;
                continue;
            },
        }
        i += 2;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Number Tests
    // ========================================================================

    #[test]
    fn test_cid_destination_integer() {
        assert_eq!(token(b"7887 "), Ok((&b" "[..], Token::Integer(7887))));
        assert_eq!(token(b"-1"), Ok((&b""[..], Token::Integer(-1))));
    }

    #[test]
    fn test_cmap_version_real() {
        assert_eq!(token(b"10.001"), Ok((&b""[..], Token::Real(10.001))));
        assert_eq!(token(b".25"), Ok((&b""[..], Token::Real(0.25))));
        assert_eq!(token(b"3."), Ok((&b""[..], Token::Real(3.0))));
    }

    #[test]
    fn test_bare_dot_word_is_keyword() {
        let result = token(b".notdef");
        assert_eq!(result, Ok((&b""[..], Token::Keyword(b".notdef"))));
    }

    // ========================================================================
    // String Tests
    // ========================================================================

    #[test]
    fn test_registry_literal_string() {
        assert_eq!(token(b"(Adobe) def"), Ok((&b" def"[..], Token::LiteralString(b"Adobe"))));
    }

    #[test]
    fn test_literal_string_balanced_parens() {
        let result = token(b"(Japan1 (2004) \\)) z");
        assert_eq!(result, Ok((&b" z"[..], Token::LiteralString(b"Japan1 (2004) \\)"))));
    }

    #[test]
    fn test_code_hex_string() {
        assert_eq!(token(b"<8140>"), Ok((&b""[..], Token::HexString(b"8140"))));
        assert_eq!(token(b"<D835 DF0C>"), Ok((&b""[..], Token::HexString(b"D835 DF0C"))));
        assert_eq!(token(b"<>"), Ok((&b""[..], Token::HexString(b""))));
    }

    #[test]
    fn test_string_bytes() {
        assert_eq!(Token::HexString(b"8140").string_bytes(), Some(vec![0x81, 0x40]));
        assert_eq!(Token::LiteralString(b"a\\nb").string_bytes(), Some(b"a\nb".to_vec()));
        assert_eq!(Token::Integer(3).string_bytes(), None);
    }

    #[test]
    fn test_decode_hex_odd_length() {
        assert_eq!(decode_hex(b"ABC"), vec![0xAB, 0xC0]);
        assert_eq!(decode_hex(b""), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_literal_string_escapes() {
        assert_eq!(decode_literal_string(b"\\247"), vec![0xA7]);
        assert_eq!(decode_literal_string(b"\\0053"), vec![0x05, b'3']);
        assert_eq!(decode_literal_string(b"a\\\nb"), b"ab".to_vec());
        assert_eq!(decode_literal_string(b"a\\\r\nb"), b"ab".to_vec());
        assert_eq!(decode_literal_string(b"\\q"), b"\\q".to_vec());
    }

    // ========================================================================
    // Name and Keyword Tests
    // ========================================================================

    #[test]
    fn test_parse_name() {
        let result = token(b"/CMapName");
        assert_eq!(result, Ok((&b""[..], Token::Name("CMapName".to_string()))));
    }

    #[test]
    fn test_name_escapes() {
        let result = token(b"/Adobe#2DJapan1");
        assert_eq!(result, Ok((&b""[..], Token::Name("Adobe-Japan1".to_string()))));
        assert_eq!(decode_name_escapes("UniGB#2"), "UniGB#2");
        assert_eq!(decode_name_escapes("UniGB#ZZ"), "UniGB#ZZ");
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(token(b"usecmap"), Ok((&b""[..], Token::Keyword(b"usecmap"))));
        assert_eq!(token(b"true"), Ok((&b""[..], Token::True)));
        assert_eq!(token(b"null"), Ok((&b""[..], Token::Null)));
        // "objects" must not be split into a keyword prefix
        assert_eq!(token(b"objects"), Ok((&b""[..], Token::Keyword(b"objects"))));
    }

    #[test]
    fn test_keyword_stops_at_delimiter() {
        let result = token(b"endbfchar<00>");
        assert_eq!(result, Ok((&b"<00>"[..], Token::Keyword(b"endbfchar"))));
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b">>"), Ok((&b""[..], Token::DictEnd)));
        assert_eq!(token(b"["), Ok((&b""[..], Token::ArrayStart)));
        assert_eq!(token(b"}"), Ok((&b""[..], Token::ProcEnd)));
    }

    // ========================================================================
    // Lexer Tests
    // ========================================================================

    #[test]
    fn test_lexer_skips_comments() {
        let mut lexer = Lexer::new(b"%!PS-Adobe-3.0 Resource-CMap\n% another\n/CMapName");
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Name("CMapName".to_string())));
        assert_eq!(lexer.next_token().unwrap(), None);
    }

    #[test]
    fn test_lexer_cmap_snippet() {
        let input = b"1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange";
        let tokens: Vec<Token> = Lexer::new(input).collect::<Result<_>>().unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0], Token::Integer(1));
        assert!(tokens[1].is_keyword("begincodespacerange"));
        assert_eq!(tokens[2], Token::HexString(b"0000"));
        assert_eq!(tokens[3], Token::HexString(b"FFFF"));
        assert!(tokens[4].is_keyword("endcodespacerange"));
    }

    #[test]
    fn test_lexer_offset_tracks_position() {
        let mut lexer = Lexer::new(b"  42 /X");
        lexer.next_token().unwrap();
        assert_eq!(lexer.offset(), 4);
    }

    #[test]
    fn test_lexer_reports_stray_delimiter() {
        let mut lexer = Lexer::new(b"1 ) 2");
        lexer.next_token().unwrap();
        match lexer.next_token() {
            Err(Error::SyntaxError { offset, .. }) => assert_eq!(offset, 2),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_lexer_unterminated_hex_string() {
        let mut lexer = Lexer::new(b"<00FF");
        assert!(lexer.next_token().is_err());
    }
}
