//! Tokenizer for IMAP lines.
//!
//! The same lexer reads server responses and, in the search grammar, client
//! command lines. Literals are expected inline: `{n}\r\n` followed by exactly
//! `n` bytes, which is how the framed reader hands complete responses over.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Cursor over one complete line, literals included.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Byte offset of the cursor.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    /// Returns true once everything has been consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Current byte.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Consumes `byte` if it is next, returning whether it was.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let simple = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = simple {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' if self.peek_at(1) == Some(b'\n') => {
                self.skip(2);
                Ok(Token::Crlf)
            }
            b'\r' => Err(self.error("Expected LF after CR")),
            b'"' => self.read_quoted(),
            b'{' => self.read_literal(),
            _ if is_atom_char(byte) => Ok(self.read_atom_like()),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    fn read_quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(c) => return Err(self.error(&format!("Invalid escape: \\{}", c as char))),
                    None => return Err(self.error("Unterminated quoted string")),
                },
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("Unterminated quoted string"));
                }
                Some(c) => out.push(c),
            }
        }
        String::from_utf8(out)
            .map(Token::QuotedString)
            .map_err(|_| self.error("Invalid UTF-8 in quoted string"))
    }

    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &self.input[start..self.pos];
        if digits.is_empty() {
            return Err(self.error("Empty literal length"));
        }
        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("Literal length out of range"))?;

        self.eat(b'+');
        if !self.eat(b'}') {
            return Err(self.error("Expected } after literal length"));
        }
        if !(self.eat(b'\r') && self.eat(b'\n')) {
            return Err(self.error("Expected CRLF after literal length"));
        }

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("Incomplete literal data"))?;
        let data = &self.input[self.pos..end];
        self.pos = end;
        Ok(Token::Literal(data))
    }

    fn read_atom_like(&mut self) -> Token<'a> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.pos += 1;
        }
        let bytes = &self.input[start..self.pos];
        // Atom chars are all ASCII.
        let text = std::str::from_utf8(bytes).unwrap_or_default();

        if bytes.iter().all(u8::is_ascii_digit) {
            if let Ok(n) = text.parse() {
                return Token::Number(n);
            }
        }
        if text.eq_ignore_ascii_case("NIL") {
            Token::Nil
        } else {
            Token::Atom(text)
        }
    }

    /// Builds a parse error at the cursor.
    #[must_use]
    pub fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Consumes CRLF.
    pub fn expect_crlf(&mut self) -> Result<()> {
        self.expect(Token::Crlf)
    }

    /// Reads an astring. Atom forms are returned verbatim, so `007` and
    /// `nil` keep their spelling.
    pub fn read_astring(&mut self) -> Result<String> {
        if self.peek().is_some_and(is_atom_char) {
            let atom = self.take_while(is_atom_char);
            return Ok(String::from_utf8_lossy(atom).into_owned());
        }
        match self.next_token()? {
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => String::from_utf8(data.to_vec())
                .map_err(|_| self.error("Invalid UTF-8 in literal")),
            token => Err(self.error(&format!("Expected astring, got {token:?}"))),
        }
    }

    /// Reads an nstring.
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        match self.read_nstring_bytes()? {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| self.error("Invalid UTF-8 in string")),
        }
    }

    /// Reads an nstring without requiring UTF-8.
    pub fn read_nstring_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s.into_bytes())),
            Token::Literal(data) => Ok(Some(data.to_vec())),
            token => Err(self.error(&format!("Expected nstring, got {token:?}"))),
        }
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("Expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("Expected atom, got {token:?}"))),
        }
    }

    /// Skips any run of spaces.
    pub fn skip_spaces(&mut self) {
        while self.eat(b' ') {}
    }

    /// Consumes bytes while `pred` holds and returns them.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    /// Reads free text up to CRLF and consumes the CRLF.
    pub fn read_text(&mut self) -> String {
        let rest = self.remaining();
        let end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(rest.len());
        self.skip(end);
        if self.peek() == Some(b'\r') {
            self.skip(2);
        }
        String::from_utf8_lossy(&rest[..end]).into_owned()
    }
}

/// Returns true if the byte may appear in an atom.
///
/// `\` is accepted so that flags such as `\Seen` lex as one atom, and `*`
/// and `%` are excluded because they are wildcards and sequence-set markers.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b, 0x21..=0x7E)
        && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'[' | b']')
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn tagged_line() {
        assert_eq!(
            tokens(b"A001 OK done\r\n"),
            vec![
                Token::Atom("A001"),
                Token::Space,
                Token::Atom("OK"),
                Token::Space,
                Token::Atom("done"),
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn flags_and_brackets() {
        assert_eq!(
            tokens(b"(\\Seen $Junk)[UIDNEXT 4]"),
            vec![
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Atom("$Junk"),
                Token::RParen,
                Token::LBracket,
                Token::Atom("UIDNEXT"),
                Token::Space,
                Token::Number(4),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn numbers_too_large_become_atoms() {
        assert_eq!(tokens(b"4294967295"), vec![Token::Number(u32::MAX)]);
        assert_eq!(tokens(b"4294967296"), vec![Token::Atom("4294967296")]);
    }

    #[test]
    fn nil_any_case() {
        assert_eq!(
            tokens(b"NIL nil"),
            vec![Token::Nil, Token::Space, Token::Nil]
        );
    }

    #[test]
    fn quoted_with_escapes() {
        assert_eq!(
            tokens(br#""a \"b\" \\ c""#),
            vec![Token::QuotedString(r#"a "b" \ c"#.to_string())]
        );
    }

    #[test]
    fn quoted_rejects_bad_escape_and_newline() {
        assert!(Lexer::new(br#""\n""#).next_token().is_err());
        assert!(Lexer::new(b"\"a\r\n\"").next_token().is_err());
    }

    #[test]
    fn literal_borrowed_with_embedded_crlf() {
        assert_eq!(
            tokens(b"{6}\r\nab\r\ncd "),
            vec![Token::Literal(b"ab\r\ncd"), Token::Space]
        );
    }

    #[test]
    fn non_synchronizing_literal() {
        assert_eq!(tokens(b"{2+}\r\nhi"), vec![Token::Literal(b"hi")]);
    }

    #[test]
    fn truncated_literal_is_error() {
        let err = Lexer::new(b"{10}\r\nshort").next_token().unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn literal_one_byte_short_is_error() {
        let err = Lexer::new(b"{7}\r\nab\r\ncd").next_token().unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn empty_literal_length_is_error() {
        assert!(Lexer::new(b"{}\r\n").next_token().is_err());
    }

    #[test]
    fn text_stops_at_crlf() {
        let mut lexer = Lexer::new(b"some text [x]\r\nrest");
        assert_eq!(lexer.read_text(), "some text [x]");
        assert_eq!(lexer.remaining(), b"rest");
    }

    #[test]
    fn astring_accepts_numbers() {
        let mut lexer = Lexer::new(b"2024 0042 nil");
        assert_eq!(lexer.read_astring().unwrap(), "2024");
        lexer.skip_spaces();
        assert_eq!(lexer.read_astring().unwrap(), "0042");
        lexer.skip_spaces();
        assert_eq!(lexer.read_astring().unwrap(), "nil");
    }

    #[test]
    fn atom_chars() {
        assert!(is_atom_char(b'A'));
        assert!(is_atom_char(b'\\'));
        assert!(is_atom_char(b'}'));
        assert!(!is_atom_char(b' '));
        assert!(!is_atom_char(b'*'));
        assert!(!is_atom_char(b']'));
        assert!(!is_atom_char(0x7F));
    }
}
