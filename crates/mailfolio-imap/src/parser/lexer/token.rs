//! Token types.

/// Token produced by the [`Lexer`](super::Lexer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom. Backslash-prefixed flag names lex as one atom.
    Atom(&'a str),
    /// Quoted string with escapes removed.
    QuotedString(String),
    /// Literal payload, borrowed from the input.
    Literal(&'a [u8]),
    /// Number that fits in 32 bits.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `NIL`, in any case.
    Nil,
    /// CRLF.
    Crlf,
    /// End of input.
    Eof,
}
