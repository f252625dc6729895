//! Command serialization.
//!
//! Commands are written as a sequence of [`Fragment`]s: plain line segments
//! and string literals. A synchronizing literal may only be sent after the
//! server has answered the preceding line with a `+` continuation, so the
//! dispatcher walks the fragments instead of writing one byte buffer.

use crate::types::Flag;

use super::types::{FetchAttribute, StoreAction};

/// Largest literal sent non-synchronizing under `LITERAL-`.
pub const LITERAL_MINUS_LIMIT: usize = 4096;

/// How literals announce themselves on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralMode {
    /// `{n}`: wait for a continuation before sending the data.
    Sync,
    /// `{n+}`: send the data immediately.
    NonSync,
}

/// Literal capability advertised by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiteralSupport {
    /// Only synchronizing literals.
    #[default]
    Synchronizing,
    /// `LITERAL+`: every literal may be non-synchronizing.
    Plus,
    /// `LITERAL-`: literals up to 4096 bytes may be non-synchronizing.
    Minus,
}

impl LiteralSupport {
    /// Mode used for a literal of `len` bytes.
    #[must_use]
    pub const fn mode_for(self, len: usize) -> LiteralMode {
        match self {
            Self::Plus => LiteralMode::NonSync,
            Self::Minus if len <= LITERAL_MINUS_LIMIT => LiteralMode::NonSync,
            Self::Minus | Self::Synchronizing => LiteralMode::Sync,
        }
    }
}

/// One piece of an encoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Bytes written as-is. A line fragment that precedes a literal ends
    /// with the literal's `{n}\r\n` announcement.
    Line(Vec<u8>),
    /// Literal payload.
    Literal {
        /// Raw bytes.
        data: Vec<u8>,
        /// Whether a continuation is awaited before `data`.
        mode: LiteralMode,
    },
}

/// A command ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    fragments: Vec<Fragment>,
}

impl EncodedCommand {
    /// Fragments in wire order.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Consumes the command, returning its fragments.
    #[must_use]
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }

    /// Returns true if a continuation must be awaited mid-command.
    #[must_use]
    pub fn needs_continuation(&self) -> bool {
        self.fragments.iter().any(|f| {
            matches!(
                f,
                Fragment::Literal {
                    mode: LiteralMode::Sync,
                    ..
                }
            )
        })
    }

    /// Concatenated wire bytes, ignoring continuation points.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Line(bytes) => out.extend_from_slice(bytes),
                Fragment::Literal { data, .. } => out.extend_from_slice(data),
            }
        }
        out
    }
}

/// How a string argument is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringForm {
    /// Bare atom.
    Atom,
    /// Double-quoted with `"` and `\` escaped.
    Quoted,
    /// `{n}` literal.
    Literal,
}

impl StringForm {
    /// Picks the form for `s`.
    ///
    /// CR, LF, NUL and 8-bit bytes cannot appear in a quoted string and force
    /// a literal. Empty strings and strings with atom-specials are quoted.
    #[must_use]
    pub fn of(s: &str) -> Self {
        if s.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0) || !b.is_ascii()) {
            Self::Literal
        } else if s.is_empty() || s.bytes().any(needs_quoting) {
            Self::Quoted
        } else {
            Self::Atom
        }
    }
}

/// Returns true if the byte may not appear in an atom.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b == 0x7F
}

/// Incremental command builder.
#[derive(Debug)]
pub struct CommandWriter {
    fragments: Vec<Fragment>,
    line: Vec<u8>,
    literals: LiteralSupport,
}

impl CommandWriter {
    /// Starts a command line with `tag` followed by a space.
    #[must_use]
    pub fn new(tag: &str, literals: LiteralSupport) -> Self {
        let mut line = Vec::with_capacity(64);
        line.extend_from_slice(tag.as_bytes());
        line.push(b' ');
        Self {
            fragments: Vec::new(),
            line,
            literals,
        }
    }

    /// Appends protocol text verbatim.
    pub fn raw(&mut self, text: &str) {
        self.line.extend_from_slice(text.as_bytes());
    }

    /// Appends a single space.
    pub fn sp(&mut self) {
        self.line.push(b' ');
    }

    /// Appends a string argument as atom, quoted string or literal.
    pub fn astring(&mut self, s: &str) {
        match StringForm::of(s) {
            StringForm::Atom => self.raw(s),
            StringForm::Quoted => self.quoted(s),
            StringForm::Literal => self.literal(s.as_bytes()),
        }
    }

    /// Appends a string argument that must not be a bare atom.
    pub fn string(&mut self, s: &str) {
        match StringForm::of(s) {
            StringForm::Literal => self.literal(s.as_bytes()),
            StringForm::Atom | StringForm::Quoted => self.quoted(s),
        }
    }

    fn quoted(&mut self, s: &str) {
        self.line.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                self.line.push(b'\\');
            }
            self.line.push(b);
        }
        self.line.push(b'"');
    }

    /// Appends a literal.
    pub fn literal(&mut self, data: &[u8]) {
        let mode = self.literals.mode_for(data.len());
        let marker = match mode {
            LiteralMode::Sync => format!("{{{}}}\r\n", data.len()),
            LiteralMode::NonSync => format!("{{{}+}}\r\n", data.len()),
        };
        self.line.extend_from_slice(marker.as_bytes());
        let line = std::mem::take(&mut self.line);
        self.fragments.push(Fragment::Line(line));
        self.fragments.push(Fragment::Literal {
            data: data.to_vec(),
            mode,
        });
    }

    /// Appends a parenthesized flag list.
    pub fn flag_list(&mut self, flags: &[Flag]) {
        self.line.push(b'(');
        for (i, flag) in flags.iter().enumerate() {
            if i > 0 {
                self.line.push(b' ');
            }
            self.line.extend_from_slice(flag.as_str().as_bytes());
        }
        self.line.push(b')');
    }

    /// Appends FETCH items, parenthesized when there is more than one.
    pub fn fetch_items(&mut self, items: &[FetchAttribute]) {
        if let [single] = items {
            self.fetch_attribute(single);
            return;
        }
        self.line.push(b'(');
        for (i, attr) in items.iter().enumerate() {
            if i > 0 {
                self.line.push(b' ');
            }
            self.fetch_attribute(attr);
        }
        self.line.push(b')');
    }

    fn fetch_attribute(&mut self, attr: &FetchAttribute) {
        match attr {
            FetchAttribute::Uid => self.raw("UID"),
            FetchAttribute::Flags => self.raw("FLAGS"),
            FetchAttribute::InternalDate => self.raw("INTERNALDATE"),
            FetchAttribute::Rfc822Size => self.raw("RFC822.SIZE"),
            FetchAttribute::Envelope => self.raw("ENVELOPE"),
            FetchAttribute::BodyStructure => self.raw("BODYSTRUCTURE"),
            FetchAttribute::Body {
                section,
                peek,
                partial,
            } => {
                self.raw(if *peek { "BODY.PEEK[" } else { "BODY[" });
                if let Some(section) = section {
                    self.raw(section);
                }
                self.raw("]");
                if let Some((start, len)) = partial {
                    self.raw(&format!("<{start}.{len}>"));
                }
            }
        }
    }

    /// Appends a STORE data item and its flag list.
    pub fn store_action(&mut self, action: &StoreAction, silent: bool) {
        self.raw(action.item_name());
        if silent {
            self.raw(".SILENT");
        }
        self.sp();
        self.flag_list(action.flags());
    }

    /// Terminates the command with CRLF.
    #[must_use]
    pub fn finish(mut self) -> EncodedCommand {
        self.line.extend_from_slice(b"\r\n");
        self.fragments.push(Fragment::Line(self.line));
        EncodedCommand {
            fragments: self.fragments,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut CommandWriter)) -> String {
        let mut w = CommandWriter::new("A1", LiteralSupport::Synchronizing);
        f(&mut w);
        String::from_utf8(w.finish().to_bytes()).unwrap()
    }

    #[test]
    fn string_forms() {
        assert_eq!(StringForm::of("INBOX"), StringForm::Atom);
        assert_eq!(StringForm::of(""), StringForm::Quoted);
        assert_eq!(StringForm::of("my folder"), StringForm::Quoted);
        assert_eq!(StringForm::of("a]b"), StringForm::Quoted);
        assert_eq!(StringForm::of("Ärger"), StringForm::Literal);
        assert_eq!(StringForm::of("two\r\nlines"), StringForm::Literal);
    }

    #[test]
    fn quoted_escapes() {
        assert_eq!(written(|w| w.astring(r#"say "hi"\"#)), "A1 \"say \\\"hi\\\"\\\\\"\r\n");
    }

    #[test]
    fn string_never_atom() {
        assert_eq!(written(|w| w.string("plain")), "A1 \"plain\"\r\n");
    }

    #[test]
    fn synchronizing_literal_splits_fragments() {
        let mut w = CommandWriter::new("A1", LiteralSupport::Synchronizing);
        w.raw("LOGIN ");
        w.astring("ünïcode");
        w.sp();
        w.astring("pw");
        let cmd = w.finish();
        assert!(cmd.needs_continuation());
        assert_eq!(
            cmd.fragments(),
            &[
                Fragment::Line(b"A1 LOGIN {9}\r\n".to_vec()),
                Fragment::Literal {
                    data: "ünïcode".as_bytes().to_vec(),
                    mode: LiteralMode::Sync,
                },
                Fragment::Line(b" pw\r\n".to_vec()),
            ]
        );
    }

    #[test]
    fn literal_plus_is_non_synchronizing() {
        let mut w = CommandWriter::new("A1", LiteralSupport::Plus);
        w.literal(&[b'x'; 10_000]);
        let cmd = w.finish();
        assert!(!cmd.needs_continuation());
        assert!(cmd.to_bytes().starts_with(b"A1 {10000+}\r\n"));
    }

    #[test]
    fn literal_minus_threshold() {
        assert_eq!(LiteralSupport::Minus.mode_for(4096), LiteralMode::NonSync);
        assert_eq!(LiteralSupport::Minus.mode_for(4097), LiteralMode::Sync);
        assert_eq!(LiteralSupport::Synchronizing.mode_for(1), LiteralMode::Sync);
    }

    #[test]
    fn fetch_items_parenthesized_only_when_several() {
        assert_eq!(written(|w| w.fetch_items(&[FetchAttribute::Uid])), "A1 UID\r\n");
        assert_eq!(
            written(|w| w.fetch_items(&[
                FetchAttribute::Uid,
                FetchAttribute::Body {
                    section: Some("1.2".into()),
                    peek: true,
                    partial: Some((0, 512)),
                },
            ])),
            "A1 (UID BODY.PEEK[1.2]<0.512>)\r\n"
        );
    }

    #[test]
    fn store_silent() {
        assert_eq!(
            written(|w| w.store_action(&StoreAction::Add(vec![Flag::Seen, Flag::Deleted]), true)),
            "A1 +FLAGS.SILENT (\\Seen \\Deleted)\r\n"
        );
    }
}
