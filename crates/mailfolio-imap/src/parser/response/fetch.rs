//! FETCH response parsing.

use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;
use crate::Result;

use super::helpers::parse_flag_list;
use super::types::{Address, BodyStructure, Envelope, FetchItem};

/// Parses the parenthesized data items of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(name) => name.to_ascii_uppercase(),
            token => return Err(lexer.error(&format!("Expected FETCH item name, got {token:?}"))),
        };

        match name.as_str() {
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_flag_list(lexer)?));
            }
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("UID 0 in FETCH response"))?;
                items.push(FetchItem::Uid(uid));
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Rfc822Size(lexer.read_number()?));
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                let date = lexer.read_nstring()?.unwrap_or_default();
                items.push(FetchItem::InternalDate(date));
            }
            "ENVELOPE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Envelope(Box::new(parse_envelope(lexer)?)));
            }
            "BODYSTRUCTURE" => {
                lexer.expect_space()?;
                items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
            }
            "BODY" if lexer.peek() == Some(b' ') => {
                // BODY without a section is the non-extensible structure.
                lexer.expect_space()?;
                items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
            }
            "BODY" => {
                let (section, origin) = parse_section_and_origin(lexer)?;
                lexer.expect_space()?;
                let data = lexer.read_nstring_bytes()?;
                items.push(FetchItem::Body {
                    section,
                    origin,
                    data,
                });
            }
            _ => {
                lexer.expect_space()?;
                skip_value(lexer)?;
            }
        }
    }

    Ok(items)
}

/// Reads `[section]` and an optional `<origin>` after `BODY`.
fn parse_section_and_origin(lexer: &mut Lexer<'_>) -> Result<(Option<String>, Option<u32>)> {
    if !lexer.eat(b'[') {
        return Err(lexer.error("Expected [ after BODY"));
    }

    // Sections may hold quoted header names, so brackets inside quotes are
    // not terminators.
    let mut section = String::new();
    let mut quoted = false;
    loop {
        match lexer.advance() {
            Some(b']') if !quoted => break,
            Some(b'"') => {
                quoted = !quoted;
                section.push('"');
            }
            Some(b'\r' | b'\n') | None => return Err(lexer.error("Unterminated BODY section")),
            Some(b) => section.push(char::from(b)),
        }
    }

    let origin = if lexer.eat(b'<') {
        let mut digits = String::new();
        while let Some(b) = lexer.peek().filter(u8::is_ascii_digit) {
            digits.push(char::from(b));
            lexer.advance();
        }
        if !lexer.eat(b'>') {
            return Err(lexer.error("Expected > after BODY origin"));
        }
        Some(digits.parse().map_err(|_| lexer.error("Invalid BODY origin"))?)
    } else {
        None
    };

    let section = (!section.is_empty()).then_some(section);
    Ok((section, origin))
}

/// Parses an `ENVELOPE` structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;
    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.advance();
                        return Ok(addresses);
                    }
                    Some(b' ') => {
                        lexer.advance();
                    }
                    Some(b'(') => addresses.push(parse_address(lexer)?),
                    _ => return Err(lexer.error("Malformed address list")),
                }
            }
        }
        token => Err(lexer.error(&format!("Expected address list, got {token:?}"))),
    }
}

fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;
    let name = lexer.read_nstring()?;
    lexer.expect_space()?;
    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;
    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;
    let host = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Parses a `BODYSTRUCTURE` value, ignoring extension data.
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(Token::LParen)?;

    if lexer.peek() == Some(b'(') {
        let mut bodies = Vec::new();
        while lexer.peek() == Some(b'(') {
            bodies.push(parse_body_structure(lexer)?);
            lexer.eat(b' ');
        }
        let subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
        skip_rest_of_list(lexer)?;
        return Ok(BodyStructure::Multipart { bodies, subtype });
    }

    let media_type = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
    lexer.expect_space()?;
    let media_subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
    lexer.expect_space()?;
    let params = parse_body_params(lexer)?;
    lexer.expect_space()?;
    let id = lexer.read_nstring()?;
    lexer.expect_space()?;
    let description = lexer.read_nstring()?;
    lexer.expect_space()?;
    let encoding = lexer.read_nstring()?.unwrap_or_default();
    lexer.expect_space()?;
    let size = lexer.read_number()?;

    if media_type == "TEXT" {
        let lines = if lexer.eat(b' ') { lexer.read_number()? } else { 0 };
        skip_rest_of_list(lexer)?;
        return Ok(BodyStructure::Text {
            subtype: media_subtype,
            params,
            id,
            description,
            encoding,
            size,
            lines,
        });
    }

    skip_rest_of_list(lexer)?;
    Ok(BodyStructure::Basic {
        media_type,
        media_subtype,
        params,
        id,
        description,
        encoding,
        size,
    })
}

fn parse_body_params(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut params = Vec::new();
            loop {
                lexer.skip_spaces();
                if lexer.eat(b')') {
                    return Ok(params);
                }
                let key = lexer.read_nstring()?.unwrap_or_default();
                lexer.skip_spaces();
                let value = lexer.read_nstring()?.unwrap_or_default();
                params.push((key, value));
            }
        }
        token => Err(lexer.error(&format!("Expected body parameters, got {token:?}"))),
    }
}

/// Skips values until the `)` closing the current list, and consumes it.
fn skip_rest_of_list(lexer: &mut Lexer<'_>) -> Result<()> {
    loop {
        lexer.skip_spaces();
        if lexer.eat(b')') {
            return Ok(());
        }
        if lexer.is_eof() {
            return Err(lexer.error("Unterminated list"));
        }
        skip_value(lexer)?;
    }
}

/// Skips one value: an atom, number, string, literal, NIL or a nested list.
pub fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    match lexer.next_token()? {
        Token::LParen => skip_rest_of_list(lexer),
        Token::LBracket => {
            while lexer.peek().is_some_and(|b| b != b']') {
                lexer.advance();
            }
            lexer.expect(Token::RBracket)?;
            if lexer.peek().is_some_and(|b| b != b' ' && b != b')') {
                skip_value(lexer)?;
            }
            Ok(())
        }
        Token::Atom(_)
        | Token::Number(_)
        | Token::QuotedString(_)
        | Token::Literal(_)
        | Token::Nil
        | Token::Asterisk => Ok(()),
        token => Err(lexer.error(&format!("Unexpected token {token:?}"))),
    }
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
    use crate::types::Flag;

    fn parse(input: &[u8]) -> Vec<FetchItem> {
        parse_fetch_response(&mut Lexer::new(input)).unwrap()
    }

    #[test]
    fn flags_uid_size() {
        let items = parse(b"(FLAGS (\\Seen $Work) UID 42 RFC822.SIZE 1024)");
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], FetchItem::Flags(f) if f.contains(&Flag::Seen)));
        assert!(matches!(items[1], FetchItem::Uid(uid) if uid.get() == 42));
        assert_eq!(items[2], FetchItem::Rfc822Size(1024));
    }

    #[test]
    fn uid_zero_is_error() {
        assert!(parse_fetch_response(&mut Lexer::new(b"(UID 0)")).is_err());
    }

    #[test]
    fn internal_date() {
        let items = parse(b"(INTERNALDATE \"17-Jul-1996 02:44:25 -0700\")");
        assert_eq!(
            items,
            vec![FetchItem::InternalDate("17-Jul-1996 02:44:25 -0700".to_string())]
        );
    }

    #[test]
    fn body_section_literal() {
        let items = parse(b"(BODY[HEADER.FIELDS (SUBJECT)] {15}\r\nSubject: hi\r\n\r\n)");
        assert_eq!(
            items,
            vec![FetchItem::Body {
                section: Some("HEADER.FIELDS (SUBJECT)".to_string()),
                origin: None,
                data: Some(b"Subject: hi\r\n\r\n".to_vec()),
            }]
        );
    }

    #[test]
    fn body_section_quoted_and_nil() {
        let items = parse(b"(BODY[1] \"short\" BODY[2] NIL)");
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: Some("1".to_string()),
                origin: None,
                data: Some(b"short".to_vec()),
            }
        );
        assert!(matches!(&items[1], FetchItem::Body { data: None, .. }));
    }

    #[test]
    fn body_partial_origin() {
        let items = parse(b"(BODY[]<0> {3}\r\nabc)");
        assert_eq!(
            items,
            vec![FetchItem::Body {
                section: None,
                origin: Some(0),
                data: Some(b"abc".to_vec()),
            }]
        );
    }

    #[test]
    fn envelope() {
        let input = b"(ENVELOPE (\"Mon, 7 Feb 1994 21:52:25 -0800\" \"Re: plans\" \
            ((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) NIL NIL \
            ((NIL NIL \"imap\" \"cac.washington.edu\")) NIL NIL NIL \"<B27397-0100000@cac.washington.edu>\"))";
        let items = parse(input);
        let FetchItem::Envelope(env) = &items[0] else {
            panic!("expected envelope");
        };
        assert_eq!(env.subject.as_deref(), Some("Re: plans"));
        assert_eq!(env.from[0].name.as_deref(), Some("Terry Gray"));
        assert_eq!(env.to[0].email().as_deref(), Some("imap@cac.washington.edu"));
        assert!(env.cc.is_empty());
        assert_eq!(
            env.message_id.as_deref(),
            Some("<B27397-0100000@cac.washington.edu>")
        );
    }

    #[test]
    fn multipart_bodystructure_with_extensions() {
        let input = b"(BODYSTRUCTURE ((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" 1152 23 NIL NIL NIL) \
            (\"APPLICATION\" \"PDF\" (\"NAME\" \"a.pdf\") \"<id>\" NIL \"BASE64\" 4554 NIL (\"ATTACHMENT\" (\"FILENAME\" \"a.pdf\")) NIL) \
            \"MIXED\" (\"BOUNDARY\" \"xyz\") NIL NIL))";
        let items = parse(input);
        let FetchItem::BodyStructure(BodyStructure::Multipart { bodies, subtype }) = &items[0]
        else {
            panic!("expected multipart");
        };
        assert_eq!(subtype, "MIXED");
        assert_eq!(bodies.len(), 2);
        assert!(matches!(&bodies[0], BodyStructure::Text { lines: 23, size: 1152, .. }));
        assert!(matches!(
            &bodies[1],
            BodyStructure::Basic { media_subtype, size: 4554, .. } if media_subtype == "PDF"
        ));
    }

    #[test]
    fn unknown_items_are_skipped() {
        let items = parse(b"(X-GM-LABELS (\"\\\\Inbox\" work) MODSEQ (12) UID 7)");
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], FetchItem::Uid(uid) if uid.get() == 7));
    }
}
