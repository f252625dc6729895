//! Parsers for the smaller response shapes.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, SeqNum, Uid,
    UidValidity,
};
use crate::{Error, Result};

use super::types::StatusItem;

/// Parses `[CODE args]` including the brackets.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let atom = lexer.read_atom_string()?;

    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "NONEXISTENT" => ResponseCode::NonExistent,
        "NOPERM" => ResponseCode::NoPerm,
        "UIDNEXT" => numeric_code(lexer, atom, |n| Uid::new(n).map(ResponseCode::UidNext))?,
        "UIDVALIDITY" => numeric_code(lexer, atom, |n| {
            UidValidity::new(n).map(ResponseCode::UidValidity)
        })?,
        "UNSEEN" => numeric_code(lexer, atom, |n| SeqNum::new(n).map(ResponseCode::Unseen))?,
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?.iter().cloned().collect())
        }
        "BADCHARSET" => {
            let mut charsets = Vec::new();
            if lexer.eat(b' ') {
                lexer.expect(Token::LParen)?;
                loop {
                    match lexer.next_token()? {
                        Token::RParen => break,
                        Token::Space => {}
                        Token::Atom(s) => charsets.push(s.to_string()),
                        Token::QuotedString(s) => charsets.push(s),
                        token => {
                            return Err(
                                lexer.error(&format!("Unexpected token in BADCHARSET: {token:?}"))
                            );
                        }
                    }
                }
            }
            ResponseCode::BadCharset(charsets)
        }
        _ => ResponseCode::Other(atom.to_ascii_uppercase()),
    };

    // Arguments of unknown codes are not interpreted.
    while lexer.peek().is_some_and(|b| b != b']' && b != b'\r') {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

fn numeric_code(
    lexer: &mut Lexer<'_>,
    atom: &str,
    build: impl FnOnce(u32) -> Option<ResponseCode>,
) -> Result<ResponseCode> {
    lexer.expect_space()?;
    let n = lexer.read_number()?;
    Ok(build(n).unwrap_or_else(|| ResponseCode::Other(atom.to_ascii_uppercase())))
}

/// Parses the space-separated capability names after `CAPABILITY`.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.eat(b' ') {
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(Capability::parse(s)),
            Token::Number(n) => caps.push(Capability::parse(&n.to_string())),
            _ => break,
        }
    }
    Ok(caps)
}

/// Parses a parenthesized flag list. `\*` is read as [`Flag::MayCreate`].
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;
    let mut flags = Flags::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom("\\") if lexer.eat(b'*') => flags.insert(Flag::MayCreate),
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            token => {
                return Err(lexer.error(&format!("Unexpected token in flag list: {token:?}")));
            }
        }
    }

    Ok(flags)
}

/// Parses the body of a LIST response.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            token => {
                return Err(lexer.error(&format!("Unexpected token in LIST attributes: {token:?}")));
            }
        }
    }

    lexer.expect_space()?;
    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(&format!("Expected delimiter, got {token:?}"))),
    };

    lexer.expect_space()?;
    let name = lexer.read_astring()?;

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::new(name),
    })
}

/// Parses the numbers of a SEARCH or SORT response.
///
/// Zero is not a valid message number and is rejected.
pub fn parse_number_list(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();
    while lexer.eat(b' ') {
        match lexer.next_token()? {
            Token::Number(0) => return Err(lexer.error("Message number 0 in result")),
            Token::Number(n) => nums.push(n),
            // Trailing space before CRLF is common.
            Token::Crlf | Token::Eof => break,
            token => return Err(lexer.error(&format!("Expected number, got {token:?}"))),
        }
    }
    Ok(nums)
}

/// Parses the body of a STATUS response.
pub fn parse_status_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<StatusItem>)> {
    let name = lexer.read_astring()?;
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(key) => {
                lexer.expect_space()?;
                let value = lexer.read_number()?;
                let item = match key.to_ascii_uppercase().as_str() {
                    "MESSAGES" => Some(StatusItem::Messages(value)),
                    "RECENT" => Some(StatusItem::Recent(value)),
                    "UIDNEXT" => Uid::new(value).map(StatusItem::UidNext),
                    "UIDVALIDITY" => UidValidity::new(value).map(StatusItem::UidValidity),
                    "UNSEEN" => Some(StatusItem::Unseen(value)),
                    _ => None,
                };
                items.extend(item);
            }
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in STATUS: {token:?}"),
                });
            }
        }
    }

    Ok((Mailbox::new(name), items))
}
