//! Response parser.

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{Address, BodyStructure, Envelope, FetchItem, StatusItem, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::Result;

use helpers::{
    parse_capability_data, parse_flag_list, parse_list_response, parse_number_list,
    parse_response_code, parse_status_response,
};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// Tag of the completed command.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// `+` continuation request.
    Continuation {
        /// Text after the `+`, if any.
        text: Option<String>,
    },
}

impl Response {
    /// Returns true for an untagged BYE.
    #[must_use]
    pub const fn is_bye(&self) -> bool {
        matches!(self, Self::Untagged(UntaggedResponse::Bye { .. }))
    }
}

/// Parser for complete response lines.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one response, literals included.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => {
                lexer.eat(b' ');
                let text = lexer.read_text();
                Ok(Response::Continuation {
                    text: (!text.is_empty()).then_some(text),
                })
            }
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(n) => Self::parse_tagged(&mut lexer, &n.to_string()),
            token => Err(lexer.error(&format!("Expected *, + or tag, got {token:?}"))),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let word = lexer.read_atom_string()?;
        let status = match word.to_ascii_uppercase().as_str() {
            "OK" => Status::Ok,
            "NO" => Status::No,
            "BAD" => Status::Bad,
            _ => return Err(lexer.error(&format!("Invalid completion status: {word}"))),
        };
        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let data = match lexer.next_token()? {
            Token::Atom(keyword) => Self::parse_keyword_data(lexer, keyword)?,
            Token::Number(n) => Self::parse_message_data(lexer, n)?,
            token => {
                return Err(
                    lexer.error(&format!("Unexpected token in untagged response: {token:?}"))
                );
            }
        };
        Ok(Response::Untagged(data))
    }

    fn parse_keyword_data(lexer: &mut Lexer<'_>, keyword: &str) -> Result<UntaggedResponse> {
        let upper = keyword.to_ascii_uppercase();
        let data = match upper.as_str() {
            "OK" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::Ok { code, text }
            }
            "NO" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::No { code, text }
            }
            "BAD" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::Bad { code, text }
            }
            "PREAUTH" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::PreAuth { code, text }
            }
            "BYE" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::Bye { code, text }
            }
            "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
            "FLAGS" => {
                lexer.expect_space()?;
                UntaggedResponse::Flags(parse_flag_list(lexer)?)
            }
            "LIST" => {
                lexer.expect_space()?;
                UntaggedResponse::List(parse_list_response(lexer)?)
            }
            "LSUB" => {
                lexer.expect_space()?;
                UntaggedResponse::Lsub(parse_list_response(lexer)?)
            }
            "SEARCH" => UntaggedResponse::Search(parse_number_list(lexer)?),
            "SORT" => UntaggedResponse::Sort(parse_number_list(lexer)?),
            "STATUS" => {
                lexer.expect_space()?;
                let (mailbox, items) = parse_status_response(lexer)?;
                UntaggedResponse::Status { mailbox, items }
            }
            _ => {
                lexer.eat(b' ');
                UntaggedResponse::Other {
                    keyword: upper,
                    text: lexer.read_text(),
                }
            }
        };
        Ok(data)
    }

    fn parse_message_data(lexer: &mut Lexer<'_>, n: u32) -> Result<UntaggedResponse> {
        lexer.expect_space()?;
        let keyword = lexer.read_atom_string()?.to_ascii_uppercase();
        let seq = SeqNum::new(n);

        let data = match keyword.as_str() {
            "EXISTS" => UntaggedResponse::Exists(n),
            "RECENT" => UntaggedResponse::Recent(n),
            "EXPUNGE" => {
                UntaggedResponse::Expunge(seq.ok_or_else(|| lexer.error("Message number 0"))?)
            }
            "FETCH" => {
                let seq = seq.ok_or_else(|| lexer.error("Message number 0"))?;
                lexer.expect_space()?;
                let items = fetch::parse_fetch_response(lexer)?;
                UntaggedResponse::Fetch { seq, items }
            }
            _ => {
                lexer.eat(b' ');
                UntaggedResponse::Other {
                    text: format!("{n} {}", lexer.read_text()),
                    keyword,
                }
            }
        };
        Ok(data)
    }

    /// Parses `[code] text` after a status word. The space before the text
    /// is optional because some servers omit it on empty text.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        lexer.eat(b' ');
        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };
        lexer.eat(b' ');
        Ok((code, lexer.read_text()))
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
    use crate::types::{Capability, Flag, MailboxAttribute, ResponseCode};

    use super::*;

    #[test]
    fn test_parse_greeting() {
        let response =
            ResponseParser::parse(b"* OK [CAPABILITY IMAP4rev1 LITERAL+ SORT] ready\r\n").unwrap();
        match response {
            Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::Capability(caps)),
                text,
            }) => {
                assert!(caps.contains(&Capability::LiteralPlus));
                assert!(caps.contains(&Capability::Sort));
                assert_eq!(text, "ready");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_no_with_code() {
        let response =
            ResponseParser::parse(b"A0002 NO [NONEXISTENT] Unknown mailbox\r\n").unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: Tag::new("A0002"),
                status: Status::No,
                code: Some(ResponseCode::NonExistent),
                text: "Unknown mailbox".to_string(),
            }
        );
    }

    #[test]
    fn test_tagged_preauth_is_invalid() {
        assert!(ResponseParser::parse(b"A1 PREAUTH hi\r\n").is_err());
    }

    #[test]
    fn test_parse_exists_and_expunge() {
        assert_eq!(
            ResponseParser::parse(b"* 23 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(23))
        );
        assert_eq!(
            ResponseParser::parse(b"* 4 EXPUNGE\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Expunge(SeqNum::new(4).unwrap()))
        );
        assert!(ResponseParser::parse(b"* 0 EXPUNGE\r\n").is_err());
    }

    #[test]
    fn test_parse_flags_and_permanent_flags() {
        let response =
            ResponseParser::parse(b"* FLAGS (\\Answered \\Seen $Forwarded)\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::Flags(flags)) = response else {
            panic!("expected FLAGS");
        };
        assert!(flags.contains(&Flag::Seen));
        assert!(flags.contains(&Flag::Keyword("$Forwarded".to_string())));

        let response =
            ResponseParser::parse(b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::Ok {
            code: Some(ResponseCode::PermanentFlags(flags)),
            ..
        }) = response
        else {
            panic!("expected PERMANENTFLAGS");
        };
        assert_eq!(flags, vec![Flag::Deleted, Flag::Seen, Flag::MayCreate]);
    }

    #[test]
    fn test_parse_list() {
        let response =
            ResponseParser::parse(b"* LIST (\\HasNoChildren) \"/\" \"Sent Items\"\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::List(list)) = response else {
            panic!("expected LIST");
        };
        assert!(list.attributes.contains(&MailboxAttribute::HasNoChildren));
        assert_eq!(list.delimiter, Some('/'));
        assert_eq!(list.mailbox.as_str(), "Sent Items");
    }

    #[test]
    fn test_parse_search_and_sort() {
        assert_eq!(
            ResponseParser::parse(b"* SEARCH 2 3 5\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(vec![2, 3, 5]))
        );
        assert_eq!(
            ResponseParser::parse(b"* SEARCH\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(vec![]))
        );
        assert_eq!(
            ResponseParser::parse(b"* SORT 9 1 4 \r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Sort(vec![9, 1, 4]))
        );
    }

    #[test]
    fn test_parse_status() {
        let response =
            ResponseParser::parse(b"* STATUS INBOX (MESSAGES 17 UNSEEN 3 UIDNEXT 90)\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::Status { mailbox, items }) = response else {
            panic!("expected STATUS");
        };
        assert_eq!(mailbox.as_str(), "INBOX");
        assert_eq!(items.len(), 3);
        assert!(items.contains(&StatusItem::Unseen(3)));
    }

    #[test]
    fn test_parse_continuation() {
        assert_eq!(
            ResponseParser::parse(b"+ Ready for literal\r\n").unwrap(),
            Response::Continuation {
                text: Some("Ready for literal".to_string())
            }
        );
        assert_eq!(
            ResponseParser::parse(b"+\r\n").unwrap(),
            Response::Continuation { text: None }
        );
    }

    #[test]
    fn test_unknown_data_is_kept() {
        assert_eq!(
            ResponseParser::parse(b"* ENABLED CONDSTORE\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Other {
                keyword: "ENABLED".to_string(),
                text: "CONDSTORE".to_string(),
            })
        );
    }

    #[test]
    fn test_bye() {
        let response = ResponseParser::parse(b"* BYE [ALERT] shutting down\r\n").unwrap();
        assert!(response.is_bye());
    }

    #[test]
    fn test_read_only_code() {
        let response = ResponseParser::parse(b"A3 OK [READ-ONLY] EXAMINE completed\r\n").unwrap();
        assert!(matches!(
            response,
            Response::Tagged {
                code: Some(ResponseCode::ReadOnly),
                ..
            }
        ));
    }
}
