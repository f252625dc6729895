//! Reference parser for the SEARCH key grammar.
//!
//! Reads the criteria of a SEARCH or SORT command back into a [`Predicate`].
//! Servers never send this grammar, so the engine itself does not need it;
//! it exists to check what [`compile`](super::compile) writes and to accept
//! criteria typed by hand.

use chrono::NaiveDate;

use crate::parser::{Lexer, Token};
use crate::types::{SequenceSet, Tag};
use crate::Result;

use super::predicate::{Predicate, SearchKey};
use super::sort::{SortDirection, SortKey, SortSpec};

/// Date format accepted by the parser. Single-digit days are accepted too.
const DATE_PARSE_FORMAT: &str = "%d-%b-%Y";

/// A SEARCH or SORT command read back from its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// The command was prefixed with `UID`.
    pub uid: bool,
    /// Sort program, present for SORT.
    pub sort: Option<SortSpec>,
    /// Announced charset.
    pub charset: Option<String>,
    /// Search criteria, normalized.
    pub criteria: Predicate,
}

/// Parses search criteria such as `UNSEEN OR FROM "a" FROM "b"`.
///
/// Several keys at top level are an AND. The result is normalized.
///
/// # Errors
///
/// Returns [`Error::Parse`] for unknown keys or malformed arguments.
pub fn parse_criteria(input: &[u8]) -> Result<Predicate> {
    let mut lexer = Lexer::new(input);
    let criteria = parse_top_level(&mut lexer)?;
    Ok(criteria)
}

/// Parses a complete `tag [UID] SEARCH|SORT ...` command line.
///
/// Literals must be inline, as produced by
/// [`Command::serialize`](crate::command::Command::serialize).
///
/// # Errors
///
/// Returns [`Error::Parse`] if the line is not a SEARCH or SORT command.
pub fn parse_command(input: &[u8]) -> Result<(Tag, ParsedQuery)> {
    let mut lexer = Lexer::new(input);
    let tag = Tag::new(lexer.read_atom_string()?);
    lexer.expect_space()?;

    let mut name = lexer.read_atom_string()?;
    let uid = name.eq_ignore_ascii_case("UID");
    if uid {
        lexer.expect_space()?;
        name = lexer.read_atom_string()?;
    }
    lexer.expect_space()?;

    let (sort, charset) = match name.to_ascii_uppercase().as_str() {
        "SEARCH" => {
            let mut charset = None;
            if starts_with_keyword(&lexer, "CHARSET ") {
                lexer.read_atom_string()?;
                lexer.expect_space()?;
                charset = Some(lexer.read_astring()?);
                lexer.expect_space()?;
            }
            (None, charset)
        }
        "SORT" => {
            let program = parse_sort_program(&mut lexer)?;
            lexer.expect_space()?;
            let charset = lexer.read_astring()?;
            lexer.expect_space()?;
            (Some(program), Some(charset))
        }
        other => return Err(lexer.error(&format!("Not a SEARCH or SORT command: {other}"))),
    };

    let criteria = parse_top_level(&mut lexer)?;
    Ok((
        tag,
        ParsedQuery {
            uid,
            sort,
            charset,
            criteria,
        },
    ))
}

fn starts_with_keyword(lexer: &Lexer<'_>, keyword: &str) -> bool {
    lexer
        .remaining()
        .get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword.as_bytes()))
}

fn parse_sort_program(lexer: &mut Lexer<'_>) -> Result<SortSpec> {
    lexer.expect(Token::LParen)?;
    let mut spec = SortSpec::new();
    let mut direction = SortDirection::Ascending;
    loop {
        let word = lexer.read_atom_string()?;
        if word.eq_ignore_ascii_case("REVERSE") {
            direction = SortDirection::Descending;
        } else {
            let key = SortKey::parse(word)
                .ok_or_else(|| lexer.error(&format!("Unknown sort key: {word}")))?;
            spec = spec.then(key, direction);
            direction = SortDirection::Ascending;
        }
        match lexer.next_token()? {
            Token::Space => {}
            Token::RParen if direction == SortDirection::Ascending => break,
            token => return Err(lexer.error(&format!("Unexpected {token:?} in sort program"))),
        }
    }
    if spec.is_empty() {
        return Err(lexer.error("Empty sort program"));
    }
    Ok(spec)
}

fn parse_top_level(lexer: &mut Lexer<'_>) -> Result<Predicate> {
    let keys = parse_key_list(lexer)?;
    match lexer.next_token()? {
        Token::Eof | Token::Crlf => {}
        token => return Err(lexer.error(&format!("Unexpected {token:?} after criteria"))),
    }
    Ok(group(keys).normalized())
}

fn parse_key_list(lexer: &mut Lexer<'_>) -> Result<Vec<Predicate>> {
    let mut keys = vec![parse_key(lexer)?];
    while lexer.eat(b' ') {
        keys.push(parse_key(lexer)?);
    }
    Ok(keys)
}

fn group(mut keys: Vec<Predicate>) -> Predicate {
    if keys.len() == 1 {
        keys.remove(0)
    } else {
        Predicate::And(keys)
    }
}

fn parse_key(lexer: &mut Lexer<'_>) -> Result<Predicate> {
    match lexer.peek() {
        Some(b'(') => {
            lexer.advance();
            let keys = parse_key_list(lexer)?;
            lexer.expect(Token::RParen)?;
            return Ok(group(keys));
        }
        Some(b) if b.is_ascii_digit() || b == b'*' => {
            return parse_set(lexer).map(|set| Predicate::Key(SearchKey::Sequence(set)));
        }
        _ => {}
    }

    let word = lexer.read_atom_string()?.to_ascii_uppercase();
    let key = match word.as_str() {
        "ALL" => SearchKey::All,
        "ANSWERED" => SearchKey::Answered,
        "DELETED" => SearchKey::Deleted,
        "DRAFT" => SearchKey::Draft,
        "FLAGGED" => SearchKey::Flagged,
        "NEW" => SearchKey::New,
        "OLD" => SearchKey::Old,
        "RECENT" => SearchKey::Recent,
        "SEEN" => SearchKey::Seen,
        "UNANSWERED" => SearchKey::Unanswered,
        "UNDELETED" => SearchKey::Undeleted,
        "UNDRAFT" => SearchKey::Undraft,
        "UNFLAGGED" => SearchKey::Unflagged,
        "UNSEEN" => SearchKey::Unseen,
        "KEYWORD" => SearchKey::Keyword(argument(lexer)?),
        "UNKEYWORD" => SearchKey::Unkeyword(argument(lexer)?),
        "BCC" => SearchKey::Bcc(argument(lexer)?),
        "BODY" => SearchKey::Body(argument(lexer)?),
        "CC" => SearchKey::Cc(argument(lexer)?),
        "FROM" => SearchKey::From(argument(lexer)?),
        "SUBJECT" => SearchKey::Subject(argument(lexer)?),
        "TEXT" => SearchKey::Text(argument(lexer)?),
        "TO" => SearchKey::To(argument(lexer)?),
        "HEADER" => {
            let field = argument(lexer)?;
            SearchKey::Header(field, argument(lexer)?)
        }
        "BEFORE" => SearchKey::Before(date(lexer)?),
        "ON" => SearchKey::On(date(lexer)?),
        "SINCE" => SearchKey::Since(date(lexer)?),
        "SENTBEFORE" => SearchKey::SentBefore(date(lexer)?),
        "SENTON" => SearchKey::SentOn(date(lexer)?),
        "SENTSINCE" => SearchKey::SentSince(date(lexer)?),
        "LARGER" => {
            lexer.expect_space()?;
            SearchKey::Larger(lexer.read_number()?)
        }
        "SMALLER" => {
            lexer.expect_space()?;
            SearchKey::Smaller(lexer.read_number()?)
        }
        "UID" => {
            lexer.expect_space()?;
            SearchKey::Uid(parse_set(lexer)?)
        }
        "OR" => {
            lexer.expect_space()?;
            let left = parse_key(lexer)?;
            lexer.expect_space()?;
            let right = parse_key(lexer)?;
            return Ok(Predicate::or(left, right));
        }
        "NOT" => {
            lexer.expect_space()?;
            return Ok(Predicate::negate(parse_key(lexer)?));
        }
        other => return Err(lexer.error(&format!("Unknown search key: {other}"))),
    };
    Ok(Predicate::Key(key))
}

fn argument(lexer: &mut Lexer<'_>) -> Result<String> {
    lexer.expect_space()?;
    lexer.read_astring()
}

fn date(lexer: &mut Lexer<'_>) -> Result<NaiveDate> {
    let text = argument(lexer)?;
    NaiveDate::parse_from_str(&text, DATE_PARSE_FORMAT)
        .map_err(|e| lexer.error(&format!("Invalid date {text:?}: {e}")))
}

fn parse_set(lexer: &mut Lexer<'_>) -> Result<SequenceSet> {
    let raw = lexer.take_while(|b| b.is_ascii_digit() || matches!(b, b':' | b',' | b'*'));
    std::str::from_utf8(raw)
        .ok()
        .and_then(SequenceSet::parse)
        .ok_or_else(|| {
            lexer.error(&format!(
                "Invalid sequence set: {}",
                String::from_utf8_lossy(raw)
            ))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::needless_collect)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::search::{compile, SearchBuilder};

    #[test]
    fn parses_flat_criteria() {
        let p = parse_criteria(b"UNSEEN FROM alice LARGER 100").unwrap();
        assert_eq!(
            p,
            Predicate::And(vec![
                SearchKey::Unseen.into(),
                SearchKey::From("alice".into()).into(),
                SearchKey::Larger(100).into(),
            ])
        );
    }

    #[test]
    fn parses_nested_combinators() {
        let p = parse_criteria(b"or (flagged larger 5000) not subject \"a b\"").unwrap();
        assert_eq!(
            p,
            Predicate::or(
                Predicate::And(vec![SearchKey::Flagged.into(), SearchKey::Larger(5000).into()]),
                Predicate::negate(SearchKey::Subject("a b".into()).into()),
            )
        );
    }

    #[test]
    fn parses_sets_and_dates() {
        let p = parse_criteria(b"1:3,7 UID 10:* SINCE 1-Feb-2024 ON \"15-Mar-2023\"").unwrap();
        let Predicate::And(keys) = p else {
            panic!("expected AND");
        };
        assert_eq!(keys[0], SearchKey::Sequence(SequenceSet::parse("1:3,7").unwrap()).into());
        assert_eq!(keys[1], SearchKey::Uid(SequenceSet::RangeFrom(10)).into());
        assert_eq!(
            keys[2],
            SearchKey::Since(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()).into()
        );
        assert_eq!(
            keys[3],
            SearchKey::On(NaiveDate::from_ymd_opt(2023, 3, 15).unwrap()).into()
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_criteria(b"").is_err());
        assert!(parse_criteria(b"FROBNICATE").is_err());
        assert!(parse_criteria(b"OR SEEN").is_err());
        assert!(parse_criteria(b"(SEEN").is_err());
        assert!(parse_criteria(b"SINCE yesterday").is_err());
        assert!(parse_criteria(b"0:4").is_err());
    }

    #[test]
    fn parses_sort_command_with_literal() {
        let line = b"A7 UID SORT (REVERSE ARRIVAL SUBJECT) UTF-8 SUBJECT {5}\r\nCaf\xc3\xa9\r\n";
        let (tag, query) = parse_command(line).unwrap();
        assert_eq!(tag.as_str(), "A7");
        assert!(query.uid);
        assert_eq!(
            query.sort,
            Some(
                SortSpec::new()
                    .descending(SortKey::Arrival)
                    .ascending(SortKey::Subject)
            )
        );
        assert_eq!(query.charset.as_deref(), Some("UTF-8"));
        assert_eq!(query.criteria, SearchKey::Subject("Café".into()).into());
    }

    #[test]
    fn parses_search_command_with_charset() {
        let (_, query) = parse_command(b"A1 SEARCH CHARSET UTF-8 ALL\r\n").unwrap();
        assert!(!query.uid);
        assert_eq!(query.sort, None);
        assert_eq!(query.charset.as_deref(), Some("UTF-8"));
        assert_eq!(query.criteria, SearchKey::All.into());
        assert!(parse_command(b"A1 FETCH 1 FLAGS\r\n").is_err());
    }

    #[test]
    fn compiled_builder_output_reads_back() {
        let p = SearchBuilder::new()
            .unseen()
            .or(|b| b.from("alice"), |b| b.from("bob"))
            .not(|b| b.deleted())
            .build();
        let cmd = compile(&p, None, true).unwrap();
        let (_, query) = parse_command(&cmd.serialize("A1")).unwrap();
        assert_eq!(query.criteria, p.normalized());
    }

    fn text() -> impl Strategy<Value = String> {
        prop_oneof![
            "[ -~]{0,12}",
            "\\PC{1,6}",
            Just("line\r\nbreak".to_string()),
        ]
    }

    fn set() -> impl Strategy<Value = SequenceSet> {
        prop_oneof![
            prop::collection::vec(1u32..200, 1..6)
                .prop_map(|numbers| SequenceSet::compress(numbers).unwrap()),
            (1u32..50).prop_map(SequenceSet::RangeFrom),
            Just(SequenceSet::Last),
        ]
    }

    fn date() -> impl Strategy<Value = NaiveDate> {
        (1970i32..2100, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn key() -> impl Strategy<Value = SearchKey> {
        prop_oneof![
            Just(SearchKey::All),
            Just(SearchKey::Answered),
            Just(SearchKey::Deleted),
            Just(SearchKey::New),
            Just(SearchKey::Unseen),
            Just(SearchKey::Undraft),
            "\\$?[A-Za-z]{1,8}".prop_map(SearchKey::Keyword),
            "[A-Za-z]{1,8}".prop_map(SearchKey::Unkeyword),
            text().prop_map(SearchKey::From),
            text().prop_map(SearchKey::Subject),
            text().prop_map(SearchKey::Body),
            ("[A-Za-z-]{1,10}", text()).prop_map(|(f, v)| SearchKey::Header(f, v)),
            date().prop_map(SearchKey::Since),
            date().prop_map(SearchKey::SentBefore),
            any::<u32>().prop_map(SearchKey::Larger),
            set().prop_map(SearchKey::Uid),
            set().prop_map(SearchKey::Sequence),
        ]
    }

    fn predicate() -> impl Strategy<Value = Predicate> {
        key().prop_map(Predicate::Key).prop_recursive(4, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(Predicate::And),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| Predicate::or(l, r)),
                inner.prop_map(Predicate::negate),
            ]
        })
    }

    proptest! {
        #[test]
        fn compile_then_parse_round_trips(p in predicate(), uid in any::<bool>()) {
            let cmd = compile(&p, None, uid).unwrap();
            let (_, query) = parse_command(&cmd.serialize("A1")).unwrap();
            prop_assert_eq!(query.uid, uid);
            prop_assert_eq!(query.criteria, p.normalized());
        }

        #[test]
        fn sorted_compile_round_trips(p in predicate(), reverse in any::<bool>()) {
            let spec = if reverse {
                SortSpec::new().descending(SortKey::Date)
            } else {
                SortSpec::new().ascending(SortKey::Size).descending(SortKey::From)
            };
            let cmd = compile(&p, Some(&spec), true).unwrap();
            let (_, query) = parse_command(&cmd.serialize("A1")).unwrap();
            prop_assert_eq!(query.sort, Some(spec));
            prop_assert_eq!(query.criteria, p.normalized());
        }
    }
}
