//! Predicate and sort compilation into SEARCH/SORT commands.

use crate::command::{Command, CommandWriter};
use crate::{Error, Result};

use super::predicate::{Predicate, SearchKey};
use super::sort::SortSpec;

/// `date` format of RFC 3501 (`1-Feb-2024`).
pub const DATE_FORMAT: &str = "%-d-%b-%Y";

/// Compiles a predicate, and optionally a sort program, into one command.
///
/// An empty or absent sort spec yields SEARCH, anything else a single SORT.
/// SEARCH announces `CHARSET UTF-8` only when some string is non-ASCII; SORT
/// always names its charset.
///
/// # Errors
///
/// Returns [`Error::EmptyPredicate`] if the tree has no keys, or if an OR or
/// NOT operand is empty, and [`Error::InvalidKeyword`] if a keyword is not an
/// atom.
pub fn compile(predicate: &Predicate, sort: Option<&SortSpec>, uid: bool) -> Result<Command> {
    let criteria = predicate.normalized();
    if criteria.leaf_count() == 0 || criteria.has_empty_operand() {
        return Err(Error::EmptyPredicate);
    }
    if let Some(flag) = criteria.invalid_keyword() {
        return Err(Error::InvalidKeyword(flag.to_string()));
    }
    let ascii = criteria.is_ascii();

    let command = match sort.filter(|spec| !spec.is_empty()) {
        None => Command::Search {
            charset: (!ascii).then(|| "UTF-8".to_string()),
            criteria,
            uid,
        },
        Some(program) => Command::Sort {
            program: program.clone(),
            charset: if ascii { "US-ASCII" } else { "UTF-8" }.to_string(),
            criteria,
            uid,
        },
    };
    Ok(command)
}

/// Writes the criteria of a SEARCH or SORT command.
pub(crate) fn write_predicate(w: &mut CommandWriter, predicate: &Predicate) {
    match predicate {
        Predicate::Key(key) => write_key(w, key),
        Predicate::And(children) => {
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    w.sp();
                }
                write_predicate(w, child);
            }
        }
        Predicate::Or(left, right) => {
            w.raw("OR ");
            write_operand(w, left);
            w.sp();
            write_operand(w, right);
        }
        Predicate::Not(operand) => {
            w.raw("NOT ");
            write_operand(w, operand);
        }
    }
}

fn write_operand(w: &mut CommandWriter, operand: &Predicate) {
    match operand {
        Predicate::And(children) if children.len() != 1 => {
            w.raw("(");
            write_predicate(w, operand);
            w.raw(")");
        }
        _ => write_predicate(w, operand),
    }
}

fn write_key(w: &mut CommandWriter, key: &SearchKey) {
    let (name, text) = match key {
        SearchKey::All => return w.raw("ALL"),
        SearchKey::Answered => return w.raw("ANSWERED"),
        SearchKey::Deleted => return w.raw("DELETED"),
        SearchKey::Draft => return w.raw("DRAFT"),
        SearchKey::Flagged => return w.raw("FLAGGED"),
        SearchKey::New => return w.raw("NEW"),
        SearchKey::Old => return w.raw("OLD"),
        SearchKey::Recent => return w.raw("RECENT"),
        SearchKey::Seen => return w.raw("SEEN"),
        SearchKey::Unanswered => return w.raw("UNANSWERED"),
        SearchKey::Undeleted => return w.raw("UNDELETED"),
        SearchKey::Undraft => return w.raw("UNDRAFT"),
        SearchKey::Unflagged => return w.raw("UNFLAGGED"),
        SearchKey::Unseen => return w.raw("UNSEEN"),
        SearchKey::Keyword(flag) => {
            return w.raw(&format!("KEYWORD {flag}"));
        }
        SearchKey::Unkeyword(flag) => {
            return w.raw(&format!("UNKEYWORD {flag}"));
        }
        SearchKey::Header(field, value) => {
            w.raw("HEADER ");
            w.string(field);
            w.sp();
            return w.string(value);
        }
        SearchKey::Before(date) => return w.raw(&format!("BEFORE {}", date.format(DATE_FORMAT))),
        SearchKey::On(date) => return w.raw(&format!("ON {}", date.format(DATE_FORMAT))),
        SearchKey::Since(date) => return w.raw(&format!("SINCE {}", date.format(DATE_FORMAT))),
        SearchKey::SentBefore(date) => {
            return w.raw(&format!("SENTBEFORE {}", date.format(DATE_FORMAT)));
        }
        SearchKey::SentOn(date) => return w.raw(&format!("SENTON {}", date.format(DATE_FORMAT))),
        SearchKey::SentSince(date) => {
            return w.raw(&format!("SENTSINCE {}", date.format(DATE_FORMAT)));
        }
        SearchKey::Larger(n) => return w.raw(&format!("LARGER {n}")),
        SearchKey::Smaller(n) => return w.raw(&format!("SMALLER {n}")),
        SearchKey::Uid(set) => return w.raw(&format!("UID {set}")),
        SearchKey::Sequence(set) => return w.raw(&set.to_string()),
        SearchKey::Bcc(text) => ("BCC ", text),
        SearchKey::Body(text) => ("BODY ", text),
        SearchKey::Cc(text) => ("CC ", text),
        SearchKey::From(text) => ("FROM ", text),
        SearchKey::Subject(text) => ("SUBJECT ", text),
        SearchKey::Text(text) => ("TEXT ", text),
        SearchKey::To(text) => ("TO ", text),
    };
    w.raw(name);
    w.string(text);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::command::LiteralSupport;
    use crate::search::{SearchBuilder, SortKey};
    use crate::types::SequenceSet;

    fn line(command: &Command) -> String {
        String::from_utf8(command.serialize("A1")).unwrap()
    }

    #[test]
    fn empty_tree_is_rejected() {
        let err = compile(&SearchBuilder::new().build(), None, true).unwrap_err();
        assert!(matches!(err, Error::EmptyPredicate));
        let hollow = SearchBuilder::new().not(|b| b).build();
        assert!(matches!(compile(&hollow, None, true), Err(Error::EmptyPredicate)));
    }

    #[test]
    fn keywords_must_be_atoms() {
        for bad in ["two words", "", "\\Seen", "{5}", "caf\u{e9}"] {
            let p = SearchBuilder::new().keyword(bad).build();
            assert!(
                matches!(compile(&p, None, true), Err(Error::InvalidKeyword(flag)) if flag == bad),
                "{bad:?} was accepted"
            );
        }
        let nested = SearchBuilder::new().not(|b| b.unkeyword("Junk Mail")).build();
        assert!(matches!(compile(&nested, None, true), Err(Error::InvalidKeyword(_))));

        let p = SearchBuilder::new().unkeyword("$Junk").build();
        assert_eq!(
            line(&compile(&p, None, true).unwrap()),
            "A1 UID SEARCH UNKEYWORD $Junk\r\n"
        );
    }

    #[test]
    fn juxtaposition_or_not() {
        let p = SearchBuilder::new()
            .unseen()
            .or(|b| b.from("alice"), |b| b.from("bob"))
            .not(|b| b.deleted())
            .build();
        let cmd = compile(&p, None, false).unwrap();
        assert_eq!(
            line(&cmd),
            "A1 SEARCH UNSEEN OR FROM \"alice\" FROM \"bob\" NOT DELETED\r\n"
        );
    }

    #[test]
    fn and_inside_or_is_parenthesized() {
        let p = SearchBuilder::new()
            .or(|b| b.flagged().larger(5000), |b| b.subject("urgent"))
            .build();
        let cmd = compile(&p, None, true).unwrap();
        assert_eq!(
            line(&cmd),
            "A1 UID SEARCH OR (FLAGGED LARGER 5000) SUBJECT \"urgent\"\r\n"
        );
        let p = SearchBuilder::new().not(|b| b.seen().draft()).build();
        assert_eq!(
            line(&compile(&p, None, false).unwrap()),
            "A1 SEARCH NOT (SEEN DRAFT)\r\n"
        );
    }

    #[test]
    fn dates_sets_and_headers() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let p = SearchBuilder::new()
            .since(date)
            .sent_before(NaiveDate::from_ymd_opt(2024, 12, 25).unwrap())
            .uid(SequenceSet::range(10, 20).unwrap())
            .sequence(SequenceSet::RangeFrom(3))
            .header("X-Mailer", "")
            .keyword("$Work")
            .build();
        assert_eq!(
            line(&compile(&p, None, false).unwrap()),
            "A1 SEARCH SINCE 1-Feb-2024 SENTBEFORE 25-Dec-2024 UID 10:20 3:* HEADER \"X-Mailer\" \"\" KEYWORD $Work\r\n"
        );
    }

    #[test]
    fn non_ascii_search_announces_utf8() {
        let p = SearchBuilder::new().subject("Grüße").build();
        let cmd = compile(&p, None, true).unwrap();
        let Command::Search { charset, .. } = &cmd else {
            panic!("expected SEARCH");
        };
        assert_eq!(charset.as_deref(), Some("UTF-8"));
        let encoded = cmd.encode("A1", LiteralSupport::Synchronizing);
        assert!(encoded.needs_continuation());
        assert_eq!(
            encoded.to_bytes(),
            "A1 UID SEARCH CHARSET UTF-8 SUBJECT {7}\r\nGrüße\r\n".as_bytes()
        );
    }

    #[test]
    fn sort_always_names_charset() {
        let spec = SortSpec::new().descending(SortKey::Arrival);
        let p = SearchBuilder::new().subject("invoice").build();
        let cmd = compile(&p, Some(&spec), true).unwrap();
        assert_eq!(
            line(&cmd),
            "A1 UID SORT (REVERSE ARRIVAL) US-ASCII SUBJECT \"invoice\"\r\n"
        );

        let p = SearchBuilder::new().from("Zoë").build();
        let Command::Sort { charset, .. } = compile(&p, Some(&spec), true).unwrap() else {
            panic!("expected SORT");
        };
        assert_eq!(charset, "UTF-8");
    }

    #[test]
    fn empty_sort_spec_falls_back_to_search() {
        let p = SearchBuilder::new().all().build();
        let cmd = compile(&p, Some(&SortSpec::new()), false).unwrap();
        assert!(matches!(cmd, Command::Search { .. }));
    }
}
