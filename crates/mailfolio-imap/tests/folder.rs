//! Folder session scenarios against a scripted server.

mod common;

use common::{MockServer, PREAUTH, Step, connect, select_inbox};
use mailfolio_imap::search::{Predicate, SearchBuilder, SortKey, SortSpec};
use mailfolio_imap::types::Flag;
use mailfolio_imap::{
    AccessMode, Error, MessageCounts, PrefetchItem, PrefetchProfile, Status, StoreAction,
};

#[tokio::test]
async fn test_search_sorted_newest_first() {
    let mut script = select_inbox("* 5 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 UID SORT (REVERSE ARRIVAL) US-ASCII SUBJECT \"invoice\"\r\n"),
        Step::Send("* SORT 17 12 4\r\nA0002 OK Sort completed\r\n"),
        Step::Expect("A0003 UID FETCH 4,12,17 (UID FLAGS)\r\n"),
        Step::Send(
            "* 1 FETCH (UID 4 FLAGS ())\r\n\
             * 3 FETCH (UID 12 FLAGS (\\Seen))\r\n\
             * 5 FETCH (UID 17 FLAGS ())\r\n\
             A0003 OK Fetch completed\r\n",
        ),
    ]);
    let (server, conn) = connect(script).await;

    let inbox = conn.select("INBOX").await.unwrap();
    assert_eq!(inbox.mode(), AccessMode::ReadWrite);
    assert_eq!(inbox.uid_validity().unwrap().get(), 3_857_529_045);

    let predicate = SearchBuilder::new().subject("invoice").build();
    let newest_first = SortSpec::new().descending(SortKey::Arrival);
    let records = inbox.search(&predicate, Some(&newest_first)).await.unwrap();

    let uids: Vec<u32> = records.iter().map(|r| r.uid().unwrap().get()).collect();
    assert_eq!(uids, vec![17, 12, 4]);
    let seqs: Vec<u32> = records.iter().map(|r| r.seq().get()).collect();
    assert_eq!(seqs, vec![5, 3, 1]);
    assert!(records[1].flags().unwrap().contains(&Flag::Seen));
    server.finish().await;
}

#[tokio::test]
async fn test_search_without_matches_is_empty() {
    let mut script = select_inbox("* 5 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 UID SEARCH FLAGGED\r\n"),
        Step::Send("* SEARCH\r\nA0002 OK Search completed\r\n"),
    ]);
    let (server, conn) = connect(script).await;
    let inbox = conn.select("INBOX").await.unwrap();

    let records = inbox
        .search(&SearchBuilder::new().flagged().build(), None)
        .await
        .unwrap();
    assert!(records.is_empty());
    server.finish().await;
}

#[tokio::test]
async fn test_empty_predicate_is_rejected_locally() {
    let (server, conn) = connect(select_inbox("* 5 EXISTS\r\n")).await;
    let inbox = conn.select("INBOX").await.unwrap();

    let err = inbox.search(&Predicate::And(vec![]), None).await.unwrap_err();
    assert!(matches!(err, Error::EmptyPredicate));
    let err = inbox
        .search(&SearchBuilder::new().build(), Some(&SortSpec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyPredicate));
    server.finish().await;
}

#[tokio::test]
async fn test_sort_needs_capability() {
    let (server, conn) = connect(vec![
        Step::Send("* PREAUTH [CAPABILITY IMAP4rev1] ready\r\n"),
        Step::Expect("A0001 EXAMINE INBOX\r\n"),
        Step::Send("* 2 EXISTS\r\nA0001 OK [READ-ONLY] EXAMINE completed\r\n"),
    ])
    .await;
    let inbox = conn.examine("INBOX").await.unwrap();
    assert_eq!(inbox.mode(), AccessMode::ReadOnly);

    let err = inbox
        .search(
            &SearchBuilder::new().all().build(),
            Some(&SortSpec::new().ascending(SortKey::Subject)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(name) if name == "SORT"));
    server.finish().await;
}

#[tokio::test]
async fn test_envelope_profile_fetch_range() {
    let mut script = select_inbox("* 5 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 FETCH 1:5 (UID FLAGS ENVELOPE)\r\n"),
        Step::Send(
            "* 1 FETCH (UID 101 FLAGS () ENVELOPE (NIL \"one\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n\
             * 2 FETCH (UID 102 FLAGS () ENVELOPE (NIL \"two\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n\
             * 3 FETCH (UID 103 FLAGS () ENVELOPE (NIL \"three\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n\
             * 4 FETCH (UID 104 FLAGS () ENVELOPE (NIL \"four\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n\
             * 5 FETCH (UID 105 FLAGS () ENVELOPE (NIL \"five\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n\
             A0002 OK Fetch completed\r\n",
        ),
    ]);
    let (server, conn) = connect(script).await;
    let mut inbox = conn.select("INBOX").await.unwrap();
    inbox.set_prefetch_profile(PrefetchProfile::new().with(PrefetchItem::Envelope));

    let records = inbox.fetch_range(1, 5, true).await.unwrap();
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.seq().get() as usize, i + 1);
        assert!(record.envelope().is_ok());
        assert!(record.is_complete());
        assert!(matches!(record.body("TEXT"), Err(Error::NotFetched { .. })));
        assert!(matches!(record.body_structure(), Err(Error::NotFetched { .. })));
    }
    assert_eq!(records[2].envelope().unwrap().subject.as_deref(), Some("three"));
    server.finish().await;
}

#[tokio::test]
async fn test_fetch_range_bounds() {
    let (server, conn) = connect(select_inbox("* 5 EXISTS\r\n")).await;
    let inbox = conn.select("INBOX").await.unwrap();

    for (low, high) in [(0, 1), (3, 2), (4, 6)] {
        let err = inbox.fetch_range(low, high, false).await.unwrap_err();
        assert!(
            matches!(err, Error::InvalidRange { exists: 5, .. }),
            "{low}:{high} gave {err:?}"
        );
    }
    server.finish().await;
}

#[tokio::test]
async fn test_omitted_attributes_do_not_fail_the_batch() {
    let mut script = select_inbox("* 3 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 FETCH 1:3 (UID FLAGS RFC822.SIZE)\r\n"),
        Step::Send(
            "* 1 FETCH (UID 7 FLAGS () RFC822.SIZE 1200)\r\n\
             * 3 FETCH (UID 9 FLAGS ())\r\n\
             A0002 OK Fetch completed\r\n",
        ),
    ]);
    let (server, conn) = connect(script).await;
    let mut inbox = conn.select("INBOX").await.unwrap();
    inbox.add_prefetch_items([PrefetchItem::Size]);

    let records = inbox.fetch_range(1, 3, true).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].size().unwrap(), 1200);
    assert!(matches!(records[1].uid(), Err(Error::PartialFetch { seq: 2, .. })));
    assert_eq!(records[2].missing(), vec!["RFC822.SIZE"]);
    assert_eq!(records[2].partial_errors().len(), 1);
    server.finish().await;
}

#[tokio::test]
async fn test_bad_search_keeps_connection_usable() {
    let mut script = select_inbox("* 5 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 UID SEARCH UNSEEN\r\n"),
        Step::Send("A0002 BAD Could not parse command\r\n"),
        Step::Expect("A0003 NOOP\r\n"),
        Step::Send("A0003 OK NOOP completed\r\n"),
    ]);
    let (server, conn) = connect(script).await;
    let inbox = conn.select("INBOX").await.unwrap();

    let err = inbox
        .search(&SearchBuilder::new().unseen().build(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Rejected { status: Status::Bad, ref text, .. } if text == "Could not parse command"
    ));
    assert!(!err.is_fatal());
    assert!(conn.is_usable());
    assert!(inbox.is_valid());

    conn.noop().await.unwrap();
    server.finish().await;
}

#[tokio::test]
async fn test_expunge_returns_removed_and_invalidates_numbers() {
    let mut script = select_inbox("* 3 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 FETCH 1:3 (UID FLAGS)\r\n"),
        Step::Send(
            "* 1 FETCH (UID 11 FLAGS (\\Deleted))\r\n\
             * 2 FETCH (UID 12 FLAGS (\\Deleted))\r\n\
             * 3 FETCH (UID 13 FLAGS ())\r\n\
             A0002 OK Fetch completed\r\n",
        ),
        Step::Expect("A0003 UID SEARCH DELETED\r\n"),
        Step::Send("* SEARCH 11 12\r\nA0003 OK Search completed\r\n"),
        Step::Expect("A0004 UID FETCH 11:12 (UID FLAGS)\r\n"),
        Step::Send(
            "* 1 FETCH (UID 11 FLAGS (\\Deleted))\r\n\
             * 2 FETCH (UID 12 FLAGS (\\Deleted))\r\n\
             A0004 OK Fetch completed\r\n",
        ),
        Step::Expect("A0005 EXPUNGE\r\n"),
        Step::Send("* 1 EXPUNGE\r\n* 1 EXPUNGE\r\nA0005 OK Expunge completed\r\n"),
        Step::Expect("A0006 UID SEARCH UID 11:12\r\n"),
        Step::Send("* SEARCH\r\nA0006 OK Search completed\r\n"),
        Step::Expect("A0007 UID FETCH 13 (UID FLAGS)\r\n"),
        Step::Send("* 1 FETCH (UID 13 FLAGS ())\r\nA0007 OK Fetch completed\r\n"),
        Step::Expect("A0008 UID FETCH 11 (UID FLAGS)\r\n"),
        Step::Send("A0008 OK Fetch completed\r\n"),
    ]);
    let (server, conn) = connect(script).await;
    let inbox = conn.select("INBOX").await.unwrap();

    let before = inbox.fetch_range(1, 3, false).await.unwrap();
    let removed = inbox.expunge().await.unwrap();

    let uids: Vec<u32> = removed.iter().map(|r| r.uid().unwrap().get()).collect();
    assert_eq!(uids, vec![11, 12]);
    assert!(removed.iter().all(|r| r.is_expunged()));
    assert!(conn.snapshot().epoch > before[0].epoch());

    // Sequence number 3 no longer exists.
    assert!(matches!(
        inbox.fetch_range(3, 3, false).await,
        Err(Error::InvalidRange { exists: 1, .. })
    ));

    // The survivor moved from 3 to 1; re-validate by UID.
    let survivor = inbox.refresh(&before[2]).await.unwrap().unwrap();
    assert_eq!(survivor.seq().get(), 1);
    assert_eq!(survivor.uid().unwrap().get(), 13);
    assert!(inbox.refresh(&before[0]).await.unwrap().is_none());
    server.finish().await;
}

#[tokio::test]
async fn test_expunge_survives_concurrent_removal() {
    let mut script = select_inbox("* 4 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 UID SEARCH DELETED\r\n"),
        Step::Send("* SEARCH 12 14\r\nA0002 OK Search completed\r\n"),
        Step::Expect("A0003 UID FETCH 12,14 (UID FLAGS)\r\n"),
        // Another client removes message 1 while the fetch is answered.
        Step::Send(
            "* 2 FETCH (UID 12 FLAGS (\\Deleted))\r\n\
             * 4 FETCH (UID 14 FLAGS (\\Deleted))\r\n\
             * 1 EXPUNGE\r\n\
             A0003 OK Fetch completed\r\n",
        ),
        Step::Expect("A0004 EXPUNGE\r\n"),
        Step::Send("* 1 EXPUNGE\r\n* 2 EXPUNGE\r\nA0004 OK Expunge completed\r\n"),
        Step::Expect("A0005 UID SEARCH UID 12,14\r\n"),
        Step::Send("* SEARCH\r\nA0005 OK Search completed\r\n"),
    ]);
    let (server, conn) = connect(script).await;
    let inbox = conn.select("INBOX").await.unwrap();

    let removed = inbox.expunge().await.unwrap();
    let uids: Vec<u32> = removed.iter().map(|r| r.uid().unwrap().get()).collect();
    assert_eq!(uids, vec![12, 14]);
    assert!(removed.iter().all(|r| r.is_expunged()));
    assert_eq!(conn.snapshot().mailbox.unwrap().exists, 1);
    server.finish().await;
}

#[tokio::test]
async fn test_expunge_keeps_messages_the_server_did_not_remove() {
    let mut script = select_inbox("* 3 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 UID SEARCH DELETED\r\n"),
        Step::Send("* SEARCH 21 22\r\nA0002 OK Search completed\r\n"),
        Step::Expect("A0003 UID FETCH 21:22 (UID FLAGS)\r\n"),
        Step::Send(
            "* 1 FETCH (UID 21 FLAGS (\\Deleted))\r\n\
             * 2 FETCH (UID 22 FLAGS (\\Deleted))\r\n\
             A0003 OK Fetch completed\r\n",
        ),
        Step::Expect("A0004 EXPUNGE\r\n"),
        Step::Send("* 1 EXPUNGE\r\nA0004 OK Expunge completed\r\n"),
        Step::Expect("A0005 UID SEARCH UID 21:22\r\n"),
        Step::Send("* SEARCH 22\r\nA0005 OK Search completed\r\n"),
    ]);
    let (server, conn) = connect(script).await;
    let inbox = conn.select("INBOX").await.unwrap();

    let removed = inbox.expunge().await.unwrap();
    let uids: Vec<u32> = removed.iter().map(|r| r.uid().unwrap().get()).collect();
    assert_eq!(uids, vec![21]);
    server.finish().await;
}

#[tokio::test]
async fn test_read_only_folder_refuses_changes() {
    let (server, conn) = connect(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 SELECT Shared\r\n"),
        Step::Send("* 2 EXISTS\r\nA0001 OK [READ-ONLY] SELECT completed\r\n"),
    ])
    .await;
    let folder = conn.select("Shared").await.unwrap();
    assert_eq!(folder.mode(), AccessMode::ReadOnly);

    let err = folder.expunge().await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    let err = folder
        .store_flags(&[], StoreAction::Add(vec![Flag::Seen]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    server.finish().await;
}

#[tokio::test]
async fn test_store_flags_returns_updated_records() {
    let mut script = select_inbox("* 2 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 FETCH 1:2 (UID FLAGS)\r\n"),
        Step::Send(
            "* 1 FETCH (UID 21 FLAGS ())\r\n\
             * 2 FETCH (UID 22 FLAGS ())\r\n\
             A0002 OK Fetch completed\r\n",
        ),
        Step::Expect("A0003 UID STORE 21:22 +FLAGS (\\Flagged)\r\n"),
        Step::Send(
            "* 1 FETCH (UID 21 FLAGS (\\Flagged))\r\n\
             * 2 FETCH (UID 22 FLAGS (\\Flagged))\r\n\
             A0003 OK Store completed\r\n",
        ),
    ]);
    let (server, conn) = connect(script).await;
    let inbox = conn.select("INBOX").await.unwrap();

    let records = inbox.fetch_range(1, 2, false).await.unwrap();
    let updated = inbox
        .store_flags(&records, StoreAction::Add(vec![Flag::Flagged]))
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);
    assert!(updated.iter().all(|r| r.flags().unwrap().contains(&Flag::Flagged)));
    assert!(records.iter().all(|r| !r.flags().unwrap().contains(&Flag::Flagged)));
    server.finish().await;
}

#[tokio::test]
async fn test_reselect_invalidates_old_folder() {
    let mut script = select_inbox("* 5 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 SELECT Archive\r\n"),
        Step::Send("* 9 EXISTS\r\nA0002 OK [READ-WRITE] SELECT completed\r\n"),
        Step::Expect("A0003 SEARCH UNSEEN\r\n"),
        Step::Send("* SEARCH\r\nA0003 OK Search completed\r\n"),
    ]);
    let (server, conn) = connect(script).await;
    let inbox = conn.select("INBOX").await.unwrap();
    let archive = conn.select("Archive").await.unwrap();

    assert!(!inbox.is_valid());
    assert!(archive.is_valid());
    assert!(matches!(inbox.counts().await, Err(Error::InvalidState { .. })));
    assert!(matches!(
        inbox.fetch_range(1, 1, false).await,
        Err(Error::InvalidState { .. })
    ));

    let counts = archive.counts().await.unwrap();
    assert_eq!(counts.total, 9);
    assert_eq!(counts.unread, 0);
    server.finish().await;
}

#[tokio::test]
async fn test_counts_are_idempotent() {
    let (server, conn) = connect(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 SELECT INBOX\r\n"),
        Step::Send("* 4 EXISTS\r\n* 1 RECENT\r\nA0001 OK [READ-WRITE] SELECT completed\r\n"),
        Step::Expect("A0002 SEARCH UNSEEN\r\n"),
        Step::Send("* SEARCH 2 4\r\nA0002 OK Search completed\r\n"),
        Step::Expect("A0003 SEARCH UNSEEN\r\n"),
        Step::Send("* SEARCH 2 4\r\nA0003 OK Search completed\r\n"),
    ])
    .await;
    let inbox = conn.select("INBOX").await.unwrap();

    let first = inbox.counts().await.unwrap();
    let second = inbox.counts().await.unwrap();
    assert_eq!(
        first,
        MessageCounts {
            total: 4,
            unread: 2,
            new: 1
        }
    );
    assert_eq!(first, second);
    server.finish().await;
}

#[tokio::test]
async fn test_select_errors() {
    let (server, conn) = connect(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 SELECT Nope\r\n"),
        Step::Send("A0001 NO [NONEXISTENT] Unknown mailbox\r\n"),
        Step::Expect("A0002 EXAMINE Secret\r\n"),
        Step::Send("A0002 NO [NOPERM] Access denied\r\n"),
        Step::Expect("A0003 SELECT Broken\r\n"),
        Step::Send("A0003 NO Mailbox is locked\r\n"),
    ])
    .await;

    assert!(matches!(
        conn.select("Nope").await,
        Err(Error::NoSuchMailbox(name)) if name == "Nope"
    ));
    assert!(matches!(conn.examine("Secret").await, Err(Error::Permission(_))));
    assert!(matches!(
        conn.select("Broken").await,
        Err(Error::Rejected { status: Status::No, .. })
    ));
    assert!(conn.is_usable());
    server.finish().await;
}

#[tokio::test]
async fn test_close_variants() {
    let mut script = select_inbox("* 1 EXISTS\r\n");
    script.extend([
        Step::Expect("A0002 UNSELECT\r\n"),
        Step::Send("A0002 OK Unselect completed\r\n"),
        Step::Expect("A0003 SELECT INBOX\r\n"),
        Step::Send("* 1 EXISTS\r\nA0003 OK [READ-WRITE] SELECT completed\r\n"),
        Step::Expect("A0004 CLOSE\r\n"),
        Step::Send("A0004 OK Close completed\r\n"),
    ]);
    let (server, conn) = connect(script).await;

    let inbox = conn.select("INBOX").await.unwrap();
    inbox.close(false).await.unwrap();
    assert!(!conn.state().is_selected());

    let inbox = conn.select("INBOX").await.unwrap();
    inbox.close(true).await.unwrap();
    assert!(conn.state().is_authenticated());
    server.finish().await;
}

#[tokio::test]
async fn test_close_without_unselect_examines_first() {
    let (server, conn) = connect(vec![
        Step::Send("* PREAUTH [CAPABILITY IMAP4rev1] ready\r\n"),
        Step::Expect("A0001 SELECT INBOX\r\n"),
        Step::Send("* 1 EXISTS\r\nA0001 OK [READ-WRITE] SELECT completed\r\n"),
        Step::Expect("A0002 EXAMINE INBOX\r\n"),
        Step::Send("* 1 EXISTS\r\nA0002 OK [READ-ONLY] EXAMINE completed\r\n"),
        Step::Expect("A0003 CLOSE\r\n"),
        Step::Send("A0003 OK Close completed\r\n"),
    ])
    .await;

    let inbox = conn.select("INBOX").await.unwrap();
    inbox.close(false).await.unwrap();
    assert!(!conn.state().is_selected());
    server.finish().await;
}
