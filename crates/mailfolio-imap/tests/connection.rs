//! Dispatcher and connection scenarios against a scripted server.

mod common;

use std::time::Duration;

use common::{MockServer, PREAUTH, Step, connect, connect_with};
use mailfolio_imap::types::{Capability, SeqNum};
use mailfolio_imap::{
    ChannelListener, Command, Config, Connection, Error, MailboxEvent, ProtocolState,
};

#[tokio::test]
async fn test_sync_literal_waits_for_continuation() {
    let (server, conn) = connect(vec![
        Step::Send("* OK [CAPABILITY IMAP4rev1] Server ready\r\n"),
        Step::Expect("A0001 LOGIN alice {10}\r\n"),
        Step::Send("+ Ready for literal data\r\n"),
        Step::Expect("pässwörd\r\n"),
        Step::Send("A0001 OK [CAPABILITY IMAP4rev1 SORT] Logged in\r\n"),
    ])
    .await;
    assert_eq!(conn.state(), ProtocolState::NotAuthenticated);

    conn.login("alice", "pässwörd").await.unwrap();
    assert_eq!(conn.state(), ProtocolState::Authenticated);
    assert!(conn.has_capability(&Capability::Sort));
    server.finish().await;
}

#[tokio::test]
async fn test_literal_plus_does_not_wait() {
    let (server, conn) = connect(vec![
        Step::Send("* OK [CAPABILITY IMAP4rev1 LITERAL+] Server ready\r\n"),
        Step::Expect("A0001 LOGIN alice {10+}\r\n"),
        Step::Expect("pässwörd\r\n"),
        Step::Send("A0001 OK Logged in\r\n"),
        Step::Expect("A0002 CAPABILITY\r\n"),
        Step::Send("* CAPABILITY IMAP4rev1 LITERAL+ UNSELECT\r\nA0002 OK done\r\n"),
    ])
    .await;

    conn.login("alice", "pässwörd").await.unwrap();
    assert!(conn.has_capability(&Capability::Unselect));
    server.finish().await;
}

#[tokio::test]
async fn test_rejected_login_before_continuation() {
    let (server, conn) = connect(vec![
        Step::Send("* OK [CAPABILITY IMAP4rev1] Server ready\r\n"),
        Step::Expect("A0001 LOGIN alice {10}\r\n"),
        Step::Send("A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n"),
        Step::Expect("A0002 NOOP\r\n"),
        Step::Send("A0002 OK done\r\n"),
    ])
    .await;

    let err = conn.login("alice", "pässwörd").await.unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(conn.state(), ProtocolState::NotAuthenticated);
    conn.noop().await.unwrap();
    server.finish().await;
}

#[tokio::test]
async fn test_illegal_command_is_not_written() {
    let (server, conn) = connect(vec![
        Step::Send("* OK [CAPABILITY IMAP4rev1] Server ready\r\n"),
        Step::Expect("A0001 NOOP\r\n"),
        Step::Send("A0001 OK done\r\n"),
    ])
    .await;

    assert!(matches!(
        conn.select("INBOX").await,
        Err(Error::InvalidState { .. })
    ));
    assert!(matches!(
        conn.execute(Command::Expunge).await,
        Err(Error::InvalidState { .. })
    ));
    // The next command still gets the first tag.
    conn.noop().await.unwrap();
    server.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_timeout_makes_connection_unusable() {
    let config = Config::builder("localhost")
        .command_timeout(Duration::from_secs(5))
        .build();
    let (server, conn) = connect_with(
        vec![Step::Send(PREAUTH), Step::Expect("A0001 NOOP\r\n")],
        config,
    )
    .await;

    let err = conn.noop().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(limit) if limit == Duration::from_secs(5)));
    assert!(!conn.is_usable());

    // Later calls fail at once instead of waiting for another timeout.
    let started = tokio::time::Instant::now();
    assert!(matches!(conn.noop().await, Err(Error::ConnectionClosed)));
    assert!(matches!(
        conn.capability().await,
        Err(Error::ConnectionClosed)
    ));
    assert_eq!(started.elapsed(), Duration::ZERO);
    server.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_command_is_drained() {
    let (server, conn) = connect(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 NOOP\r\n"),
        Step::Pause(Duration::from_millis(50)),
        Step::Send("* 3 EXISTS\r\nA0001 OK NOOP completed\r\n"),
        Step::Expect("A0002 CAPABILITY\r\n"),
        Step::Send("* CAPABILITY IMAP4rev1 SORT\r\nA0002 OK done\r\n"),
    ])
    .await;

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.noop().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    let capabilities = conn.capability().await.unwrap();
    assert_eq!(capabilities, vec![Capability::Imap4Rev1, Capability::Sort]);
    assert!(conn.is_usable());
    server.finish().await;
}

#[tokio::test]
async fn test_concurrent_callers_are_serialized() {
    let (server, conn) = connect(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 NOOP\r\n"),
        Step::Send("A0001 OK done\r\n"),
        Step::Expect("A0002 NOOP\r\n"),
        Step::Send("A0002 OK done\r\n"),
        Step::Expect("A0003 NOOP\r\n"),
        Step::Send("A0003 OK done\r\n"),
    ])
    .await;

    let (a, b, c) = tokio::join!(conn.noop(), conn.noop(), conn.noop());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    server.finish().await;
}

#[tokio::test]
async fn test_unsolicited_updates_reach_listener() {
    let (server, stream) = MockServer::start(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 NOOP\r\n"),
        Step::Send(
            "* 7 EXISTS\r\n\
             * 2 EXPUNGE\r\n\
             * OK [ALERT] Maintenance at noon\r\n\
             A0001 OK NOOP completed\r\n",
        ),
    ]);
    let (listener, mut events) = ChannelListener::new();
    let conn = Connection::with_listener(stream, Config::default(), listener)
        .await
        .unwrap();

    conn.noop().await.unwrap();
    assert_eq!(events.recv().await, Some(MailboxEvent::Exists(7)));
    assert_eq!(
        events.recv().await,
        Some(MailboxEvent::Expunge(SeqNum::new(2).unwrap()))
    );
    assert_eq!(
        events.recv().await,
        Some(MailboxEvent::Alert("Maintenance at noon".into()))
    );
    server.finish().await;
}

#[tokio::test]
async fn test_unknown_tag_is_fatal() {
    let (server, conn) = connect(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 NOOP\r\n"),
        Step::Send("B0042 OK not yours\r\n"),
    ])
    .await;

    let err = conn.noop().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert!(!conn.is_usable());
    server.finish().await;
}

#[tokio::test]
async fn test_bye_then_eof() {
    let (server, conn) = connect(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 NOOP\r\n"),
        Step::Send("* BYE Idle for too long\r\n"),
    ])
    .await;
    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.noop().await }
    });
    // Dropping the server end closes the stream after the BYE.
    drop(server.finish().await);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Bye(text) if text == "Idle for too long"));
    assert!(!conn.is_usable());
}

#[tokio::test]
async fn test_bye_greeting_is_refused() {
    let (server, stream) = MockServer::start(vec![Step::Send("* BYE Too many connections\r\n")]);
    let err = Connection::from_stream(stream, Config::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Bye(_)));
    server.finish().await;
}

#[tokio::test]
async fn test_logout_closes_connection() {
    let (server, conn) = connect(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 LOGOUT\r\n"),
        Step::Send("* BYE Logging out\r\nA0001 OK LOGOUT completed\r\n"),
    ])
    .await;

    conn.logout().await.unwrap();
    assert_eq!(conn.state(), ProtocolState::Logout);
    assert!(!conn.is_usable());
    assert!(matches!(conn.noop().await, Err(Error::ConnectionClosed)));
    server.finish().await;
}

#[tokio::test]
async fn test_list_mailboxes() {
    let (server, conn) = connect(vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 LIST \"\" \"*\"\r\n"),
        Step::Send(
            "* LIST (\\HasNoChildren) \"/\" INBOX\r\n\
             * LIST (\\HasNoChildren) \"/\" \"Sent Items\"\r\n\
             A0001 OK LIST completed\r\n",
        ),
    ])
    .await;

    let mailboxes = conn.list("", "*").await.unwrap();
    let names: Vec<&str> = mailboxes.iter().map(|m| m.mailbox.as_str()).collect();
    assert_eq!(names, vec!["INBOX", "Sent Items"]);
    server.finish().await;
}
