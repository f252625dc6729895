//! Scripted IMAP server over an in-memory duplex stream.
//!
//! The server walks a fixed list of [`Step`]s: it reads one client line per
//! `Expect` and writes the bytes of each `Send`. Any difference between what
//! the client writes and the script fails the server task, which the test
//! sees when it calls [`MockServer::finish`].

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use mailfolio_imap::{Config, Connection};

/// PREAUTH greeting advertising SORT and UNSELECT.
pub const PREAUTH: &str = "* PREAUTH [CAPABILITY IMAP4rev1 SORT UNSELECT] ready\r\n";

/// One step of a server script.
pub enum Step {
    /// Read one line (through CRLF) and compare it.
    Expect(&'static str),
    /// Write raw bytes.
    Send(&'static str),
    /// Wait before the next step.
    Pause(Duration),
}

/// Handle on a running script.
pub struct MockServer {
    task: JoinHandle<BufReader<DuplexStream>>,
}

impl MockServer {
    /// Starts `script` and returns the client end of the stream.
    pub fn start(script: Vec<Step>) -> (Self, DuplexStream) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(async move {
            let mut stream = BufReader::new(server);
            for (i, step) in script.into_iter().enumerate() {
                match step {
                    Step::Expect(expected) => {
                        let mut line = Vec::new();
                        stream.read_until(b'\n', &mut line).await.unwrap();
                        assert_eq!(
                            String::from_utf8_lossy(&line),
                            expected,
                            "client line at step {i}"
                        );
                    }
                    Step::Send(bytes) => {
                        stream.get_mut().write_all(bytes.as_bytes()).await.unwrap();
                    }
                    Step::Pause(duration) => tokio::time::sleep(duration).await,
                }
            }
            stream
        });
        (Self { task }, client)
    }

    /// Waits until the whole script has run and returns the server end,
    /// which keeps the connection open while held.
    pub async fn finish(self) -> BufReader<DuplexStream> {
        tokio::time::timeout(Duration::from_secs(30), self.task)
            .await
            .expect("script did not finish")
            .expect("script failed")
    }
}

/// Starts `script` and connects to it with the default configuration.
pub async fn connect(script: Vec<Step>) -> (MockServer, Connection) {
    connect_with(script, Config::default()).await
}

/// Starts `script` and connects to it with `config`.
pub async fn connect_with(script: Vec<Step>, config: Config) -> (MockServer, Connection) {
    let (server, stream) = MockServer::start(script);
    let conn = Connection::from_stream(stream, config).await.unwrap();
    (server, conn)
}

/// Steps for a read-write SELECT of INBOX with `exists` messages, as the
/// first command on the connection.
pub fn select_inbox(exists: &'static str) -> Vec<Step> {
    vec![
        Step::Send(PREAUTH),
        Step::Expect("A0001 SELECT INBOX\r\n"),
        Step::Send(exists),
        Step::Send(
            "* 0 RECENT\r\n\
             * OK [UIDVALIDITY 3857529045] UIDs valid\r\n\
             * OK [UIDNEXT 4392] Predicted next UID\r\n\
             * FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
             A0001 OK [READ-WRITE] SELECT completed\r\n",
        ),
    ]
}
