//! The dispatcher task.
//!
//! One task per connection owns the transport and the [`Protocol`] tracker.
//! Callers queue [`Request`]s; the task writes one command at a time, reads
//! until its tagged completion and answers on the request's oneshot channel.
//! IMAP allows one command in flight, so the queue is the only ordering.
//!
//! A timeout or a transport/framing error ends the task: the transport is
//! shut down, queued requests fail with [`Error::ConnectionClosed`] and the
//! published snapshot is marked unusable.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

use super::config::Config;
use super::framed::FramedStream;
use super::stream::ImapStream;
use crate::command::{Command, Fragment, LiteralMode, TagGenerator};
use crate::handler::{MailboxListener, notify};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::protocol::{CommandResult, ConnectionSnapshot, Protocol, ProtocolState};
use crate::types::{ResponseCode, Status, Tag};
use crate::{Error, Result};

/// Completion of a request, with the session state right after it.
pub(crate) type Reply = Result<(CommandResult, ConnectionSnapshot)>;

/// A queued command.
pub(crate) struct Request {
    pub(crate) command: Command,
    /// Selection the command was issued for, if it is folder-bound.
    pub(crate) selection: Option<u64>,
    pub(crate) reply: oneshot::Sender<Reply>,
}

pub(crate) struct Dispatcher<S> {
    framed: FramedStream<S>,
    protocol: Protocol,
    tags: TagGenerator,
    listener: Box<dyn MailboxListener>,
    requests: mpsc::Receiver<Request>,
    snapshot: watch::Sender<ConnectionSnapshot>,
    config: Config,
    /// Text of an unsolicited BYE, reported if the transport then closes.
    bye: Option<String>,
}

impl<S> Dispatcher<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn new(
        stream: S,
        config: Config,
        listener: Box<dyn MailboxListener>,
        requests: mpsc::Receiver<Request>,
        snapshot: watch::Sender<ConnectionSnapshot>,
    ) -> Self {
        Self {
            framed: FramedStream::with_limits(stream, config.limits),
            protocol: Protocol::new(),
            tags: TagGenerator::new(config.tag_prefix),
            listener,
            requests,
            snapshot,
            config,
            bye: None,
        }
    }

    /// Reads and applies the server greeting.
    pub(crate) async fn greet(&mut self) -> Result<()> {
        let limit = self.config.command_timeout;
        let bytes = tokio::time::timeout(limit, self.framed.read_response())
            .await
            .map_err(|_| Error::Timeout(limit))??;
        let greeting = ResponseParser::parse(&bytes)?;
        self.protocol.greet(&greeting)?;
        debug!(state = %self.protocol.state(), "greeted");
        self.publish(true);
        Ok(())
    }

    /// Runs one command outside the queue, before the task is spawned.
    pub(crate) async fn exchange(&mut self, command: &Command) -> Result<CommandResult> {
        self.protocol.check(command, None)?;
        let limit = self.config.command_timeout;
        let result = tokio::time::timeout(limit, self.execute(command))
            .await
            .map_err(|_| Error::Timeout(limit))??;
        self.publish(true);
        Ok(result)
    }

    /// Spawns the dispatcher loop.
    pub(crate) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            if request.reply.is_closed() {
                debug!(command = request.command.name(), "caller gone, command skipped");
                continue;
            }
            if let Err(e) = self.protocol.check(&request.command, request.selection) {
                let _ = request.reply.send(Err(e));
                continue;
            }

            let limit = self.config.command_timeout;
            let outcome = tokio::time::timeout(limit, self.execute(&request.command))
                .await
                .unwrap_or(Err(Error::Timeout(limit)));

            match outcome {
                Ok(result) => {
                    let finished = matches!(self.protocol.state(), ProtocolState::Logout);
                    let snapshot = self.publish(!finished);
                    let _ = request.reply.send(Ok((result, snapshot)));
                    if finished {
                        info!("logged out");
                        break;
                    }
                }
                Err(e) if e.is_fatal() => {
                    warn!(error = %e, command = request.command.name(), "connection failed");
                    self.publish(false);
                    let _ = request.reply.send(Err(e));
                    break;
                }
                Err(e) => {
                    self.publish(true);
                    let _ = request.reply.send(Err(e));
                }
            }
        }
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.publish(false);
        if let Err(e) = self.framed.shutdown().await {
            trace!(error = %e, "transport shutdown");
        }
        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            let _ = request.reply.send(Err(Error::ConnectionClosed));
        }
        debug!("dispatcher stopped");
    }

    fn publish(&self, usable: bool) -> ConnectionSnapshot {
        let snapshot = self.protocol.snapshot(usable);
        self.snapshot.send_replace(snapshot.clone());
        snapshot
    }

    async fn execute(&mut self, command: &Command) -> Result<CommandResult> {
        let tag = self.tags.next();
        let encoded = command.encode(tag.as_str(), self.protocol.literal_support());
        if matches!(command, Command::Login { .. }) {
            debug!(%tag, "C: {tag} LOGIN <redacted>");
        } else {
            debug!(%tag, "C: {}", first_line(&encoded.to_bytes()));
        }

        self.protocol.begin(command);
        let mut responses = Vec::new();

        for fragment in encoded.into_fragments() {
            match fragment {
                Fragment::Line(line) => self.framed.write_command(&line).await?,
                Fragment::Literal { data, mode } => {
                    if mode == LiteralMode::Sync {
                        let early = self
                            .await_continuation(&tag, command, &mut responses)
                            .await?;
                        if let Some(done) = early {
                            return Ok(done);
                        }
                    }
                    self.framed.write_command(&data).await?;
                }
            }
        }

        loop {
            match self.read().await? {
                Response::Tagged {
                    tag: done,
                    status,
                    code,
                    text,
                } if done == tag => return Ok(self.finish(command, status, code, text, responses)),
                Response::Tagged { tag: other, .. } => {
                    return Err(Error::Protocol(format!(
                        "completion for unknown tag {other} while waiting for {tag}"
                    )));
                }
                Response::Continuation { .. } => {
                    return Err(Error::Protocol(format!(
                        "unexpected continuation request for {tag}"
                    )));
                }
                Response::Untagged(data) => self.route(command, data, &mut responses),
            }
        }
    }

    /// Waits for `+` before a synchronizing literal. A tagged completion
    /// instead means the server refused the command early.
    async fn await_continuation(
        &mut self,
        tag: &Tag,
        command: &Command,
        responses: &mut Vec<UntaggedResponse>,
    ) -> Result<Option<CommandResult>> {
        loop {
            match self.read().await? {
                Response::Continuation { .. } => return Ok(None),
                Response::Tagged {
                    tag: done,
                    status,
                    code,
                    text,
                } if done == *tag => {
                    let responses = std::mem::take(responses);
                    return Ok(Some(self.finish(command, status, code, text, responses)));
                }
                Response::Tagged { tag: other, .. } => {
                    return Err(Error::Protocol(format!(
                        "completion for unknown tag {other} while waiting for {tag}"
                    )));
                }
                Response::Untagged(data) => self.route(command, data, responses),
            }
        }
    }

    async fn read(&mut self) -> Result<Response> {
        let bytes = match self.framed.read_response().await {
            Ok(bytes) => bytes,
            Err(Error::Io(e)) => {
                return Err(self.bye.take().map_or(Error::Io(e), Error::Bye));
            }
            Err(e) => return Err(e),
        };
        ResponseParser::parse(&bytes)
    }

    fn route(
        &mut self,
        command: &Command,
        data: UntaggedResponse,
        responses: &mut Vec<UntaggedResponse>,
    ) {
        self.protocol.observe(&data);
        if let UntaggedResponse::Bye { text, .. } = &data {
            if !matches!(command, Command::Logout) {
                warn!(text = %text, "server sent BYE");
            }
            self.bye = Some(text.clone());
        }

        if command.expects(&data) {
            responses.push(data);
        } else {
            notify(self.listener.as_mut(), &data);
        }
    }

    fn finish(
        &mut self,
        command: &Command,
        status: Status,
        code: Option<ResponseCode>,
        text: String,
        responses: Vec<UntaggedResponse>,
    ) -> CommandResult {
        self.protocol.complete(command, status, code.as_ref());
        debug!(
            command = command.name(),
            %status,
            responses = responses.len(),
            "completed"
        );
        CommandResult {
            status,
            code,
            text,
            responses,
        }
    }
}

impl Dispatcher<ImapStream> {
    /// Issues STARTTLS and wraps the transport in TLS.
    pub(crate) async fn start_tls(mut self) -> Result<Self> {
        self.exchange(&Command::StartTls).await?.ensure_ok()?;
        let Self {
            framed,
            protocol,
            tags,
            listener,
            requests,
            snapshot,
            config,
            bye,
        } = self;
        let stream = framed.into_inner().start_tls(&config.host).await?;
        info!(host = %config.host, "TLS established");
        Ok(Self {
            framed: FramedStream::with_limits(stream, config.limits),
            protocol,
            tags,
            listener,
            requests,
            snapshot,
            config,
            bye,
        })
    }
}

fn first_line(bytes: &[u8]) -> String {
    let end = bytes
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
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
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::handler::NoopListener;
    use crate::types::Mailbox;

    fn dispatcher(mock: Mock) -> (Dispatcher<Mock>, watch::Receiver<ConnectionSnapshot>) {
        let (_requests, queue) = mpsc::channel(1);
        let (publisher, snapshot) = watch::channel(ConnectionSnapshot::default());
        let dispatcher = Dispatcher::new(
            mock,
            Config::default(),
            Box::new(NoopListener),
            queue,
            publisher,
        );
        (dispatcher, snapshot)
    }

    #[tokio::test]
    async fn select_routes_status_and_publishes() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\n* 1 RECENT\r\nA0001 OK [READ-WRITE] done\r\n")
            .build();
        let (mut dispatcher, snapshot) = dispatcher(mock);
        dispatcher.greet().await.unwrap();

        let result = dispatcher
            .exchange(&Command::Select {
                mailbox: Mailbox::inbox(),
            })
            .await
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(
            result.responses,
            vec![UntaggedResponse::Exists(3), UntaggedResponse::Recent(1)]
        );

        let published = snapshot.borrow();
        assert!(published.usable);
        assert!(published.state.is_selected());
        assert_eq!(published.selection, 1);
        assert_eq!(published.mailbox.as_ref().unwrap().exists, 3);
    }

    #[tokio::test]
    async fn sync_literal_waits_for_continuation() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN user {5}\r\n")
            .read(b"+ go ahead\r\n")
            .write(b"pa\nss")
            .write(b"\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let (mut dispatcher, _snapshot) = dispatcher(mock);
        dispatcher.greet().await.unwrap();

        let result = dispatcher
            .exchange(&Command::Login {
                username: "user".into(),
                password: "pa\nss".into(),
            })
            .await
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(dispatcher.protocol.state(), &ProtocolState::Authenticated);
    }

    #[tokio::test]
    async fn early_completion_skips_literal() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN user {5}\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] no\r\n")
            .build();
        let (mut dispatcher, _snapshot) = dispatcher(mock);
        dispatcher.greet().await.unwrap();

        let result = dispatcher
            .exchange(&Command::Login {
                username: "user".into(),
                password: "pa\nss".into(),
            })
            .await
            .unwrap();
        assert_eq!(result.status, Status::No);
        assert_eq!(dispatcher.protocol.state(), &ProtocolState::NotAuthenticated);
    }

    #[tokio::test]
    async fn unexpected_continuation_is_protocol_error() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"+ what\r\n")
            .build();
        let (mut dispatcher, _snapshot) = dispatcher(mock);
        dispatcher.greet().await.unwrap();

        let err = dispatcher.exchange(&Command::Noop).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn first_line_stops_at_crlf() {
        assert_eq!(first_line(b"A1 LOGIN {3}\r\nabc\r\n"), "A1 LOGIN {3}");
        assert_eq!(first_line(b"no newline"), "no newline");
    }
}
