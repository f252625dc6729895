//! The connection handle.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use super::config::{Config, Security};
use super::dispatcher::{Dispatcher, Request};
use super::stream::ImapStream;
use crate::command::{Command, StatusAttribute};
use crate::folder::{AccessMode, Folder};
use crate::handler::{LoggingListener, MailboxListener};
use crate::parser::{StatusItem, UntaggedResponse};
use crate::protocol::{CommandResult, ConnectionSnapshot, ProtocolState};
use crate::types::{Capability, ListResponse, Mailbox, ResponseCode};
use crate::{Error, Result};

/// Cloneable handle to one IMAP connection.
///
/// All clones feed the same dispatcher task, which runs their commands one
/// at a time in submission order. Dropping every clone stops the task.
///
/// ```no_run
/// use mailfolio_imap::connection::{Config, Connection};
///
/// # async fn run() -> mailfolio_imap::Result<()> {
/// let conn = Connection::connect(Config::new("imap.example.com")).await?;
/// conn.login("alice", "secret").await?;
/// let inbox = conn.select("INBOX").await?;
/// println!("{} messages", inbox.counts().await?.total);
/// conn.logout().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Connection {
    requests: mpsc::Sender<Request>,
    snapshot: watch::Receiver<ConnectionSnapshot>,
    config: Arc<Config>,
}

impl Connection {
    /// Opens a connection as described by `config` and reads the greeting.
    ///
    /// With [`Security::StartTls`] the transport is upgraded before this
    /// returns and the capabilities are fetched again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the server cannot be reached within the
    /// connect timeout, [`Error::Bye`] if it refuses the connection, and
    /// transport or TLS errors.
    pub async fn connect(config: Config) -> Result<Self> {
        Self::connect_with_listener(config, LoggingListener).await
    }

    /// Like [`connect`](Self::connect), with a listener for unsolicited
    /// mailbox updates.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn connect_with_listener(
        config: Config,
        listener: impl MailboxListener + 'static,
    ) -> Result<Self> {
        let limit = config.connect_timeout;
        let stream = tokio::time::timeout(limit, ImapStream::open(&config))
            .await
            .map_err(|_| Error::Timeout(limit))??;
        info!(host = %config.host, port = config.port, security = ?config.security, "connected");

        let starttls = config.security == Security::StartTls;
        let (requests, queue) = mpsc::channel(config.queue_depth);
        let (publisher, snapshot) = watch::channel(ConnectionSnapshot::default());
        let mut dispatcher =
            Dispatcher::new(stream, config.clone(), Box::new(listener), queue, publisher);
        dispatcher.greet().await?;
        if starttls {
            dispatcher = dispatcher.start_tls().await?;
        }
        dispatcher.spawn();

        let conn = Self {
            requests,
            snapshot,
            config: Arc::new(config),
        };
        if starttls {
            conn.capability().await?;
        }
        Ok(conn)
    }

    /// Starts a connection over a stream the caller has already opened.
    ///
    /// Unsolicited updates are logged by a [`LoggingListener`].
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting cannot be read or is a BYE.
    pub async fn from_stream<S>(stream: S, config: Config) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Self::with_listener(stream, config, LoggingListener).await
    }

    /// Starts a connection over `stream` with a custom listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting cannot be read or is a BYE.
    pub async fn with_listener<S>(
        stream: S,
        config: Config,
        listener: impl MailboxListener + 'static,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (requests, queue) = mpsc::channel(config.queue_depth);
        let (publisher, snapshot) = watch::channel(ConnectionSnapshot::default());
        let mut dispatcher =
            Dispatcher::new(stream, config.clone(), Box::new(listener), queue, publisher);
        dispatcher.greet().await?;
        dispatcher.spawn();

        Ok(Self {
            requests,
            snapshot,
            config: Arc::new(config),
        })
    }

    /// Runs any command and returns its OK completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the command is illegal in the
    /// current state, [`Error::Rejected`] for NO/BAD, and
    /// [`Error::ConnectionClosed`] once the connection has failed.
    pub async fn execute(&self, command: Command) -> Result<CommandResult> {
        self.submit(command, None).await.map(|(result, _)| result)
    }

    /// Queues `command` and waits for its completion.
    pub(crate) async fn submit(
        &self,
        command: Command,
        selection: Option<u64>,
    ) -> Result<(CommandResult, ConnectionSnapshot)> {
        if !self.is_usable() {
            return Err(Error::ConnectionClosed);
        }
        let (reply, completion) = oneshot::channel();
        self.requests
            .send(Request {
                command,
                selection,
                reply,
            })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        let (result, snapshot) = completion.await.map_err(|_| Error::ConnectionClosed)??;
        Ok((result.ensure_ok()?, snapshot))
    }

    /// Authenticates with LOGIN. Each credential goes out as an atom, a
    /// quoted string or a literal, whichever its bytes allow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the server refuses the credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let result = self
            .execute(Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        info!(username, "logged in");

        let announced = matches!(result.code, Some(ResponseCode::Capability(_)))
            || result
                .responses
                .iter()
                .any(|r| matches!(r, UntaggedResponse::Capability(_)));
        if !announced {
            self.capability().await?;
        }
        Ok(())
    }

    /// Asks the server for its capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn capability(&self) -> Result<Vec<Capability>> {
        let (_, snapshot) = self.submit(Command::Capability, None).await?;
        Ok(snapshot.capabilities)
    }

    /// Sends NOOP, which also collects pending mailbox updates.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn noop(&self) -> Result<()> {
        self.execute(Command::Noop).await.map(drop)
    }

    /// Logs out. The connection is closed afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn logout(&self) -> Result<()> {
        self.execute(Command::Logout).await?;
        info!("logged out");
        Ok(())
    }

    /// Lists mailboxes matching `pattern` under `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn list(&self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let result = self
            .execute(Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;
        Ok(result
            .responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::List(entry) => Some(entry),
                _ => None,
            })
            .collect())
    }

    /// Creates a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn create(&self, mailbox: impl Into<Mailbox>) -> Result<()> {
        let mailbox = mailbox.into();
        self.execute(Command::Create { mailbox }).await.map(drop)
    }

    /// Deletes a mailbox. Deleting the selected mailbox invalidates its
    /// folder session.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn delete(&self, mailbox: impl Into<Mailbox>) -> Result<()> {
        let mailbox = mailbox.into();
        self.execute(Command::Delete { mailbox }).await.map(drop)
    }

    /// Renames a mailbox. Renaming the selected mailbox invalidates its
    /// folder session.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rename(&self, from: impl Into<Mailbox>, to: impl Into<Mailbox>) -> Result<()> {
        let (from, to) = (from.into(), to.into());
        self.execute(Command::Rename { from, to }).await.map(drop)
    }

    /// Requests STATUS data for a mailbox without selecting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn status(
        &self,
        mailbox: impl Into<Mailbox>,
        items: &[StatusAttribute],
    ) -> Result<Vec<StatusItem>> {
        let result = self
            .execute(Command::Status {
                mailbox: mailbox.into(),
                items: items.to_vec(),
            })
            .await?;
        Ok(result
            .responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Status { items, .. } => Some(items),
                _ => None,
            })
            .flatten()
            .collect())
    }

    /// Selects a mailbox read-write.
    ///
    /// # Errors
    ///
    /// See [`Folder::select`].
    pub async fn select(&self, mailbox: impl Into<Mailbox>) -> Result<Folder> {
        Folder::select(self, mailbox, AccessMode::ReadWrite).await
    }

    /// Selects a mailbox read-only with EXAMINE.
    ///
    /// # Errors
    ///
    /// See [`Folder::select`].
    pub async fn examine(&self, mailbox: impl Into<Mailbox>) -> Result<Folder> {
        Folder::select(self, mailbox, AccessMode::ReadOnly).await
    }

    /// Protocol phase.
    #[must_use]
    pub fn state(&self) -> ProtocolState {
        self.snapshot.borrow().state.clone()
    }

    /// Advertised capabilities.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        self.snapshot.borrow().capabilities.clone()
    }

    /// Returns true if `capability` is advertised.
    #[must_use]
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.snapshot.borrow().capabilities.contains(capability)
    }

    /// Returns false once the connection has been closed or has failed.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.snapshot.borrow().usable
    }

    /// Latest published session state.
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Configuration the connection was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}
