//! Listeners for unsolicited mailbox updates.
//!
//! IMAP servers may send EXISTS, EXPUNGE, FETCH and other responses at any
//! time (RFC 2683). Responses that the command in flight asked for go to its
//! caller; everything else is handed to the connection's
//! [`MailboxListener`].
//!
//! The listener runs on the dispatcher task and must not block.
//!
//! ```no_run
//! use mailfolio_imap::connection::{Config, Connection};
//! use mailfolio_imap::handler::{ChannelListener, MailboxEvent};
//!
//! # async fn run(stream: tokio::net::TcpStream) -> mailfolio_imap::Result<()> {
//! let (listener, mut events) = ChannelListener::new();
//! let conn = Connection::with_listener(stream, Config::default(), listener).await?;
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         if let MailboxEvent::Exists(count) = event {
//!             println!("{count} messages");
//!         }
//!     }
//! });
//! # drop(conn);
//! # Ok(())
//! # }
//! ```

use tokio::sync::mpsc;

use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{Flags, ResponseCode, SeqNum};

/// Receives unsolicited server responses.
///
/// Every method has an empty default, so an implementation only overrides
/// what it cares about.
pub trait MailboxListener: Send {
    /// The mailbox now holds `count` messages.
    fn on_exists(&mut self, count: u32) {
        let _ = count;
    }

    /// The message at `seq` was removed; later messages shift down by one.
    fn on_expunge(&mut self, seq: SeqNum) {
        let _ = seq;
    }

    /// Metadata of a message changed, typically flags set by another client.
    fn on_fetch(&mut self, seq: SeqNum, items: &[FetchItem]) {
        let _ = (seq, items);
    }

    /// The mailbox's defined flags changed.
    fn on_flags(&mut self, flags: &Flags) {
        let _ = flags;
    }

    /// The recent count changed.
    fn on_recent(&mut self, count: u32) {
        let _ = count;
    }

    /// The server is closing the connection.
    fn on_bye(&mut self, text: &str) {
        let _ = text;
    }

    /// The server sent an `[ALERT]`, which RFC 3501 requires to be shown to
    /// the user.
    fn on_alert(&mut self, text: &str) {
        let _ = text;
    }

    /// Any other unsolicited response.
    fn on_other(&mut self, response: &UntaggedResponse) {
        let _ = response;
    }
}

/// Hands one unsolicited response to the matching listener method.
pub(crate) fn notify(listener: &mut dyn MailboxListener, response: &UntaggedResponse) {
    match response {
        UntaggedResponse::Exists(count) => listener.on_exists(*count),
        UntaggedResponse::Recent(count) => listener.on_recent(*count),
        UntaggedResponse::Expunge(seq) => listener.on_expunge(*seq),
        UntaggedResponse::Fetch { seq, items } => listener.on_fetch(*seq, items),
        UntaggedResponse::Flags(flags) => listener.on_flags(flags),
        UntaggedResponse::Bye { text, .. } => listener.on_bye(text),
        UntaggedResponse::Ok {
            code: Some(ResponseCode::Alert),
            text,
        }
        | UntaggedResponse::No {
            code: Some(ResponseCode::Alert),
            text,
        } => listener.on_alert(text),
        other => listener.on_other(other),
    }
}

/// A listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl MailboxListener for NoopListener {}

/// A listener that logs updates using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl MailboxListener for LoggingListener {
    fn on_exists(&mut self, count: u32) {
        tracing::debug!(count, "EXISTS");
    }

    fn on_expunge(&mut self, seq: SeqNum) {
        tracing::debug!(seq = seq.get(), "EXPUNGE");
    }

    fn on_fetch(&mut self, seq: SeqNum, items: &[FetchItem]) {
        tracing::debug!(seq = seq.get(), items = ?items, "FETCH");
    }

    fn on_flags(&mut self, flags: &Flags) {
        tracing::debug!(?flags, "FLAGS");
    }

    fn on_recent(&mut self, count: u32) {
        tracing::debug!(count, "RECENT");
    }

    fn on_bye(&mut self, text: &str) {
        tracing::warn!(text, "BYE");
    }

    fn on_alert(&mut self, text: &str) {
        tracing::warn!(text, "ALERT");
    }

    fn on_other(&mut self, response: &UntaggedResponse) {
        tracing::trace!(?response, "unsolicited");
    }
}

/// An unsolicited update forwarded by [`ChannelListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxEvent {
    /// EXISTS response.
    Exists(u32),
    /// EXPUNGE response.
    Expunge(SeqNum),
    /// FETCH response with items.
    Fetch(SeqNum, Vec<FetchItem>),
    /// FLAGS response.
    Flags(Flags),
    /// RECENT response.
    Recent(u32),
    /// BYE response.
    Bye(String),
    /// ALERT response code.
    Alert(String),
}

/// Forwards updates to an unbounded channel, for consumers on other tasks.
///
/// Events are dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<MailboxEvent>,
}

impl ChannelListener {
    /// Creates a listener and the receiver of its events.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MailboxEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: MailboxEvent) {
        let _ = self.tx.send(event);
    }
}

impl MailboxListener for ChannelListener {
    fn on_exists(&mut self, count: u32) {
        self.send(MailboxEvent::Exists(count));
    }

    fn on_expunge(&mut self, seq: SeqNum) {
        self.send(MailboxEvent::Expunge(seq));
    }

    fn on_fetch(&mut self, seq: SeqNum, items: &[FetchItem]) {
        self.send(MailboxEvent::Fetch(seq, items.to_vec()));
    }

    fn on_flags(&mut self, flags: &Flags) {
        self.send(MailboxEvent::Flags(flags.clone()));
    }

    fn on_recent(&mut self, count: u32) {
        self.send(MailboxEvent::Recent(count));
    }

    fn on_bye(&mut self, text: &str) {
        self.send(MailboxEvent::Bye(text.to_string()));
    }

    fn on_alert(&mut self, text: &str) {
        self.send(MailboxEvent::Alert(text.to_string()));
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

    #[test]
    fn test_noop_listener() {
        let mut listener = NoopListener;
        notify(&mut listener, &UntaggedResponse::Exists(100));
        notify(&mut listener, &UntaggedResponse::Expunge(SeqNum::new(1).unwrap()));
    }

    #[test]
    fn test_channel_listener_routes_events() {
        let (mut listener, mut rx) = ChannelListener::new();

        notify(&mut listener, &UntaggedResponse::Exists(50));
        notify(&mut listener, &UntaggedResponse::Recent(5));
        notify(
            &mut listener,
            &UntaggedResponse::Ok {
                code: Some(ResponseCode::Alert),
                text: "Quota nearly full".to_string(),
            },
        );
        notify(
            &mut listener,
            &UntaggedResponse::Fetch {
                seq: SeqNum::new(4).unwrap(),
                items: vec![FetchItem::Flags(Flags::from_iter([Flag::Seen]))],
            },
        );
        // Plain OK without ALERT is not forwarded.
        notify(
            &mut listener,
            &UntaggedResponse::Ok {
                code: None,
                text: "still here".to_string(),
            },
        );

        assert_eq!(rx.try_recv().unwrap(), MailboxEvent::Exists(50));
        assert_eq!(rx.try_recv().unwrap(), MailboxEvent::Recent(5));
        assert_eq!(
            rx.try_recv().unwrap(),
            MailboxEvent::Alert("Quota nearly full".to_string())
        );
        assert!(matches!(rx.try_recv().unwrap(), MailboxEvent::Fetch(seq, _) if seq.get() == 4));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_listener_outlives_receiver() {
        let (mut listener, rx) = ChannelListener::new();
        drop(rx);
        listener.on_exists(1);
    }
}
