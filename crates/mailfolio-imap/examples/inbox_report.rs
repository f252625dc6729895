#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: Report unread invoices in INBOX, newest first
//!
//! Connects with implicit TLS, selects INBOX, prints the message counts and
//! the envelopes of unread messages whose subject mentions "invoice", then
//! releases the mailbox without expunging.
//!
//! ## Running
//!
//! ```bash
//! IMAP_HOST=imap.example.com IMAP_USER=alice IMAP_PASSWORD=secret \
//!     RUST_LOG=mailfolio_imap=debug \
//!     cargo run --package mailfolio-imap --example inbox_report
//! ```

use std::env;

use mailfolio_imap::search::{SearchBuilder, SortKey, SortSpec};
use mailfolio_imap::{Config, Connection, PrefetchItem, PrefetchProfile};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = env::var("IMAP_HOST").expect("IMAP_HOST is not set");
    let user = env::var("IMAP_USER").expect("IMAP_USER is not set");
    let password = env::var("IMAP_PASSWORD").expect("IMAP_PASSWORD is not set");

    println!("Connecting to {}...", host);
    let conn = Connection::connect(Config::new(host)).await?;
    conn.login(&user, &password).await?;
    println!("✓ Authenticated as {}\n", user);

    let mut inbox = conn.select("INBOX").await?;
    let counts = inbox.counts().await?;
    println!(
        "INBOX: {} messages, {} unread, {} new",
        counts.total, counts.unread, counts.new
    );

    inbox.set_prefetch_profile(
        PrefetchProfile::new()
            .with(PrefetchItem::Envelope)
            .with(PrefetchItem::Size),
    );

    let predicate = SearchBuilder::new().unseen().subject("invoice").build();
    let newest_first = SortSpec::new().descending(SortKey::Arrival);
    let sort = conn
        .has_capability(&mailfolio_imap::Capability::Sort)
        .then_some(&newest_first);

    for record in inbox.search(&predicate, sort).await? {
        let envelope = record.envelope()?;
        println!(
            "  UID {:>6}  {:>8} bytes  {}",
            record.uid()?.get(),
            record.size()?,
            envelope.subject.as_deref().unwrap_or("(no subject)")
        );
    }

    inbox.close(false).await?;
    conn.logout().await?;
    println!("\n✓ Disconnected");
    Ok(())
}
