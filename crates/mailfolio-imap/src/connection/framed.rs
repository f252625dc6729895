//! Framed I/O for IMAP protocol.
//!
//! IMAP uses CRLF-terminated lines with support for literals.
//! This module provides buffered reading and writing with proper
//! handling of the IMAP framing.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::config::Limits;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Framed connection for IMAP protocol.
///
/// Handles line-based reading with literal support and buffered writing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    limits: Limits,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream with default limits.
    pub fn new(stream: S) -> Self {
        Self::with_limits(stream, Limits::default())
    }

    /// Creates a new framed stream with the given limits.
    pub fn with_limits(stream: S, limits: Limits) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            limits,
        }
    }

    /// Reads a complete IMAP response, handling literals.
    ///
    /// IMAP responses can contain literals in the format `{n}\r\n<n bytes>`.
    /// After each literal marker the literal is read by byte count, then
    /// line reading resumes until a line ends without a marker.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(literal_len) = parse_literal_length(&line)? else {
                break;
            };
            if literal_len > self.limits.max_literal_size {
                return Err(Error::Protocol(format!(
                    "literal too large: {literal_len} bytes (max {})",
                    self.limits.max_literal_size
                )));
            }
            let literal = self.read_exact(literal_len).await?;
            response.extend_from_slice(&literal);
        }

        tracing::trace!(
            bytes = response.len(),
            "S: {}",
            String::from_utf8_lossy(first_line(&response))
        );
        Ok(response)
    }

    /// Reads a single CRLF-terminated line, CRLF included.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            // A CR at the end of the previous chunk may pair with an LF here.
            if line.last() == Some(&b'\r') && buf[0] == b'\n' {
                line.push(b'\n');
                self.reader.consume(1);
                break;
            }

            if let Some(pos) = find_crlf(buf) {
                line.extend_from_slice(&buf[..pos + 2]);
                self.reader.consume(pos + 2);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > self.limits.max_line_length {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }

        if line.len() > self.limits.max_line_length + 2 {
            return Err(Error::Protocol("line too long".to_string()));
        }
        Ok(line)
    }

    /// Reads exactly `len` bytes.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.reader.read_exact(&mut data).await?;
        Ok(data)
    }

    /// Writes a command fragment to the stream and flushes it.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Shuts the write half of the transport down.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn first_line(response: &[u8]) -> &[u8] {
    let end = find_crlf(response).unwrap_or(response.len());
    &response[..end]
}

/// Parses a literal length from the end of a line.
///
/// Matches `{123}\r\n` or `{123+}\r\n`. Braces around anything other than
/// digits are ordinary text; an empty or overflowing count is an error.
fn parse_literal_length(line: &[u8]) -> Result<Option<usize>> {
    let Some(line) = line.strip_suffix(b"\r\n") else {
        return Ok(None);
    };
    let Some(body) = line.strip_suffix(b"}") else {
        return Ok(None);
    };
    let Some(open) = body.iter().rposition(|&b| b == b'{') else {
        return Ok(None);
    };
    let digits = &body[open + 1..];
    let digits = digits.strip_suffix(b"+").unwrap_or(digits);

    if digits.is_empty() {
        return Err(Error::Protocol("empty literal length".to_string()));
    }
    if !digits.iter().all(u8::is_ascii_digit) {
        return Ok(None);
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Some)
        .ok_or_else(|| Error::Protocol("literal length out of range".to_string()))
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

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\n"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"no newline"), None);
        assert_eq!(find_crlf(b"just\n"), None);
        assert_eq!(find_crlf(b"just\r"), None);
    }

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"BODY {123}\r\n").unwrap(), Some(123));
        assert_eq!(parse_literal_length(b"BODY {123+}\r\n").unwrap(), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n").unwrap(), Some(0));
        assert_eq!(
            parse_literal_length(b"{999999}\r\n").unwrap(),
            Some(999_999)
        );
        assert_eq!(parse_literal_length(b"no literal\r\n").unwrap(), None);
        assert_eq!(parse_literal_length(b"incomplete {123").unwrap(), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n").unwrap(), None);
    }

    #[test]
    fn test_bad_literal_length() {
        assert!(parse_literal_length(b"* 1 FETCH (BODY {}\r\n").is_err());
        assert!(parse_literal_length(b"* 1 FETCH (BODY {+}\r\n").is_err());
        assert!(parse_literal_length(b"BODY {99999999999999999999999}\r\n").is_err());
    }

    #[tokio::test]
    async fn test_framed_read_simple_line() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_framed_read_with_literal() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY {5}\r\n")
            .read(b"hello)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* 1 FETCH (BODY {5}\r\nhello)\r\n");
    }

    #[tokio::test]
    async fn test_literal_containing_crlf_and_marker() {
        use tokio_test::io::Builder;

        // The literal itself looks like a line ending in a literal marker.
        let mock = Builder::new()
            .read(b"* 2 FETCH (BODY[] {9}\r\n")
            .read(b"a {3}\r\nbc")
            .read(b" UID 7)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(
            response,
            b"* 2 FETCH (BODY[] {9}\r\na {3}\r\nbc UID 7)\r\n".to_vec()
        );
    }

    #[tokio::test]
    async fn test_crlf_split_across_reads() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK split\r").read(b"\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_line().await.unwrap(), b"* OK split\r\n");
    }

    #[tokio::test]
    async fn test_framed_write_command() {
        use tokio_test::io::Builder;

        let mock = Builder::new().write(b"A0001 LOGIN user pass\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed
            .write_command(b"A0001 LOGIN user pass\r\n")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        use tokio_test::io::Builder;

        let limits = Limits {
            max_literal_size: 1000,
            ..Limits::default()
        };
        let mock = Builder::new().read(b"* 1 FETCH (BODY {1001}\r\n").build();
        let mut framed = FramedStream::with_limits(mock, limits);

        let result = framed.read_response().await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("literal too large")
        );
    }

    #[tokio::test]
    async fn test_literal_max_size_allowed() {
        use tokio_test::io::Builder;

        let literal_size = 1000;
        let header = format!("* 1 FETCH (BODY {{{literal_size}}}\r\n");
        let literal_data = vec![b'X'; literal_size];

        let mock = Builder::new()
            .read(header.as_bytes())
            .read(&literal_data)
            .read(b")\r\n")
            .build();
        let limits = Limits {
            max_literal_size: literal_size,
            ..Limits::default()
        };
        let mut framed = FramedStream::with_limits(mock, limits);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response.len(), header.len() + literal_size + 3);
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        use tokio_test::io::Builder;

        let limits = Limits {
            max_line_length: 64,
            ..Limits::default()
        };
        let long_line = "A".repeat(100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::with_limits(mock, limits);

        let result = framed.read_response().await;
        assert!(result.unwrap_err().to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_eof_is_io_error() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }
}
