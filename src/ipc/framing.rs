//! Content-Length message framing for JSON-RPC over stream sockets.
//!
//! # Wire Format
//!
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <message-body>
//! ```
//!
//! Header names are matched case-insensitively and both CRLF and LF line
//! endings are accepted. Unknown headers are skipped.
//!
//! Both helpers are generic over the tokio I/O traits so the same code
//! frames the client side of a socket and the scripted servers used in
//! tests.

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum message size (100MB). Result pages are large but bounded.
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";

/// Read one framed message.
///
/// # Errors
///
/// Fails if the peer closes the stream before a complete frame arrives, the
/// Content-Length header is missing or unparsable, the declared size exceeds
/// [`MAX_MESSAGE_SIZE`], or the body is not UTF-8.
pub async fn read_message<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .context("Failed to read header line")?;

        if bytes_read == 0 {
            return Err(anyhow!("Connection closed by peer"));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        if let Some((key, value)) = trimmed.split_once(':') {
            if key.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let value = value.trim();
                content_length = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid Content-Length value: {}", value))?,
                );
            }
        }
    }

    let size = content_length.ok_or_else(|| anyhow!("Missing Content-Length header"))?;
    if size > MAX_MESSAGE_SIZE {
        return Err(anyhow!(
            "Message size {} exceeds maximum {} bytes",
            size,
            MAX_MESSAGE_SIZE
        ));
    }

    let mut body = vec![0u8; size];
    reader
        .read_exact(&mut body)
        .await
        .context("Failed to read message body")?;

    String::from_utf8(body).context("Message body is not valid UTF-8")
}

/// Write one framed message and flush it.
pub async fn write_message<W>(writer: &mut W, body: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = format!("{}: {}\r\n\r\n", CONTENT_LENGTH, body.len());

    writer
        .write_all(header.as_bytes())
        .await
        .context("Failed to write message header")?;
    writer
        .write_all(body.as_bytes())
        .await
        .context("Failed to write message body")?;
    writer.flush().await.context("Failed to flush message")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, BufReader, DuplexStream};
    use tokio::time::timeout;

    /// Test timeout to prevent hanging tests.
    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn pipe() -> (DuplexStream, BufReader<DuplexStream>) {
        let (client, server) = duplex(64 * 1024);
        (client, BufReader::new(server))
    }

    async fn read_with_timeout(reader: &mut BufReader<DuplexStream>) -> Result<String> {
        timeout(TEST_TIMEOUT, read_message(reader))
            .await
            .expect("Test timed out")
    }

    #[tokio::test]
    async fn test_write_then_read_two_frames() {
        let (mut client, mut server) = pipe();

        write_message(&mut client, r#"{"round":1}"#).await.unwrap();
        write_message(&mut client, r#"{"round":2}"#).await.unwrap();

        assert_eq!(read_with_timeout(&mut server).await.unwrap(), r#"{"round":1}"#);
        assert_eq!(read_with_timeout(&mut server).await.unwrap(), r#"{"round":2}"#);
    }

    #[tokio::test]
    async fn test_read_lf_lowercase_and_extra_headers() {
        let (mut client, mut server) = pipe();
        let body = r#"{"results":[]}"#;
        let raw = format!(
            "content-type: application/json\ncontent-length: {}\n\n{}",
            body.len(),
            body
        );
        client.write_all(raw.as_bytes()).await.unwrap();

        assert_eq!(read_with_timeout(&mut server).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_read_missing_content_length() {
        let (mut client, mut server) = pipe();
        client.write_all(b"X-Other: 1\r\n\r\n").await.unwrap();

        let err = read_with_timeout(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("Missing Content-Length"), "{}", err);
    }

    #[tokio::test]
    async fn test_read_invalid_content_length() {
        let (mut client, mut server) = pipe();
        client.write_all(b"Content-Length: lots\r\n\r\n").await.unwrap();

        let err = read_with_timeout(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("Invalid Content-Length"), "{}", err);
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_message() {
        let (mut client, mut server) = pipe();
        let raw = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_SIZE + 1);
        client.write_all(raw.as_bytes()).await.unwrap();

        let err = read_with_timeout(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"), "{}", err);
    }

    #[tokio::test]
    async fn test_closed_stream_is_an_error() {
        let (client, mut server) = pipe();
        drop(client);

        let err = read_with_timeout(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("closed"), "{}", err);
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let (mut client, mut server) = pipe();
        client.write_all(b"Content-Length: 10\r\n\r\n{}").await.unwrap();
        drop(client);

        let err = read_with_timeout(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("message body"), "{}", err);
    }
}
