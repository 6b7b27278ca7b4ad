use crate::TransportError;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Write one LF-terminated line and close our write half.
///
/// A trailing LF is appended when `data` does not already end with one.
pub(crate) async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> std::io::Result<()> {
    writer.write_all(data).await?;
    if data.last() != Some(&b'\n') {
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    writer.shutdown().await
}

/// Read exactly one LF-terminated line, at most `max_size` bytes.
///
/// The returned bytes include the LF.
pub(crate) async fn read_line<R: AsyncRead + Unpin>(
    reader: R,
    max_size: usize,
) -> Result<Vec<u8>, TransportError> {
    use tokio::io::AsyncReadExt;

    // One byte past the limit so an oversize line is detectable.
    let limited = reader.take(max_size as u64 + 1);
    let mut reader = BufReader::new(limited);
    let mut buf = Vec::new();
    reader
        .read_until(b'\n', &mut buf)
        .await
        .map_err(TransportError::Receive)?;

    if buf.len() > max_size {
        return Err(TransportError::MessageTooLarge {
            size: buf.len(),
            max: max_size,
        });
    }
    if buf.last() != Some(&b'\n') {
        return Err(TransportError::UnexpectedEof(buf.len()));
    }
    Ok(buf)
}

/// Internal state shared with the accept loop.
pub(crate) struct HandlerState {
    pub incoming_tx: mpsc::Sender<Vec<u8>>,
    pub max_message_size: usize,
    pub read_timeout: Duration,
}

/// Pause after a failed accept (e.g. EMFILE) before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

async fn accept_backoff(error: &std::io::Error) {
    tracing::warn!("accept failed: {error}");
    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
}

/// Accept connections forever, one reader task per connection.
pub(crate) async fn accept_loop(listener: TcpListener, state: Arc<HandlerState>) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                accept_backoff(&e).await;
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            handle_connection(stream, remote, &state).await;
        });
    }
}

async fn handle_connection(stream: TcpStream, remote: SocketAddr, state: &HandlerState) {
    let read = tokio::time::timeout(
        state.read_timeout,
        read_line(stream, state.max_message_size),
    )
    .await
    .unwrap_or(Err(TransportError::ReadTimeout(state.read_timeout)));

    match read {
        Ok(line) => {
            tracing::trace!("read {} bytes from {remote}", line.len());
            if state.incoming_tx.send(line).await.is_err() {
                tracing::debug!("receiver gone, dropping line from {remote}");
            }
        }
        Err(e) => {
            tracing::warn!("dropping connection from {remote}: {e}");
        }
    }
    // stream dropped here: connection closed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_line_stops_at_first_lf() {
        let data: &[u8] = b"M\t3\t1\nP\t3\t2\n";
        let line = read_line(data, 64).await.unwrap();
        assert_eq!(line, b"M\t3\t1\n");
    }

    #[tokio::test]
    async fn read_line_rejects_oversize() {
        let data = vec![b'x'; 100];
        let err = read_line(&data[..], 16).await.unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge { max: 16, .. }));
    }

    #[tokio::test]
    async fn read_line_at_exact_limit_is_accepted() {
        let data: &[u8] = b"T\t9\t9\n";
        let line = read_line(data, data.len()).await.unwrap();
        assert_eq!(line, data);
    }

    #[tokio::test]
    async fn read_line_without_lf_is_eof() {
        let data: &[u8] = b"M\t3";
        let err = read_line(data, 64).await.unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedEof(3)));
    }

    #[tokio::test]
    async fn write_line_appends_missing_lf() {
        let mut out = Vec::new();
        write_line(&mut out, b"R\t5\t2").await.unwrap();
        assert_eq!(out, b"R\t5\t2\n");

        let mut out = Vec::new();
        write_line(&mut out, b"R\t5\t2\n").await.unwrap();
        assert_eq!(out, b"R\t5\t2\n");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_accept_waits_before_retrying() {
        let start = tokio::time::Instant::now();
        let error = std::io::Error::other("too many open files");
        accept_backoff(&error).await;
        assert!(start.elapsed() >= ACCEPT_RETRY_DELAY);
    }
}
