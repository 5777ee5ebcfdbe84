//! Low-level SMTP stream handling.

use super::{Connector, Timeouts};
use crate::error::{Error, Result};
use std::future::Future;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Longest reply line accepted from a server, terminator included.
const MAX_LINE_LENGTH: usize = 4096;

/// Any bidirectional byte stream a session can run over.
pub trait AsyncIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncIo for T {}

/// Type-erased socket (plain TCP, TLS, or a test double).
pub type BoxedIo = Box<dyn AsyncIo>;

/// SMTP stream: a buffered line reader over a plain or encrypted socket.
pub struct SmtpStream {
    reader: BufReader<BoxedIo>,
    encrypted: bool,
    timeouts: Timeouts,
}

impl std::fmt::Debug for SmtpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpStream")
            .field("encrypted", &self.encrypted)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl SmtpStream {
    /// Wraps an established socket.
    #[must_use]
    pub fn new(io: BoxedIo, encrypted: bool, timeouts: Timeouts) -> Self {
        Self {
            reader: BufReader::new(io),
            encrypted,
            timeouts,
        }
    }

    /// Returns true once the stream runs over TLS.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Returns the deadlines this stream applies.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Reads one CRLF-terminated line, with the terminator stripped.
    ///
    /// Bytes are accumulated across as many socket reads as it takes to see
    /// the line feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or times out, if the peer closes the
    /// connection before the line is complete, or if the line is too long.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let limit = MAX_LINE_LENGTH as u64;
        let reader = &mut self.reader;
        let read = with_deadline("read", self.timeouts.io, async {
            (&mut *reader).take(limit).read_until(b'\n', &mut buf).await
        })
        .await??;

        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        if !buf.ends_with(b"\n") {
            return if buf.len() >= MAX_LINE_LENGTH {
                Err(Error::Protocol(format!(
                    "Reply line exceeds {MAX_LINE_LENGTH} bytes"
                )))
            } else {
                Err(Error::ConnectionClosed)
            };
        }

        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or times out.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let io = self.reader.get_mut();
        with_deadline("write", self.timeouts.io, async {
            io.write_all(data).await?;
            io.flush().await
        })
        .await??;
        Ok(())
    }

    /// Upgrades a plaintext stream to TLS in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted, if the server sent
    /// bytes ahead of the handshake, or if the handshake fails.
    pub async fn upgrade<C: Connector + ?Sized>(self, connector: &C, hostname: &str) -> Result<Self> {
        if self.encrypted {
            return Err(Error::Protocol("Already using TLS".into()));
        }
        // Anything buffered now arrived in plaintext and must not be read as TLS-protected.
        if !self.reader.buffer().is_empty() {
            return Err(Error::Protocol(
                "Server sent data before TLS negotiation".into(),
            ));
        }

        let timeouts = self.timeouts;
        let io = connector
            .upgrade(self.reader.into_inner(), hostname, &timeouts)
            .await?;
        Ok(Self::new(io, true, timeouts))
    }
}

/// Runs `fut`, failing with [`Error::Timeout`] once `after` elapses.
pub(crate) async fn with_deadline<F: Future>(
    operation: &'static str,
    after: std::time::Duration,
    fut: F,
) -> Result<F::Output> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| Error::Timeout { operation, after })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::io::Builder;

    fn stream(mock: tokio_test::io::Mock) -> SmtpStream {
        SmtpStream::new(Box::new(mock), false, Timeouts::uniform(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn line_split_across_reads() {
        let mock = Builder::new().read(b"250-smtp.exa").read(b"mple.com\r\n250 OK\r\n").build();
        let mut stream = stream(mock);
        assert_eq!(stream.read_line().await.unwrap(), "250-smtp.example.com");
        assert_eq!(stream.read_line().await.unwrap(), "250 OK");
    }

    #[tokio::test]
    async fn eof_is_connection_closed() {
        let mock = Builder::new().read(b"250 partial").build();
        let mut stream = stream(mock);
        assert!(matches!(
            stream.read_line().await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn overlong_line_rejected() {
        let long = vec![b'a'; MAX_LINE_LENGTH + 10];
        let mock = Builder::new().read(&long).build();
        let mut stream = stream(mock);
        assert!(matches!(stream.read_line().await, Err(Error::Protocol(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn read_deadline() {
        let mock = Builder::new().wait(Duration::from_secs(600)).build();
        let mut stream = stream(mock);
        let err = stream.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Timeout { operation: "read", .. }));
    }

    #[tokio::test]
    async fn write_goes_through() {
        let mock = Builder::new().write(b"NOOP\r\n").build();
        let mut stream = stream(mock);
        stream.write_all(b"NOOP\r\n").await.unwrap();
    }
}
