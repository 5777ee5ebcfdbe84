//! Session state machine.
//!
//! Each state is a marker type; a method is only callable in the states
//! where the command is valid.

use super::stream::with_deadline;
use super::{Connector, ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::marker::PhantomData;

/// Greeting read; EHLO, STARTTLS, AUTH and MAIL are allowed.
#[derive(Debug)]
pub struct Connected;

/// AUTH completed, or the message was accepted and the session can be reused.
#[derive(Debug)]
pub struct Authenticated;

/// `MAIL FROM` accepted.
#[derive(Debug)]
pub struct MailTransaction;

/// At least one `RCPT TO` accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// `DATA` accepted; the server waits for the message.
#[derive(Debug)]
pub struct Data;

/// An SMTP session in state `State`.
///
/// Every transition consumes the client. A reply with an unexpected code
/// returns an error and drops the connection, so no further command can be
/// sent on a session that went wrong.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

/// Accessors shared by every state.
pub trait SmtpConnection {
    /// Greeting hostname and latest EHLO capabilities.
    fn server_info(&self) -> &ServerInfo;

    /// Returns true once the session runs over TLS.
    fn is_encrypted(&self) -> bool;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn is_encrypted(&self) -> bool {
        self.stream.is_encrypted()
    }
}

impl Client<Connected> {
    /// Reads the greeting from a fresh stream.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if it is not a 220.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?;
        tracing::debug!(code = %greeting.code, "S: greeting");
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::unexpected(
                "<greeting>",
                &[ReplyCode::SERVICE_READY.as_u16()],
                greeting.code.as_u16(),
                greeting.text(),
            ));
        }

        let hostname = greeting
            .lines
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: Vec::new(),
            },
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command is not answered with 250.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let cmd = Command::Ehlo {
            hostname: client_hostname.to_string(),
        };
        let reply = self.expect(cmd, &[ReplyCode::OK]).await?;

        // line 0 echoes the greeting
        self.server_info.extensions = reply
            .lines
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();

        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS, then repeats EHLO over
    /// the encrypted channel.
    ///
    /// Nothing is sent if the last EHLO reply did not advertise STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised, is refused, or if the
    /// handshake or the second EHLO fails.
    pub async fn starttls<C: Connector + ?Sized>(
        mut self,
        connector: &C,
        server_hostname: &str,
        client_hostname: &str,
    ) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::StartTlsUnavailable);
        }

        self.expect(Command::StartTls, &[ReplyCode::SERVICE_READY])
            .await?;

        self.stream = self.stream.upgrade(connector, server_hostname).await?;
        self.server_info.extensions.clear();

        self.ehlo(client_hostname).await
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// The exchange is `AUTH LOGIN` (334), base64 username (334), base64
    /// secret (235). A final 503 means the session is already authenticated
    /// and is accepted as success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if any step of the exchange gets another reply.
    pub async fn auth_login(
        mut self,
        username: &str,
        secret: &str,
    ) -> Result<Client<Authenticated>> {
        const CONTINUE: &[ReplyCode] = &[ReplyCode::AUTH_CONTINUE];
        const DONE: &[ReplyCode] = &[ReplyCode::AUTH_SUCCESS, ReplyCode::BAD_SEQUENCE];

        let advertised = self.server_info.auth_mechanisms();
        if !advertised.is_empty() && !advertised.contains(&AuthMechanism::Login) {
            tracing::debug!(?advertised, "Server does not advertise AUTH LOGIN, trying anyway");
        }

        let steps = [
            (
                Command::Auth {
                    mechanism: AuthMechanism::Login,
                },
                CONTINUE,
            ),
            (
                Command::AuthResponse {
                    encoded: STANDARD.encode(username.as_bytes()),
                },
                CONTINUE,
            ),
            (
                Command::AuthResponse {
                    encoded: STANDARD.encode(secret.as_bytes()),
                },
                DONE,
            ),
        ];

        for (cmd, expected) in steps {
            let reply = self.send_command(cmd).await?;
            if !reply.is_one_of(expected) {
                return Err(Error::Auth {
                    code: reply.code.as_u16(),
                    message: reply.text(),
                });
            }
            if reply.code == ReplyCode::BAD_SEQUENCE {
                tracing::debug!("Server reports session already authenticated");
            }
        }

        Ok(self.transition())
    }

    /// Opens a transaction without authenticating.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command is not answered with 250.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<MailTransaction>> {
        self.expect(Command::MailFrom { from }, &[ReplyCode::OK])
            .await?;
        Ok(self.transition())
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command is not answered with 250.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<MailTransaction>> {
        self.expect(Command::MailFrom { from }, &[ReplyCode::OK])
            .await?;
        Ok(self.transition())
    }
}

impl Client<MailTransaction> {
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command is not answered with 250 or 251.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded>> {
        self.expect(Command::RcptTo { to }, &[ReplyCode::OK, ReplyCode::FORWARD])
            .await?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command is not answered with 250 or 251.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        self.expect(Command::RcptTo { to }, &[ReplyCode::OK, ReplyCode::FORWARD])
            .await?;
        Ok(self)
    }

    /// Asks to send the message.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command is not answered with 354.
    pub async fn data(mut self) -> Result<Client<Data>> {
        self.expect(Command::Data, &[ReplyCode::START_DATA]).await?;
        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed, and the terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails or the server does not answer 250.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Authenticated>> {
        let payload = encode_data(message);
        self.stream.write_all(&payload).await?;
        tracing::debug!(bytes = payload.len(), "C: <message data>");

        let reply = read_reply(&mut self.stream).await?;
        tracing::debug!(code = %reply.code, "S: end of data");
        if reply.code != ReplyCode::OK {
            return Err(Error::unexpected(
                "end of DATA",
                &[ReplyCode::OK.as_u16()],
                reply.code.as_u16(),
                reply.text(),
            ));
        }

        Ok(self.transition())
    }
}

impl<S> Client<S> {
    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        tracing::debug!(command = cmd.name(), "C:");
        self.stream.write_all(&cmd.serialize()).await?;
        let reply = read_reply(&mut self.stream).await?;
        tracing::debug!(command = cmd.name(), code = %reply.code, "S:");
        Ok(reply)
    }

    async fn expect(&mut self, cmd: Command, expected: &[ReplyCode]) -> Result<Reply> {
        let name = cmd.name();
        let reply = self.send_command(cmd).await?;
        if reply.is_one_of(expected) {
            Ok(reply)
        } else {
            let codes: Vec<u16> = expected.iter().map(|c| c.as_u16()).collect();
            Err(Error::unexpected(
                name,
                &codes,
                reply.code.as_u16(),
                reply.text(),
            ))
        }
    }

    /// Sends QUIT and drops the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT is not answered with 221 or 250.
    pub async fn quit(mut self) -> Result<()> {
        self.expect(Command::Quit, &[ReplyCode::CLOSING, ReplyCode::OK])
            .await?;
        Ok(())
    }
}

/// Most lines accepted in one reply.
const MAX_REPLY_LINES: usize = 512;

/// Reads one complete reply. The I/O deadline also bounds the whole reply,
/// so a server cannot stall the session by trickling continuation lines.
async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let deadline = stream.timeouts().io;
    let lines = with_deadline("reply", deadline, read_reply_lines(stream)).await??;
    parse_reply(&lines)
}

async fn read_reply_lines(stream: &mut SmtpStream) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        let is_last = is_last_reply_line(&line);
        lines.push(line);
        if is_last {
            return Ok(lines);
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(Error::Protocol(format!(
                "Reply exceeds {MAX_REPLY_LINES} lines"
            )));
        }
    }
}

/// Prepares message bytes for the DATA phase.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let body = message
        .strip_suffix(b"\n")
        .map_or(message, |m| m.strip_suffix(b"\r").unwrap_or(m));

    let mut out = Vec::with_capacity(body.len() + body.len() / 64 + 5);
    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::Timeouts;
    use std::time::Duration;
    use tokio_test::io::Builder;

    fn stream(mock: tokio_test::io::Mock) -> SmtpStream {
        SmtpStream::new(Box::new(mock), false, Timeouts::uniform(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn multi_line_reply_within_limit() {
        let mut script = "250-line\r\n".repeat(MAX_REPLY_LINES - 1);
        script.push_str("250 done\r\n");
        let mut stream = stream(Builder::new().read(script.as_bytes()).build());
        let reply = read_reply(&mut stream).await.unwrap();
        assert_eq!(reply.lines.len(), MAX_REPLY_LINES);
        assert_eq!(reply.lines.last().map(String::as_str), Some("done"));
    }

    #[tokio::test]
    async fn endless_continuation_is_rejected() {
        let script = "220-xxxxxxxx\r\n".repeat(MAX_REPLY_LINES);
        let mut stream = stream(Builder::new().read(script.as_bytes()).build());
        let err = read_reply(&mut stream).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ref m) if m.contains("512 lines")));
    }

    #[tokio::test(start_paused = true)]
    async fn trickled_reply_hits_the_reply_deadline() {
        let mock = Builder::new()
            .read(b"220-one\r\n")
            .wait(Duration::from_secs(4))
            .read(b"220-two\r\n")
            .wait(Duration::from_secs(4))
            .build();
        let mut stream = stream(mock);
        let err = read_reply(&mut stream).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { operation: "reply", .. }));
    }

    #[test]
    fn encode_data_normalizes_line_endings() {
        assert_eq!(encode_data(b"a\nb\r\nc"), b"a\r\nb\r\nc\r\n.\r\n");
    }

    #[test]
    fn encode_data_keeps_single_trailing_newline() {
        assert_eq!(encode_data(b"line\r\n"), b"line\r\n.\r\n");
        assert_eq!(encode_data(b"line\r\n\r\n"), b"line\r\n\r\n.\r\n");
    }

    #[test]
    fn encode_data_dot_stuffs() {
        assert_eq!(
            encode_data(b"<p>x</p>\r\n.\r\n..hidden\r\nend"),
            b"<p>x</p>\r\n..\r\n...hidden\r\nend\r\n.\r\n"
        );
    }

    #[test]
    fn encode_data_empty_message() {
        assert_eq!(encode_data(b""), b".\r\n");
    }
}
