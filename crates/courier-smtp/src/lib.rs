//! # courier-smtp
//!
//! SMTP submission client for transactional mail.
//!
//! ## Features
//!
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **Both TLS variants**: explicit TLS (`STARTTLS`, port 587) and implicit
//!   TLS (port 465), selected with [`Security::select`]
//! - **Authentication**: `AUTH LOGIN`
//! - **Deadlines**: every connect, handshake, read and write is bounded
//! - **Robust replies**: buffered line reader that handles split reads and
//!   multi-line continuations
//! - **Safe DATA**: CRLF normalization and dot-stuffing
//!
//! ## Quick Start
//!
//! ```ignore
//! use courier_smtp::{Address, Mailbox, HtmlMessage, RustlsConnector};
//! use courier_smtp::session::{send_mail, Credentials, Envelope, Security, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> courier_smtp::Result<()> {
//!     let config = SessionConfig::new("smtp.example.com")
//!         .port(587)
//!         .security(Security::select(587, Some("tls")))
//!         .credentials(Credentials::new("mailer@example.com", "secret"));
//!
//!     let from = Mailbox::with_name("Example", "mailer@example.com")?;
//!     let to = Address::new("customer@example.org")?;
//!     let message = HtmlMessage::new(from.clone(), to.clone(), "Hello", "<p>Hi</p>");
//!
//!     let envelope = Envelope { from: from.address, to };
//!     send_mail(&RustlsConnector::new()?, &config, &envelope, &message.to_bytes()).await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ── ehlo() / starttls() ──┐
//! └──────────────┘ <────────────────────────┘
//!        │
//!        └─ auth_login() ─→ Authenticated ─→ MailTransaction ─→ RecipientAdded ─→ Data
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Connection management and type-state client
//! - [`message`]: HTML message rendering and RFC 2047 subjects
//! - [`parser`]: Reply parser
//! - [`session`]: Complete single-recipient sessions
//! - [`types`]: Core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod message;
pub mod parser;
pub mod session;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Connector, Data, MailTransaction, RecipientAdded,
    RustlsConnector, ServerInfo, SmtpConnection, Timeouts,
};
pub use error::{Error, ErrorKind, Result};
pub use message::HtmlMessage;
pub use session::{Credentials, Envelope, Security, SessionConfig, send_mail};
pub use types::{Address, AuthMechanism, Extension, Mailbox, Reply, ReplyCode};
