//! EHLO capabilities.

/// One capability line of an EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// `STARTTLS`.
    StartTls,
    /// `AUTH` with the mechanisms this client knows.
    Auth(Vec<AuthMechanism>),
    /// `SIZE`, with the limit in bytes when given.
    Size(Option<u64>),
    /// `8BITMIME`.
    EightBitMime,
    /// Anything else, kept verbatim.
    Other(String),
}

impl Extension {
    /// Parses one EHLO line (the text after `250-`/`250 `).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (keyword, params) = line.split_once(' ').unwrap_or((line, ""));

        if keyword.eq_ignore_ascii_case("STARTTLS") {
            Self::StartTls
        } else if keyword.eq_ignore_ascii_case("AUTH") {
            Self::Auth(
                params
                    .split_whitespace()
                    .filter_map(AuthMechanism::parse)
                    .collect(),
            )
        } else if keyword.eq_ignore_ascii_case("SIZE") {
            Self::Size(params.trim().parse().ok())
        } else if keyword.eq_ignore_ascii_case("8BITMIME") {
            Self::EightBitMime
        } else {
            Self::Other(line.to_string())
        }
    }
}

/// SASL mechanisms recognized in an `AUTH` capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// `LOGIN`, the mechanism this client uses.
    Login,
    /// `PLAIN`.
    Plain,
}

impl AuthMechanism {
    /// Parses a mechanism name, ignoring case.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("LOGIN") {
            Some(Self::Login)
        } else if name.eq_ignore_ascii_case("PLAIN") {
            Some(Self::Plain)
        } else {
            None
        }
    }

    /// Name as sent after `AUTH`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Plain => "PLAIN",
        }
    }
}
