//! Server replies.

/// A complete server reply, possibly assembled from several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit status.
    pub code: ReplyCode,
    /// Text of each line, without the code and separator.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true if the code is in `accepted`.
    #[must_use]
    pub fn is_one_of(&self, accepted: &[ReplyCode]) -> bool {
        accepted.contains(&self.code)
    }

    /// All lines joined with a space, for error messages.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

/// Three-digit SMTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// `220`, greeting and STARTTLS go-ahead.
    pub const SERVICE_READY: Self = Self(220);
    /// `221`, answer to QUIT.
    pub const CLOSING: Self = Self(221);
    /// `235`, AUTH accepted.
    pub const AUTH_SUCCESS: Self = Self(235);
    /// `250`, command completed.
    pub const OK: Self = Self(250);
    /// `251`, recipient not local, will forward.
    pub const FORWARD: Self = Self(251);
    /// `334`, AUTH challenge.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// `354`, send the message.
    pub const START_DATA: Self = Self(354);
    /// `503`, bad sequence; after AUTH it means already authenticated.
    pub const BAD_SEQUENCE: Self = Self(503);
    /// `535`, credentials rejected.
    pub const AUTH_REJECTED: Self = Self(535);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Numeric value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_codes() {
        let reply = Reply::new(ReplyCode::FORWARD, vec!["will forward".into()]);
        assert!(reply.is_one_of(&[ReplyCode::OK, ReplyCode::FORWARD]));
        assert!(!reply.is_one_of(&[ReplyCode::OK]));
    }

    #[test]
    fn text_joins_lines() {
        let reply = Reply::new(
            ReplyCode::AUTH_REJECTED,
            vec!["5.7.8 Username and Password not accepted.".into(), "Learn more".into()],
        );
        assert_eq!(reply.text(), "5.7.8 Username and Password not accepted. Learn more");
        assert_eq!(reply.code.to_string(), "535");
    }
}
