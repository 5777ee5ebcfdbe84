//! Envelope addresses and header mailboxes.

use crate::error::{Error, Result};

/// A bare `local@domain` address.
///
/// Only the shape the wire needs is checked: exactly one `@`, both sides
/// non-empty, and nothing that could break out of `<...>` in `MAIL FROM` or
/// `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Parses an address, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] when the shape is wrong.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let raw = addr.into();
        let addr = raw.trim();
        check_shape(addr).map_err(|reason| Error::InvalidAddress(format!("{reason}: {addr:?}")))?;
        Ok(Self(addr.to_owned()))
    }

    /// The address text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_shape(addr: &str) -> std::result::Result<(), &'static str> {
    if addr.is_empty() {
        return Err("empty address");
    }
    if addr
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || matches!(c, '<' | '>'))
    {
        return Err("forbidden character in address");
    }
    match addr.split('@').collect::<Vec<_>>().as_slice() {
        [local, domain] if !local.is_empty() && !domain.is_empty() => Ok(()),
        [_, _] => Err("empty local part or domain"),
        _ => Err("address needs exactly one @"),
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// An address with an optional display name, as used in `From`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name; `None` when blank.
    pub name: Option<String>,
    /// Address part.
    pub address: Address,
}

impl Mailbox {
    /// A mailbox without a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Address::new(address).map(|address| Self { name: None, address })
    }

    /// A mailbox with a display name. A blank name counts as none.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let mut mailbox = Self::new(address)?;
        if !name.trim().is_empty() {
            mailbox.name = Some(name);
        }
        Ok(mailbox)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_and_trims() {
        let addr = Address::new("  user@example.com\t").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "user@example.com");
        assert_eq!("ops@mail.example.org".parse::<Address>().unwrap().as_str(), "ops@mail.example.org");
    }

    #[test]
    fn rejects_bad_shapes() {
        for bad in ["", "   ", "userexample.com", "a@b@example.com", "@example.com", "user@"] {
            assert!(Address::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn rejects_wire_breaking_characters() {
        assert!(Address::new("user@example.com>\r\nRCPT TO:<victim@example.com").is_err());
        assert!(Address::new("us er@example.com").is_err());
        assert!(Address::new("<user@example.com>").is_err());
    }

    #[test]
    fn error_names_the_problem() {
        let err = Address::new("a@b@c").unwrap_err();
        assert!(err.to_string().contains("exactly one @"));
    }

    #[test]
    fn mailbox_names() {
        let named = Mailbox::with_name("Support Team", "support@example.com").unwrap();
        assert_eq!(named.name.as_deref(), Some("Support Team"));
        assert_eq!(named.address.as_str(), "support@example.com");

        let blank = Mailbox::with_name("  ", "support@example.com").unwrap();
        assert!(blank.name.is_none());
        assert!(Mailbox::new("nope").is_err());
    }
}
