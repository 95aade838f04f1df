//! Screen names claimed by chat participants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

/// A validated, non-blank screen name.
///
/// Surrounding whitespace is trimmed on construction, so `" bob "` and
/// `"bob"` name the same participant and `NAMEACCEPTED` echoes the trimmed
/// form. This normalisation is deliberate: a raw line is never claimed
/// as-is. Comparison is exact (case-sensitive) on the trimmed text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScreenName(String);

impl ScreenName {
    /// Parses a proposed screen name from a raw client line.
    ///
    /// # Errors
    ///
    /// - `DomainError::BlankName` if nothing but whitespace remains
    /// - `DomainError::MultiLineName` if the name spans lines
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::BlankName);
        }
        if trimmed.contains(['\n', '\r']) {
            return Err(DomainError::MultiLineName(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ScreenName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ScreenName> for String {
    fn from(name: ScreenName) -> Self {
        name.0
    }
}

impl AsRef<str> for ScreenName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let name = ScreenName::parse("  alice \r").unwrap();
        assert_eq!(name.as_str(), "alice");
    }

    #[test]
    fn test_blank_names_rejected() {
        assert_eq!(ScreenName::parse(""), Err(DomainError::BlankName));
        assert_eq!(ScreenName::parse("   "), Err(DomainError::BlankName));
        assert_eq!(ScreenName::parse("\t\r\n"), Err(DomainError::BlankName));
    }

    #[test]
    fn test_embedded_newline_rejected() {
        let result = ScreenName::parse("bob\ncarol");
        assert!(matches!(result, Err(DomainError::MultiLineName(_))));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let lower = ScreenName::parse("bob").unwrap();
        let upper = ScreenName::parse("Bob").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_serde_validates() {
        let name: ScreenName = serde_json::from_str("\" carol \"").unwrap();
        assert_eq!(name.as_str(), "carol");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"carol\"");

        let blank: Result<ScreenName, _> = serde_json::from_str("\"  \"");
        assert!(blank.is_err());
    }
}
