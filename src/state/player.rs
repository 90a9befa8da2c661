use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Longest identity token accepted from clients.
const MAX_PLAYER_ID_LENGTH: usize = 64;

/// Opaque anonymous identity issued to a device/browser.
///
/// The token is only ever compared and used as a key. It is restricted to
/// `[A-Za-z0-9_-]` so it can safely be embedded in document field paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

/// Error returned when a client supplies a malformed identity token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerIdError {
    /// The token is empty after trimming.
    #[error("player id must not be empty")]
    Empty,
    /// The token exceeds [`MAX_PLAYER_ID_LENGTH`].
    #[error("player id must be at most {MAX_PLAYER_ID_LENGTH} characters")]
    TooLong,
    /// The token contains a character outside `[A-Za-z0-9_-]`.
    #[error("player id contains invalid character `{0}`")]
    InvalidCharacter(char),
}

impl PlayerId {
    /// Mint a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parse a client-supplied identity token.
    pub fn parse(value: &str) -> Result<Self, PlayerIdError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(PlayerIdError::Empty);
        }
        if value.len() > MAX_PLAYER_ID_LENGTH {
            return Err(PlayerIdError::TooLong);
        }
        if let Some(invalid) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(PlayerIdError::InvalidCharacter(invalid));
        }
        Ok(Self(value.to_owned()))
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlayerId {
    type Error = PlayerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlayerId> for String {
    fn from(value: PlayerId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_parse_back() {
        let id = PlayerId::generate();
        assert_eq!(PlayerId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn rejects_path_characters() {
        assert_eq!(
            PlayerId::parse("abc.def"),
            Err(PlayerIdError::InvalidCharacter('.'))
        );
        assert_eq!(
            PlayerId::parse("$where"),
            Err(PlayerIdError::InvalidCharacter('$'))
        );
        assert_eq!(PlayerId::parse("   "), Err(PlayerIdError::Empty));
        assert_eq!(PlayerId::parse(&"a".repeat(65)), Err(PlayerIdError::TooLong));
    }
}
