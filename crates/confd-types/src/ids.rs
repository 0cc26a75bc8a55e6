//! Session, persist-id and user identity types.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length for session and persist identifiers.
const MAX_ID_LEN: usize = 64;

fn valid_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Name of a configuration session.
///
/// Session ids are chosen by clients (an interactive shell typically uses
/// its terminal id) or generated by the registry. They are restricted to a
/// conservative character set so they can appear in log lines and persist
/// ids without quoting.
///
/// # Examples
///
/// ```
/// use confd_types::SessionId;
///
/// let id: SessionId = "cli-tty1".parse().unwrap();
/// assert_eq!(id.as_str(), "cli-tty1");
///
/// assert!("".parse::<SessionId>().is_err());
/// assert!("bad id".parse::<SessionId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id, validating the character set and length.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_ID_LEN || !id.chars().all(valid_id_char) {
            return Err(ParseError::InvalidSessionId(id));
        }
        Ok(SessionId(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionId::new(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        SessionId::new(s)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> String {
        id.0
    }
}

/// Token addressing a pending confirmed commit.
///
/// A persist id outlives the connection that issued the confirmed commit,
/// so confirmation or cancellation can come from a different process. The
/// default generation scheme is `<session-id>-c<N>` with a process-wide
/// counter; callers may also supply their own token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PersistId(String);

impl PersistId {
    /// Creates a persist id from a non-empty string.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        if id.is_empty() || id.len() > 2 * MAX_ID_LEN {
            return Err(ParseError::InvalidPersistId(id));
        }
        Ok(PersistId(id))
    }

    /// Builds the default persist id for a session: `<session-id>-c<seq>`.
    pub fn for_session(session: &SessionId, seq: u64) -> Self {
        PersistId(format!("{}-c{}", session.as_str(), seq))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PersistId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PersistId::new(s)
    }
}

impl TryFrom<String> for PersistId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        PersistId::new(s)
    }
}

impl From<PersistId> for String {
    fn from(id: PersistId) -> String {
        id.0
    }
}

/// Numeric user identity of a caller, as reported by the RPC transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(u32);

impl Uid {
    /// Creates a uid.
    pub const fn new(uid: u32) -> Self {
        Uid(uid)
    }

    /// Returns the raw uid value.
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns true if this is uid 0.
    pub const fn is_root(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Uid {
    fn from(uid: u32) -> Self {
        Uid(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_session_ids() {
        assert!(SessionId::new("cli-tty1").is_ok());
        assert!(SessionId::new("a").is_ok());
        assert!(SessionId::new("rpc_4711.0").is_ok());
    }

    #[test]
    fn test_invalid_session_ids() {
        assert!(SessionId::new("").is_err());
        assert!(SessionId::new("has space").is_err());
        assert!(SessionId::new("slash/y").is_err());
        assert!(SessionId::new("x".repeat(65)).is_err());
    }

    #[test]
    fn test_persist_id_for_session() {
        let session = SessionId::new("cli-tty1").unwrap();
        let pid = PersistId::for_session(&session, 3);
        assert_eq!(pid.as_str(), "cli-tty1-c3");
    }

    #[test]
    fn test_persist_id_rejects_empty() {
        assert!(PersistId::new("").is_err());
        assert!(PersistId::new("token").is_ok());
    }

    #[test]
    fn test_uid() {
        let uid = Uid::new(100);
        assert_eq!(uid.value(), 100);
        assert!(!uid.is_root());
        assert!(Uid::new(0).is_root());
        assert_eq!(uid.to_string(), "100");
    }

    #[test]
    fn test_session_id_serde_round_trip() {
        let id = SessionId::new("cli-tty1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"cli-tty1\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
