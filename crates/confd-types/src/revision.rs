//! Commit revision numbering.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A numbered point in commit history.
///
/// Revision numbers start at 1 and increase by exactly one per committed
/// revision. Ordering is numeric, not lexical, so revision 10 sorts after
/// revision 9.
///
/// # Examples
///
/// ```
/// use confd_types::RevisionId;
///
/// let rev = RevisionId::FIRST;
/// assert_eq!(rev.value(), 1);
/// assert_eq!(rev.next().value(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevisionId(u64);

impl RevisionId {
    /// The first revision ever committed.
    pub const FIRST: RevisionId = RevisionId(1);

    /// Creates a revision id from a raw number.
    ///
    /// # Errors
    ///
    /// Returns an error for revision 0, which is never assigned.
    pub const fn new(number: u64) -> Result<Self, ParseError> {
        if number == 0 {
            return Err(ParseError::InvalidRevision(String::new()));
        }
        Ok(RevisionId(number))
    }

    /// Returns the raw revision number.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the revision that follows this one.
    pub const fn next(&self) -> RevisionId {
        RevisionId(self.0 + 1)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RevisionId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number: u64 = s
            .parse()
            .map_err(|_| ParseError::InvalidRevision(s.to_string()))?;
        RevisionId::new(number).map_err(|_| ParseError::InvalidRevision(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_and_next() {
        assert_eq!(RevisionId::FIRST.value(), 1);
        assert_eq!(RevisionId::FIRST.next().value(), 2);
    }

    #[test]
    fn test_zero_rejected() {
        assert!(RevisionId::new(0).is_err());
        assert!("0".parse::<RevisionId>().is_err());
    }

    #[test]
    fn test_numeric_ordering() {
        let r9: RevisionId = "9".parse().unwrap();
        let r10: RevisionId = "10".parse().unwrap();
        assert!(r9 < r10);
    }

    #[test]
    fn test_parse_garbage() {
        assert!("abc".parse::<RevisionId>().is_err());
        assert!("".parse::<RevisionId>().is_err());
    }
}
