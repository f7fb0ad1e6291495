//! Core identifier types for garage.
//!
//! Node identifiers are opaque strings, unique within a cluster. Cluster
//! names are unique within a cluster manager. Both travel through URL path
//! segments and script arguments, so they are validated on construction.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Maximum length accepted for any identifier.
pub const MAX_ID_LEN: usize = 128;

fn validate(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > MAX_ID_LEN {
        return Err(IdError::TooLong {
            max: MAX_ID_LEN,
            got: s.len(),
        });
    }
    if let Some(c) = s.chars().find(|c| *c == '/' || c.is_control()) {
        return Err(IdError::InvalidCharacter(c));
    }
    Ok(())
}

/// Identifier of a node within a cluster.
///
/// The value is opaque: numeric ids produced by range expansion and
/// arbitrary names are treated alike.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Parse a `NodeId`, validating its content.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty, too long, or contains `/` or
    /// control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        validate(&id)?;
        Ok(Self(id))
    }

    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Name of a cluster, unique within a cluster manager.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClusterName(String);

impl ClusterName {
    /// Parse a `ClusterName`, validating its content.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, too long, or contains `/` or
    /// control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClusterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClusterName({})", self.0)
    }
}

impl fmt::Display for ClusterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClusterName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ClusterName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClusterName> for String {
    fn from(name: ClusterName) -> Self {
        name.0
    }
}

impl Borrow<str> for ClusterName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty.
    #[error("identifier must not be empty")]
    Empty,

    /// The identifier exceeds the maximum length.
    #[error("identifier too long: max {max} bytes, got {got}")]
    TooLong {
        /// The maximum number of bytes.
        max: usize,
        /// The actual number of bytes.
        got: usize,
    },

    /// The identifier contains a character that cannot appear in a path segment.
    #[error("invalid character in identifier: {0:?}")]
    InvalidCharacter(char),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn node_id_accepts_numbers_and_names() {
        assert_eq!(NodeId::new("7").unwrap().as_str(), "7");
        assert_eq!(NodeId::new("web-a").unwrap().to_string(), "web-a");
    }

    #[test]
    fn node_id_rejects_empty() {
        assert_eq!(NodeId::new(""), Err(IdError::Empty));
    }

    #[test]
    fn node_id_rejects_path_separator() {
        assert_eq!(NodeId::new("a/b"), Err(IdError::InvalidCharacter('/')));
    }

    #[test]
    fn node_id_rejects_oversized() {
        let long = "x".repeat(MAX_ID_LEN + 1);
        assert!(matches!(NodeId::new(long), Err(IdError::TooLong { .. })));
    }

    #[test]
    fn cluster_name_from_str() {
        let name: ClusterName = "lab".parse().unwrap();
        assert_eq!(name.as_str(), "lab");
        assert!("".parse::<ClusterName>().is_err());
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut map = HashMap::new();
        map.insert(NodeId::new("3").unwrap(), 1);
        assert_eq!(map.get("3"), Some(&1));
    }

    #[test]
    fn node_id_serde_json() {
        let id = NodeId::new("12").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"12\"");
        let parsed: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
        assert!(serde_json::from_str::<NodeId>("\"\"").is_err());
    }
}
