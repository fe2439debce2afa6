//! Question identifiers
//!
//! Provides [`QuestionId`] for addressing questions in the store.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Hierarchical question identifier
///
/// The identity of a question is the full string; segments are derived on
/// demand by splitting on `/`.
///
/// # Examples
/// - `migration-assistant/partitions`
/// - `migration-assistant/hda1/jdoe/items`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    /// Create an identifier without validation
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Full identifier string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments().count()
    }

    /// Check if the identifier is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// Segment between the last two separators
    ///
    /// For `migration-assistant/hda1/alice/password` this is `alice`.
    /// Returns `None` when the identifier has a single segment.
    #[must_use]
    pub fn parent_segment(&self) -> Option<&str> {
        let (head, _) = self.0.rsplit_once('/')?;
        head.rsplit('/').next()
    }
}

impl Display for QuestionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QuestionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QuestionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for QuestionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl FromStr for QuestionId {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        if s.split('/').any(str::is_empty) {
            return Err(PathError::EmptySegment(s.to_string()));
        }
        if s.contains(char::is_whitespace) {
            return Err(PathError::Whitespace(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// Errors related to question identifiers
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    /// Empty identifier
    #[error("question identifier is empty")]
    Empty,

    /// Empty segment between separators
    #[error("question identifier '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Whitespace is not allowed in identifiers
    #[error("question identifier '{0}' contains whitespace")]
    Whitespace(String),
}
