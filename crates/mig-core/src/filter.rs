//! Question subscription filter
//!
//! Patterns are globs anchored at both ends where `*` matches any run of
//! characters, `/` included. `migration-assistant/partitions*` is therefore
//! a prefix match and `ubiquity/run-ma-again` an exact one. The literal
//! pattern [`ERROR_SENTINEL`] subscribes to every error event whatever its
//! identifier.

use crate::error::FilterError;
use mig_store::QuestionId;
use regex::RegexSet;

/// Pattern that accepts every error-class event
pub const ERROR_SENTINEL: &str = "ERROR";

/// Kind of event delivered by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// A question to answer
    Question,
    /// An error raised against a question
    Error,
}

/// Decides whether the negotiator owns a question
#[derive(Debug, Clone)]
pub struct QuestionFilter {
    patterns: Vec<String>,
    set: RegexSet,
    accept_errors: bool,
}

impl QuestionFilter {
    /// Compile a pattern set
    ///
    /// # Errors
    /// - `FilterError::EmptyPattern` if any pattern is empty
    /// - `FilterError::Regex` if the compiled set is rejected
    pub fn new<I, S>(patterns: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if patterns.iter().any(String::is_empty) {
            return Err(FilterError::EmptyPattern);
        }

        let accept_errors = patterns.iter().any(|p| p == ERROR_SENTINEL);
        let globs: Vec<String> = patterns
            .iter()
            .filter(|p| *p != ERROR_SENTINEL)
            .map(|p| glob_to_regex(p))
            .collect();

        Ok(Self {
            set: RegexSet::new(&globs)?,
            patterns,
            accept_errors,
        })
    }

    /// Whether an event for `question` is accepted
    #[must_use]
    pub fn accepts(&self, question: &QuestionId, class: EventClass) -> bool {
        if class == EventClass::Error && self.accept_errors {
            return true;
        }
        self.set.is_match(question.as_str())
    }

    /// Glob patterns matching `question`, in declaration order
    #[must_use]
    pub fn matching_patterns(&self, question: &QuestionId) -> Vec<&str> {
        let globs: Vec<&str> = self
            .patterns
            .iter()
            .map(String::as_str)
            .filter(|p| *p != ERROR_SENTINEL)
            .collect();
        self.set
            .matches(question.as_str())
            .into_iter()
            .map(|i| globs[i])
            .collect()
    }

    /// Patterns as declared
    #[inline]
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether the error sentinel is present
    #[inline]
    #[must_use]
    pub fn accepts_all_errors(&self) -> bool {
        self.accept_errors
    }
}

/// Translate a glob into an anchored regular expression
#[must_use]
pub fn glob_to_regex(glob: &str) -> String {
    let body: Vec<String> = glob.split('*').map(regex::escape).collect();
    format!("^{}$", body.join(".*"))
}
