//! Error types for the question store

/// Errors surfaced by a [`ConfigStore`](crate::ConfigStore)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The question does not exist in the store
    #[error("{0} doesn't exist")]
    UnknownQuestion(String),

    /// The store rejected a command; `message` may span several lines
    #[error("debconf error {code}: {message}")]
    Protocol {
        /// Numeric status returned by the store
        code: u16,
        /// Human-readable message
        message: String,
    },
}

impl StoreError {
    /// Create a protocol error
    #[inline]
    pub fn protocol(code: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Rendered message split into lines, for line-oriented logs
    #[must_use]
    pub fn message_lines(&self) -> Vec<String> {
        self.to_string().lines().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_lines_splits_multiline_errors() {
        let err = StoreError::protocol(20, "first line\nsecond line");
        assert_eq!(
            err.message_lines(),
            vec!["debconf error 20: first line", "second line"]
        );
    }
}
