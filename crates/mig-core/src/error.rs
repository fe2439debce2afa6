//! Error types for the migration-assistant negotiator
//!
//! Recoverable conditions (field errors, store failures while building the
//! candidate tree, unreadable partition state) are resolved inside the
//! negotiator. What remains here is what a caller can actually observe:
//! - store write failures on the non-degradable paths
//! - illegal state transitions
//! - bad question patterns and configuration files
//! - unreadable replay transcripts

use crate::state_machine::NegotiationState;
use mig_store::StoreError;
use std::path::PathBuf;

/// Errors returned from question handling
#[derive(Debug, thiserror::Error)]
pub enum NegotiatorError {
    /// The store rejected a write
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The negotiator attempted an illegal transition
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    /// The handler declared an unusable question pattern
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),
}

/// State machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not listed in the transition table
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// State the negotiator was in
        from: NegotiationState,
        /// State it tried to enter
        to: NegotiationState,
    },
}

/// Question pattern errors
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// A pattern was the empty string
    #[error("question pattern is empty")]
    EmptyPattern,

    /// The compiled pattern set was rejected
    #[error("invalid question pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Partition inspection errors
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// A state file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A partition listing had too few positional fields
    #[error("malformed partition entry: {0:?}")]
    MalformedEntry(Vec<String>),

    /// No state record is known for the partition
    #[error("no state record for {disk}/{partition}")]
    MissingState {
        /// Disk identifier
        disk: String,
        /// Partition identifier
        partition: String,
    },

    /// Disk is not known to the inspector
    #[error("unknown disk: {0}")]
    UnknownDisk(String),

    /// `list_partitions` called before `select_disk`
    #[error("no disk selected")]
    NoDiskSelected,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for the expected type
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Log subscriber could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),
}
