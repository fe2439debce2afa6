//! Core types for the negotiator
//!
//! Defines the data exchanged with the presenter and the worker:
//! - candidates and new-user credentials
//! - the finalized selection tree
//! - field errors and handler outcomes

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Debconf question priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Only shown in expert mode
    Low,
    /// Normal questions
    #[default]
    Medium,
    /// Questions without a sane default
    High,
    /// Questions that will break the system if unanswered
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Result of handling one question or error event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerOutcome {
    /// Acknowledge and keep feeding events
    Continue,
    /// The negotiation round is complete
    Succeeded,
    /// The user backed out of the step
    Backup,
}

/// One importable (partition, user) pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Partition name, e.g. `hda1`
    pub partition: String,
    /// User account on the source system
    pub source_user: String,
    /// Operating system label shown next to the partition
    pub os_label: String,
    /// Account name the user's data is imported into
    #[serde(default)]
    pub new_user: String,
    /// Importable items, in discovery order
    pub items: IndexSet<String>,
    /// Whether the user ticked this candidate
    #[serde(default)]
    pub selected: bool,
}

impl Candidate {
    /// Create an unselected candidate
    #[must_use]
    pub fn new(
        partition: impl Into<String>,
        source_user: impl Into<String>,
        os_label: impl Into<String>,
        items: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            source_user: source_user.into(),
            os_label: os_label.into(),
            new_user: String::new(),
            items: items.into_iter().collect(),
            selected: false,
        }
    }

    /// With the target account name
    #[inline]
    #[must_use]
    pub fn with_new_user(mut self, new_user: impl Into<String>) -> Self {
        self.new_user = new_user.into();
        self
    }

    /// Mark as selected
    #[inline]
    #[must_use]
    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }
}

/// Credentials for an account created during import
///
/// Absent fields are written to the store as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserCredentials {
    /// Full name
    #[serde(default)]
    pub fullname: Option<String>,
    /// Password
    #[serde(default)]
    pub password: Option<String>,
    /// Password typed a second time
    #[serde(default)]
    pub password_confirmation: Option<String>,
}

/// Selection tree returned by the presenter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedSelection {
    /// Every candidate, selected or not
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// New accounts keyed by their synthetic identifier
    #[serde(default)]
    pub new_users: IndexMap<String, NewUserCredentials>,
}

impl FinalizedSelection {
    /// Create from candidates and new users
    #[inline]
    #[must_use]
    pub fn new(candidates: Vec<Candidate>, new_users: IndexMap<String, NewUserCredentials>) -> Self {
        Self {
            candidates,
            new_users,
        }
    }

    /// Candidates the user ticked
    pub fn selected(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.selected)
    }
}

/// Which per-user field an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// The target account name
    User,
    /// The account password
    Password,
}

/// A recoverable error tied to one user entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Message from the worker
    pub message: String,
    /// User the error is about
    pub username: String,
    /// Field the error is about
    pub field: FieldKind,
}

/// Entry of the partitions list, e.g. `Windows XP (/dev/hda1)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemChoice {
    /// Text before the last `(`, trimmed
    pub os_label: String,
    /// Segment after the last `/`, without the closing `)`
    pub partition: String,
}

impl SystemChoice {
    /// Parse a partitions-list entry
    ///
    /// Returns `None` when the entry has no device path in parentheses.
    #[must_use]
    pub fn parse(choice: &str) -> Option<Self> {
        let open = choice.rfind('(')?;
        let body = choice.strip_suffix(')')?;
        let slash = body.rfind('/')?;
        if slash < open {
            return None;
        }
        let partition = &body[slash + 1..];
        if partition.is_empty() {
            return None;
        }
        Some(Self {
            os_label: choice[..open].trim_end().to_string(),
            partition: partition.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_choice_parses_label_and_partition() {
        let choice = SystemChoice::parse("Windows XP Professional (/dev/hda1)").unwrap();
        assert_eq!(choice.os_label, "Windows XP Professional");
        assert_eq!(choice.partition, "hda1");
    }

    #[test]
    fn system_choice_uses_last_parenthesis() {
        let choice = SystemChoice::parse("Ubuntu (8.04) (/dev/sdb3)").unwrap();
        assert_eq!(choice.os_label, "Ubuntu (8.04)");
        assert_eq!(choice.partition, "sdb3");
    }

    #[test]
    fn system_choice_rejects_entries_without_device() {
        assert!(SystemChoice::parse("Windows XP").is_none());
        assert!(SystemChoice::parse("Windows XP (hda1)").is_none());
        assert!(SystemChoice::parse("Windows XP (/dev/)").is_none());
    }

    #[test]
    fn candidate_items_keep_order_and_dedupe() {
        let candidate = Candidate::new(
            "hda1",
            "alice",
            "Windows XP",
            vec!["docs".to_string(), "photos".to_string(), "docs".to_string()],
        );
        assert_eq!(
            candidate.items.iter().collect::<Vec<_>>(),
            vec!["docs", "photos"]
        );
        assert!(!candidate.selected);
    }

    #[test]
    fn selection_deserializes_with_missing_credentials() {
        let json = r#"{
            "candidates": [{
                "partition": "hda1",
                "source_user": "alice",
                "os_label": "Windows XP",
                "new_user": "alice2",
                "items": ["docs"],
                "selected": true
            }],
            "new_users": { "alice2": { "fullname": "Alice Liddell" } }
        }"#;
        let selection: FinalizedSelection = serde_json::from_str(json).unwrap();
        assert_eq!(selection.selected().count(), 1);
        let creds = &selection.new_users["alice2"];
        assert_eq!(creds.fullname.as_deref(), Some("Alice Liddell"));
        assert!(creds.password.is_none());
    }
}
