//! Question identifiers owned by the migration-assistant worker
//!
//! Identifiers are classified once per event into a [`QuestionKind`] and
//! matched exhaustively by the negotiator.

use mig_store::QuestionId;

/// Namespace of every worker question
pub const NAMESPACE: &str = "migration-assistant";
/// Top-level partitions question
pub const PARTITIONS: &str = "migration-assistant/partitions";
/// Raised when a source partition cannot be unmounted
pub const FAILED_UNMOUNT: &str = "migration-assistant/failed-unmount";
/// Trigger asked at the end of every worker run
pub const RUN_AGAIN: &str = "ubiquity/run-ma-again";

/// Template of the per-partition users list
pub const USERS_TEMPLATE: &str = "migration-assistant/users";
/// Template of the per-user items list
pub const ITEMS_TEMPLATE: &str = "migration-assistant/items";
/// Template of the per-user target account name
pub const USER_TEMPLATE: &str = "migration-assistant/user";
/// Template of a new account's full name
pub const FULLNAME_TEMPLATE: &str = "migration-assistant/fullname";
/// Template of a new account's password
pub const PASSWORD_TEMPLATE: &str = "migration-assistant/password";
/// Template of a new account's password confirmation
pub const PASSWORD_AGAIN_TEMPLATE: &str = "migration-assistant/password-again";

/// Classification of a question identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// `migration-assistant/partitions`
    Partitions,
    /// `ubiquity/run-ma-again`
    RunAgain,
    /// `migration-assistant/failed-unmount`
    FailedUnmount,
    /// `migration-assistant/<part>/users`
    Users {
        /// Partition name
        partition: String,
    },
    /// `migration-assistant/<part>/<user>/items`
    Items {
        /// Partition name
        partition: String,
        /// User path segment
        user: String,
    },
    /// `.../<user>/user`
    UserField {
        /// Segment naming the user
        username: String,
    },
    /// `.../<user>/password`
    PasswordField {
        /// Segment naming the user
        username: String,
    },
    /// Anything else
    Other,
}

impl QuestionKind {
    /// Classify an identifier
    #[must_use]
    pub fn classify(question: &QuestionId) -> Self {
        match question.as_str() {
            PARTITIONS => return Self::Partitions,
            RUN_AGAIN => return Self::RunAgain,
            FAILED_UNMOUNT => return Self::FailedUnmount,
            _ => {}
        }

        let username = || question.parent_segment().unwrap_or_default().to_string();
        let segments: Vec<&str> = question.segments().collect();

        match (segments.as_slice(), question.last()) {
            (_, Some("user")) => Self::UserField {
                username: username(),
            },
            (_, Some("password")) => Self::PasswordField {
                username: username(),
            },
            ([NAMESPACE, partition, "users"], _) => Self::Users {
                partition: (*partition).to_string(),
            },
            ([NAMESPACE, partition, user, "items"], _) => Self::Items {
                partition: (*partition).to_string(),
                user: (*user).to_string(),
            },
            _ => Self::Other,
        }
    }

    /// Whether this is a per-user field the worker validates
    #[inline]
    #[must_use]
    pub fn is_user_field(&self) -> bool {
        matches!(self, Self::UserField { .. } | Self::PasswordField { .. })
    }
}

/// Path segment for a user name; spaces become `:`
#[must_use]
pub fn user_segment(user: &str) -> String {
    user.replace(' ', ":")
}

/// `migration-assistant/<part>/users`
#[must_use]
pub fn users_key(partition: &str) -> String {
    format!("{NAMESPACE}/{partition}/users")
}

/// `migration-assistant/<part>/<user>/items`
#[must_use]
pub fn items_key(partition: &str, user: &str) -> String {
    format!("{NAMESPACE}/{partition}/{}/items", user_segment(user))
}

/// `migration-assistant/<part>/<user>/user`
#[must_use]
pub fn new_username_key(partition: &str, user: &str) -> String {
    format!("{NAMESPACE}/{partition}/{}/user", user_segment(user))
}

/// `migration-assistant/<part>/<user>/password`
#[must_use]
pub fn password_key(partition: &str, user: &str) -> String {
    format!("{NAMESPACE}/{partition}/{}/password", user_segment(user))
}

/// `migration-assistant/new-user/<id>/<field>`
#[must_use]
pub fn new_user_key(id: &str, field: &str) -> String {
    format!("{NAMESPACE}/new-user/{id}/{field}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(id: &str) -> QuestionKind {
        QuestionKind::classify(&QuestionId::new(id))
    }

    #[test]
    fn classifies_fixed_questions() {
        assert_eq!(kind(PARTITIONS), QuestionKind::Partitions);
        assert_eq!(kind(RUN_AGAIN), QuestionKind::RunAgain);
        assert_eq!(kind(FAILED_UNMOUNT), QuestionKind::FailedUnmount);
    }

    #[test]
    fn classifies_per_user_fields() {
        assert_eq!(
            kind("migration-assistant/hda1/alice/user"),
            QuestionKind::UserField {
                username: "alice".into()
            }
        );
        assert_eq!(
            kind("migration-assistant/hda1/John:Doe/password"),
            QuestionKind::PasswordField {
                username: "John:Doe".into()
            }
        );
        assert!(kind("migration-assistant/hda1/alice/password").is_user_field());
    }

    #[test]
    fn classifies_lists() {
        assert_eq!(
            kind("migration-assistant/hda1/users"),
            QuestionKind::Users {
                partition: "hda1".into()
            }
        );
        assert_eq!(
            kind("migration-assistant/hda1/alice/items"),
            QuestionKind::Items {
                partition: "hda1".into(),
                user: "alice".into()
            }
        );
        assert_eq!(kind("migration-assistant/new-user/u1/fullname"), QuestionKind::Other);
    }

    #[test]
    fn keys_replace_spaces_in_user_segment() {
        assert_eq!(users_key("hda1"), "migration-assistant/hda1/users");
        assert_eq!(
            items_key("hda1", "John Doe"),
            "migration-assistant/hda1/John:Doe/items"
        );
        assert_eq!(
            new_username_key("hda1", "John Doe"),
            "migration-assistant/hda1/John:Doe/user"
        );
        assert_eq!(
            password_key("hda1", "John Doe"),
            "migration-assistant/hda1/John:Doe/password"
        );
        assert_eq!(
            new_user_key("u1", "password-again"),
            "migration-assistant/new-user/u1/password-again"
        );
    }
}
