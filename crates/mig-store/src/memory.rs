//! In-memory question store
//!
//! Backs the replay tool and the test suites. Every mutating call is
//! appended to a write log so callers can assert on exactly what was sent
//! to the store, in order.

use crate::error::StoreError;
use crate::store::ConfigStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status code used for injected failures
const INJECTED_FAILURE_CODE: u16 = 20;

/// A question held by [`MemoryStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredQuestion {
    /// Current value
    #[serde(default)]
    pub value: String,
    /// Template the question was registered from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Question-level template fields (description, choices, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    /// Flags such as `seen`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, String>,
}

/// One mutating call recorded by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreWrite {
    /// `set`
    Set { key: String, value: String },
    /// `fset`
    Fset { key: String, flag: String, value: String },
    /// `register`
    Register { template: String, key: String },
}

/// Question store kept entirely in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    /// Questions by identifier
    #[serde(default)]
    questions: BTreeMap<String, StoredQuestion>,
    /// Template fields by template name
    #[serde(default)]
    templates: BTreeMap<String, BTreeMap<String, String>>,
    /// Keys whose `get` fails, with the failure message
    #[serde(default)]
    failures: BTreeMap<String, String>,
    /// Write log
    #[serde(skip)]
    writes: Vec<StoreWrite>,
}

impl MemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a question holding `value`
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.questions.entry(key.into()).or_default().value = value.into();
        self
    }

    /// With a question-level template field
    #[must_use]
    pub fn with_meta(
        mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.questions
            .entry(key.into())
            .or_default()
            .meta
            .insert(field.into(), value.into());
        self
    }

    /// With a template field shared by every question registered from it
    #[must_use]
    pub fn with_template_field(
        mut self,
        template: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.templates
            .entry(template.into())
            .or_default()
            .insert(field.into(), value.into());
        self
    }

    /// With a `get` failure for `key`
    #[must_use]
    pub fn with_failure(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(key.into(), message.into());
        self
    }

    /// Current value, if the question exists
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.questions.get(key).map(|q| q.value.as_str())
    }

    /// Flag value, if set
    #[must_use]
    pub fn flag(&self, key: &str, flag: &str) -> Option<&str> {
        self.questions
            .get(key)
            .and_then(|q| q.flags.get(flag))
            .map(String::as_str)
    }

    /// Stored question
    #[must_use]
    pub fn question(&self, key: &str) -> Option<&StoredQuestion> {
        self.questions.get(key)
    }

    /// Write log in call order
    #[inline]
    #[must_use]
    pub fn writes(&self) -> &[StoreWrite] {
        &self.writes
    }

    /// `set` calls only, as `(key, value)` pairs
    #[must_use]
    pub fn sets(&self) -> Vec<(&str, &str)> {
        self.writes
            .iter()
            .filter_map(|w| match w {
                StoreWrite::Set { key, value } => Some((key.as_str(), value.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Most recent `set` of `key`
    #[must_use]
    pub fn last_set(&self, key: &str) -> Option<&str> {
        self.sets()
            .into_iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Drain the write log
    pub fn take_writes(&mut self) -> Vec<StoreWrite> {
        std::mem::take(&mut self.writes)
    }

    fn existing(&mut self, key: &str) -> Result<&mut StoredQuestion, StoreError> {
        self.questions
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownQuestion(key.to_string()))
    }
}

impl ConfigStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<String, StoreError> {
        if let Some(message) = self.failures.get(key) {
            return Err(StoreError::protocol(INJECTED_FAILURE_CODE, message.clone()));
        }
        Ok(self.existing(key)?.value.clone())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.existing(key)?.value = value.to_string();
        self.writes.push(StoreWrite::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn fset(&mut self, key: &str, flag: &str, value: &str) -> Result<(), StoreError> {
        self.existing(key)?
            .flags
            .insert(flag.to_string(), value.to_string());
        self.writes.push(StoreWrite::Fset {
            key: key.to_string(),
            flag: flag.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn register(&mut self, template: &str, key: &str) -> Result<(), StoreError> {
        self.questions.entry(key.to_string()).or_default().template = Some(template.to_string());
        self.writes.push(StoreWrite::Register {
            template: template.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }

    fn metaget(&mut self, key: &str, field: &str) -> Result<String, StoreError> {
        let question = self.existing(key)?;
        if let Some(value) = question.meta.get(field) {
            return Ok(value.clone());
        }
        let template = question.template.clone().unwrap_or_else(|| key.to_string());
        self.templates
            .get(&template)
            .and_then(|fields| fields.get(field))
            .cloned()
            .ok_or_else(|| {
                StoreError::protocol(INJECTED_FAILURE_CODE, format!("{field} does not exist"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Encoding, CHOICES};
    use pretty_assertions::assert_eq;

    #[test]
    fn get_unknown_question_fails() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.get("migration-assistant/partitions"),
            Err(StoreError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn preseed_records_set_and_seen() {
        let mut store = MemoryStore::new().with_value("ubiquity/run-ma-again", "");
        store
            .preseed("ubiquity/run-ma-again", "true", Encoding::Plain)
            .unwrap();

        assert_eq!(
            store.writes(),
            &[
                StoreWrite::Set {
                    key: "ubiquity/run-ma-again".into(),
                    value: "true".into(),
                },
                StoreWrite::Fset {
                    key: "ubiquity/run-ma-again".into(),
                    flag: "seen".into(),
                    value: "true".into(),
                },
            ]
        );
        assert_eq!(store.flag("ubiquity/run-ma-again", "seen"), Some("true"));
    }

    #[test]
    fn escaped_preseed_escapes_value() {
        let mut store = MemoryStore::new();
        store
            .register("migration-assistant/password", "migration-assistant/new-user/u1/password")
            .unwrap();
        store
            .preseed(
                "migration-assistant/new-user/u1/password",
                "se\\cret",
                Encoding::Escaped,
            )
            .unwrap();
        assert_eq!(
            store.value("migration-assistant/new-user/u1/password"),
            Some("se\\\\cret")
        );
    }

    #[test]
    fn metaget_falls_back_to_template() {
        let mut store = MemoryStore::new()
            .with_template_field("migration-assistant/items", CHOICES, "Documents, Wallpaper");
        store
            .register("migration-assistant/items", "migration-assistant/hda1/alice/items")
            .unwrap();

        assert_eq!(
            store.choices("migration-assistant/hda1/alice/items").unwrap(),
            vec!["Documents", "Wallpaper"]
        );
    }

    #[test]
    fn injected_failure_is_protocol_error() {
        let mut store = MemoryStore::new()
            .with_value("migration-assistant/hda1/users", "alice")
            .with_failure("migration-assistant/hda1/users", "backend went away");
        let err = store.get("migration-assistant/hda1/users").unwrap_err();
        assert!(matches!(err, StoreError::Protocol { code: 20, .. }));
    }

    #[test]
    fn deserializes_from_json_fixture() {
        let json = r#"{
            "questions": {
                "migration-assistant/partitions": {
                    "value": "Windows XP (/dev/hda1)",
                    "meta": { "choices": "Windows XP (/dev/hda1)" }
                }
            }
        }"#;
        let mut store: MemoryStore = serde_json::from_str(json).unwrap();
        assert_eq!(
            store.get("migration-assistant/partitions").unwrap(),
            "Windows XP (/dev/hda1)"
        );
        assert!(store.writes().is_empty());
    }
}
