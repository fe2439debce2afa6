//! The question store contract

use crate::codec::{escape_value, split_choices, split_list};
use crate::error::StoreError;
use std::borrow::Cow;

/// `metaget` field holding the short description
pub const DESCRIPTION: &str = "description";
/// `metaget` field holding the extended description
pub const EXTENDED_DESCRIPTION: &str = "extended_description";
/// `metaget` field holding the choice list
pub const CHOICES: &str = "choices";
/// Flag marking a question as already answered
pub const SEEN: &str = "seen";

/// How a preseeded value is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Written verbatim
    #[default]
    Plain,
    /// Backslashes and newlines escaped first
    Escaped,
}

/// Hierarchical question/answer store
///
/// Methods take `&mut self` because real stores are a request/response
/// channel to another process.
pub trait ConfigStore {
    /// Current value of a question
    fn get(&mut self, key: &str) -> Result<String, StoreError>;

    /// Set the value of a question
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Set a flag on a question
    fn fset(&mut self, key: &str, flag: &str, value: &str) -> Result<(), StoreError>;

    /// Create question `key` from `template`
    fn register(&mut self, template: &str, key: &str) -> Result<(), StoreError>;

    /// Read a template field of a question
    fn metaget(&mut self, key: &str, field: &str) -> Result<String, StoreError>;

    /// Current value decoded as a list
    fn get_list(&mut self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(split_list(&self.get(key)?))
    }

    /// Choice list of a question
    fn choices(&mut self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(split_choices(&self.metaget(key, CHOICES)?))
    }

    /// Short description of a question
    fn description(&mut self, key: &str) -> Result<String, StoreError> {
        self.metaget(key, DESCRIPTION)
    }

    /// Extended description of a question
    fn extended_description(&mut self, key: &str) -> Result<String, StoreError> {
        self.metaget(key, EXTENDED_DESCRIPTION)
    }

    /// Answer a question ahead of the worker asking it
    ///
    /// Writes the value and marks the question as seen so the worker does
    /// not prompt for it.
    fn preseed(&mut self, key: &str, value: &str, encoding: Encoding) -> Result<(), StoreError> {
        let value = match encoding {
            Encoding::Plain => Cow::Borrowed(value),
            Encoding::Escaped => Cow::Owned(escape_value(value)),
        };
        self.set(key, &value)?;
        self.fset(key, SEEN, "true")
    }
}

impl<S: ConfigStore + ?Sized> ConfigStore for &mut S {
    fn get(&mut self, key: &str) -> Result<String, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn fset(&mut self, key: &str, flag: &str, value: &str) -> Result<(), StoreError> {
        (**self).fset(key, flag, value)
    }

    fn register(&mut self, template: &str, key: &str) -> Result<(), StoreError> {
        (**self).register(template, key)
    }

    fn metaget(&mut self, key: &str, field: &str) -> Result<String, StoreError> {
        (**self).metaget(key, field)
    }
}
