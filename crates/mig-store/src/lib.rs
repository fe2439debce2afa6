//! Question store contract for the migration-assistant front end
//!
//! The installer talks to a debconf-style question store. This crate holds
//! the pieces of that contract the negotiator depends on:
//! - [`QuestionId`]: slash-separated question identifiers
//! - [`codec`]: the `", "`-joined list encoding and value escaping
//! - [`ConfigStore`]: get/set/register/metaget over the store
//! - [`MemoryStore`]: an in-memory store that records every write
//!
//! # Example
//!
//! ```rust
//! use mig_store::{ConfigStore, Encoding, MemoryStore};
//!
//! let mut store = MemoryStore::new()
//!     .with_value("migration-assistant/hda1/users", "alice, bob");
//!
//! let users = store.get_list("migration-assistant/hda1/users").unwrap();
//! assert_eq!(users, vec!["alice", "bob"]);
//!
//! store.preseed("migration-assistant/hda1/users", "alice", Encoding::Plain).unwrap();
//! assert_eq!(store.value("migration-assistant/hda1/users"), Some("alice"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod codec;
pub mod error;
pub mod memory;
pub mod path;
pub mod store;

pub use error::StoreError;
pub use memory::{MemoryStore, StoredQuestion, StoreWrite};
pub use path::{PathError, QuestionId};
pub use store::{ConfigStore, Encoding, CHOICES, DESCRIPTION, EXTENDED_DESCRIPTION, SEEN};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
