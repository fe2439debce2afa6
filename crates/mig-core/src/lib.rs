//! Migration-assistant question negotiator
//!
//! The installer front end owns a slice of the worker's question tree and
//! answers it on the user's behalf:
//! - subscribes to worker questions by glob pattern
//! - walks the worker's discovery pass, pruning systems about to be formatted
//! - hands the discovered candidates to the presenter and writes the
//!   selection back
//! - ties the worker's validation errors to the user entry they concern
//!
//! # Example
//!
//! ```rust
//! use mig_core::prelude::*;
//! use mig_store::{MemoryStore, CHOICES};
//!
//! let store = MemoryStore::new()
//!     .with_value("migration-assistant/partitions", "")
//!     .with_meta("migration-assistant/partitions", CHOICES, "Windows XP (/dev/hda1)")
//!     .with_value("ubiquity/run-ma-again", "");
//! let inspector = StaticInspector::new();
//!
//! let negotiator = MigrationNegotiator::new(
//!     MigrationConfig::default(),
//!     store,
//!     inspector,
//!     ScriptedPresenter::new(),
//! );
//! let mut session = Session::new(negotiator).unwrap();
//! session
//!     .run_events(&[
//!         StoreEvent::question("migration-assistant/partitions"),
//!         StoreEvent::question("ubiquity/run-ma-again"),
//!     ])
//!     .unwrap();
//!
//! let negotiator = session.into_handler();
//! assert_eq!(negotiator.state(), NegotiationState::Done);
//! assert_eq!(negotiator.store().value("ubiquity/run-ma-again"), Some("false"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod correlator;
pub mod error;
pub mod filter;
pub mod logging;
pub mod negotiator;
pub mod partition;
pub mod presenter;
pub mod question;
pub mod replay;
pub mod serialize;
pub mod session;
pub mod state_machine;
pub mod types;

pub use config::{CasperConfig, MigrationConfig};
pub use correlator::{ErrorCorrelator, PendingError};
pub use error::{ConfigError, FilterError, NegotiatorError, PartitionError, StateMachineError};
pub use filter::{EventClass, QuestionFilter};
pub use negotiator::MigrationNegotiator;
pub use partition::{PartitionEntry, PartitionFilter, PartitionInspector, StaticInspector, StateRecord};
pub use presenter::{DialogChoice, Presenter};
pub use question::QuestionKind;
pub use replay::{replay, PresenterCall, ReplayReport, ScriptedPresenter, Transcript};
pub use serialize::{write_selection, WriteSummary};
pub use session::{Dispatch, Prepared, QuestionHandler, Session, StoreEvent};
pub use state_machine::NegotiationState;
pub use types::{
    Candidate, FieldError, FieldKind, FinalizedSelection, HandlerOutcome, NewUserCredentials,
    Priority, SystemChoice,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a negotiation
    pub use crate::{
        Candidate, DialogChoice, FinalizedSelection, HandlerOutcome, MigrationConfig,
        MigrationNegotiator, NegotiationState, Presenter, Priority, QuestionHandler,
        ScriptedPresenter, Session, StaticInspector, StoreEvent,
    };
    pub use mig_store::{ConfigStore, QuestionId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
