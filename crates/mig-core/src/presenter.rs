//! The front end as seen by the negotiator
//!
//! Every call is synchronous: the negotiator does not resume until the
//! presenter returns, so a presenter that waits for the user blocks the
//! protocol round, which is what the worker expects.

use crate::types::{Candidate, FieldKind, FinalizedSelection};
use serde::{Deserialize, Serialize};

/// Buttons of the confirm dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogChoice {
    /// Return to the previous step
    GoBack,
    /// Carry on regardless
    Continue,
}

/// GUI side of the migration step
#[cfg_attr(test, mockall::automock)]
pub trait Presenter {
    /// Show the discovered candidates for selection
    fn present_choices(&mut self, candidates: &[Candidate]);

    /// Block until the user confirms; `None` when they back out
    fn get_finalized_choices(&mut self) -> Option<FinalizedSelection>;

    /// Show an error next to one user's entry
    fn report_field_error(&mut self, message: &str, username: &str, field: FieldKind);

    /// Show a blocking error dialog
    fn report_fatal_error(&mut self, title: &str, body: &str);

    /// Ask the user to pick one of `choices`; `None` if dismissed
    fn confirm_dialog(&mut self, title: &str, body: &str, choices: &[DialogChoice]) -> Option<DialogChoice>;
}
