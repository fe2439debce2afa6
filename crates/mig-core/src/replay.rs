//! Transcript replay
//!
//! A transcript captures one installer session: the store contents, the
//! partition layout, the answers the user gave and the events the worker
//! raised. Replaying it drives a real [`Session`] over an in-memory store
//! and reports exactly what was written and what the user was shown.

use crate::config::{CasperConfig, MigrationConfig};
use crate::error::{ConfigError, NegotiatorError};
use crate::logging::LOG_TARGET;
use crate::negotiator::MigrationNegotiator;
use crate::partition::StaticInspector;
use crate::presenter::{DialogChoice, Presenter};
use crate::session::{Dispatch, Prepared, Session, StoreEvent};
use crate::state_machine::NegotiationState;
use crate::types::{Candidate, FieldKind, FinalizedSelection};
use mig_store::{MemoryStore, StoreWrite};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// A presenter call, as recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum PresenterCall {
    PresentChoices {
        candidates: Vec<Candidate>,
    },
    GetFinalizedChoices {
        /// Whether a selection was returned
        answered: bool,
    },
    ReportFieldError {
        message: String,
        username: String,
        field: FieldKind,
    },
    ReportFatalError {
        title: String,
        body: String,
    },
    ConfirmDialog {
        title: String,
        body: String,
        choices: Vec<DialogChoice>,
        answer: Option<DialogChoice>,
    },
}

/// Presenter answering from a script and recording every call
///
/// An exhausted script answers `None`, which backs out of selections and
/// dismisses dialogs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedPresenter {
    /// Answers to `get_finalized_choices`, in order
    #[serde(default)]
    selections: VecDeque<Option<FinalizedSelection>>,
    /// Answers to `confirm_dialog`, in order
    #[serde(default)]
    confirmations: VecDeque<Option<DialogChoice>>,
    #[serde(skip)]
    calls: Vec<PresenterCall>,
}

impl ScriptedPresenter {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With the next finalized selection; `None` backs out
    #[must_use]
    pub fn with_selection(mut self, selection: Option<FinalizedSelection>) -> Self {
        self.selections.push_back(selection);
        self
    }

    /// With the next dialog answer
    #[must_use]
    pub fn with_confirmation(mut self, answer: Option<DialogChoice>) -> Self {
        self.confirmations.push_back(answer);
        self
    }

    /// Calls in order
    #[inline]
    #[must_use]
    pub fn calls(&self) -> &[PresenterCall] {
        &self.calls
    }

    #[must_use]
    pub fn into_calls(self) -> Vec<PresenterCall> {
        self.calls
    }
}

impl Presenter for ScriptedPresenter {
    fn present_choices(&mut self, candidates: &[Candidate]) {
        self.calls.push(PresenterCall::PresentChoices {
            candidates: candidates.to_vec(),
        });
    }

    fn get_finalized_choices(&mut self) -> Option<FinalizedSelection> {
        let selection = self.selections.pop_front().flatten();
        self.calls.push(PresenterCall::GetFinalizedChoices {
            answered: selection.is_some(),
        });
        selection
    }

    fn report_field_error(&mut self, message: &str, username: &str, field: FieldKind) {
        self.calls.push(PresenterCall::ReportFieldError {
            message: message.to_string(),
            username: username.to_string(),
            field,
        });
    }

    fn report_fatal_error(&mut self, title: &str, body: &str) {
        self.calls.push(PresenterCall::ReportFatalError {
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    fn confirm_dialog(&mut self, title: &str, body: &str, choices: &[DialogChoice]) -> Option<DialogChoice> {
        let answer = self.confirmations.pop_front().flatten();
        self.calls.push(PresenterCall::ConfirmDialog {
            title: title.to_string(),
            body: body.to_string(),
            choices: choices.to_vec(),
            answer,
        });
        answer
    }
}

/// A recorded installer session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Negotiator configuration; defaults when absent
    #[serde(default)]
    pub config: Option<MigrationConfig>,
    /// Store contents before the worker starts
    #[serde(default)]
    pub store: MemoryStore,
    /// Partition layout
    #[serde(default)]
    pub partitions: StaticInspector,
    /// User answers
    #[serde(default)]
    pub presenter: ScriptedPresenter,
    /// Worker events in order
    #[serde(default)]
    pub events: Vec<StoreEvent>,
}

impl Transcript {
    /// Load a JSON transcript
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// What a replay did
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Worker the session would have started
    pub worker: Prepared,
    /// Per-event dispatch results
    pub dispatched: Vec<Dispatch>,
    /// Store writes in order
    pub writes: Vec<StoreWrite>,
    /// Presenter calls in order
    pub presenter_calls: Vec<PresenterCall>,
    pub final_state: NegotiationState,
    pub first_run: bool,
}

/// Replay a transcript through a fresh negotiator
///
/// # Errors
/// Returns the first negotiator error, or a pattern error from the
/// transcript's configuration
pub fn replay(transcript: Transcript, casper: &CasperConfig) -> Result<ReplayReport, NegotiatorError> {
    let config = transcript.config.unwrap_or_default().with_casper(casper);
    let negotiator = MigrationNegotiator::new(
        config,
        transcript.store,
        transcript.partitions,
        transcript.presenter,
    );

    let mut session = Session::new(negotiator)?;
    let dispatched = session.run_events(&transcript.events)?;
    let worker = session.prepared().clone();

    let negotiator = session.into_handler();
    let final_state = negotiator.state();
    let first_run = negotiator.is_first_run();
    let (mut store, _, presenter) = negotiator.into_parts();

    tracing::info!(
        target: LOG_TARGET,
        "Replayed {} events: {} writes, final state {:?}",
        dispatched.len(),
        store.writes().len(),
        final_state
    );

    Ok(ReplayReport {
        worker,
        dispatched,
        writes: store.take_writes(),
        presenter_calls: presenter.into_calls(),
        final_state,
        first_run,
    })
}
