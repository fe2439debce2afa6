//! Filtered-command session
//!
//! A session starts the worker through a [`QuestionHandler`], subscribes to
//! the question patterns it declares and hands every accepted store event
//! to it. Events outside the subscription are left to the store's own
//! front end.

use crate::error::{FilterError, NegotiatorError};
use crate::filter::{EventClass, QuestionFilter};
use crate::logging::LOG_TARGET;
use crate::negotiator::MigrationNegotiator;
use crate::partition::PartitionInspector;
use crate::presenter::Presenter;
use crate::types::{HandlerOutcome, Priority};
use mig_store::{ConfigStore, QuestionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An event delivered by the store while the worker runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The worker asks a question
    Question {
        #[serde(default)]
        priority: Priority,
        question: QuestionId,
    },
    /// The worker raises an error template
    Error {
        #[serde(default)]
        priority: Priority,
        question: QuestionId,
    },
}

impl StoreEvent {
    /// Question event at medium priority
    #[must_use]
    pub fn question(question: impl Into<QuestionId>) -> Self {
        Self::Question {
            priority: Priority::default(),
            question: question.into(),
        }
    }

    /// Error event at critical priority
    #[must_use]
    pub fn error(question: impl Into<QuestionId>) -> Self {
        Self::Error {
            priority: Priority::Critical,
            question: question.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        match self {
            Self::Question { question, .. } | Self::Error { question, .. } => question,
        }
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        match self {
            Self::Question { priority, .. } | Self::Error { priority, .. } => *priority,
        }
    }

    #[must_use]
    pub fn class(&self) -> EventClass {
        match self {
            Self::Question { .. } => EventClass::Question,
            Self::Error { .. } => EventClass::Error,
        }
    }
}

/// What a handler needs started
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prepared {
    /// Worker command line
    pub command: Vec<String>,
    /// Question patterns to subscribe to
    pub patterns: Vec<String>,
    /// Extra worker environment
    pub environment: BTreeMap<String, String>,
}

/// Handler side of a filtered command
pub trait QuestionHandler {
    /// Reset per-round state and describe the worker to start
    fn prepare(&mut self) -> Prepared;

    /// Handle a question
    fn run(&mut self, priority: Priority, question: &QuestionId) -> Result<HandlerOutcome, NegotiatorError>;

    /// Handle an error
    fn error(&mut self, priority: Priority, question: &QuestionId) -> Result<HandlerOutcome, NegotiatorError>;

    /// Called once the worker has exited
    fn finish(&mut self) {}
}

impl<S, I, P> QuestionHandler for MigrationNegotiator<S, I, P>
where
    S: ConfigStore,
    I: PartitionInspector,
    P: Presenter,
{
    fn prepare(&mut self) -> Prepared {
        self.start_round();
        let config = self.config();
        Prepared {
            command: config.worker_command.clone(),
            patterns: config.question_patterns.clone(),
            environment: config.worker_environment.clone(),
        }
    }

    fn run(&mut self, priority: Priority, question: &QuestionId) -> Result<HandlerOutcome, NegotiatorError> {
        MigrationNegotiator::run(self, priority, question)
    }

    fn error(&mut self, priority: Priority, question: &QuestionId) -> Result<HandlerOutcome, NegotiatorError> {
        MigrationNegotiator::error(self, priority, question)
    }

    fn finish(&mut self) {
        self.finish_round();
    }
}

/// Result of dispatching one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dispatch", content = "outcome", rename_all = "snake_case")]
pub enum Dispatch {
    /// Not subscribed; left to the store
    Ignored,
    /// Handled with the given outcome
    Handled(HandlerOutcome),
}

/// One run of the worker
#[derive(Debug)]
pub struct Session<H> {
    handler: H,
    filter: QuestionFilter,
    prepared: Prepared,
}

impl<H: QuestionHandler> Session<H> {
    /// Prepare `handler` and compile its patterns
    ///
    /// # Errors
    /// Returns error if a declared pattern is invalid
    pub fn new(mut handler: H) -> Result<Self, FilterError> {
        let prepared = handler.prepare();
        let filter = QuestionFilter::new(prepared.patterns.iter().cloned())?;
        tracing::info!(
            target: LOG_TARGET,
            "Starting {} with {} question patterns",
            prepared.command.join(" "),
            prepared.patterns.len()
        );
        Ok(Self {
            handler,
            filter,
            prepared,
        })
    }

    /// Route one event to the handler if it is subscribed
    ///
    /// # Errors
    /// Returns the handler's error
    pub fn dispatch(&mut self, event: &StoreEvent) -> Result<Dispatch, NegotiatorError> {
        if !self.filter.accepts(event.id(), event.class()) {
            tracing::trace!(target: LOG_TARGET, "Not subscribed to {}", event.id());
            return Ok(Dispatch::Ignored);
        }

        let outcome = match event {
            StoreEvent::Question { priority, question } => self.handler.run(*priority, question)?,
            StoreEvent::Error { priority, question } => self.handler.error(*priority, question)?,
        };
        Ok(Dispatch::Handled(outcome))
    }

    /// Dispatch events until they run out or the user backs out, then finish
    ///
    /// # Errors
    /// Returns the first handler error; the session is finished before
    /// it is returned
    pub fn run_events<'a, E>(&mut self, events: E) -> Result<Vec<Dispatch>, NegotiatorError>
    where
        E: IntoIterator<Item = &'a StoreEvent>,
    {
        let mut dispatched = Vec::new();
        for event in events {
            let dispatch = match self.dispatch(event) {
                Ok(dispatch) => dispatch,
                Err(err) => {
                    tracing::warn!(target: LOG_TARGET, "Stopping at {}: {}", event.id(), err);
                    self.finish();
                    return Err(err);
                }
            };
            dispatched.push(dispatch);
            if dispatch == Dispatch::Handled(HandlerOutcome::Backup) {
                tracing::info!(target: LOG_TARGET, "Stopping at {}: user backed out", event.id());
                break;
            }
        }
        self.finish();
        Ok(dispatched)
    }

    /// Tell the handler the worker has exited
    pub fn finish(&mut self) {
        self.handler.finish();
    }

    #[inline]
    #[must_use]
    pub fn prepared(&self) -> &Prepared {
        &self.prepared
    }

    #[inline]
    #[must_use]
    pub fn filter(&self) -> &QuestionFilter {
        &self.filter
    }

    #[inline]
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    #[inline]
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Hand the handler back
    pub fn into_handler(self) -> H {
        self.handler
    }
}
