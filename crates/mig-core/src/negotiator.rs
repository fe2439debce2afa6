//! The migration-assistant negotiator
//!
//! Drives the two visits the worker makes over its question tree:
//! - discovery: every question is answered automatically so the worker
//!   enumerates systems, users and items without prompting
//! - apply: the user's selection is written back and the worker re-runs
//!   with it, reporting validation errors that are routed to the
//!   presenter next to the offending user entry
//!
//! # Workflow
//! 1. `migration-assistant/partitions`: prune systems about to be formatted
//! 2. per-user questions: preseed their choices, or `skip-question`
//! 3. `ubiquity/run-ma-again`: build the candidate tree and ask the user
//! 4. write the selection, set the trigger to `true`, let the worker re-run
//! 5. trigger again: re-ask on errors, otherwise set it to `false` and stop

use crate::config::MigrationConfig;
use crate::correlator::{ErrorCorrelator, PendingError};
use crate::error::{NegotiatorError, StateMachineError};
use crate::logging::LOG_TARGET;
use crate::partition::{PartitionFilter, PartitionInspector};
use crate::presenter::{DialogChoice, Presenter};
use crate::question::{items_key, users_key, QuestionKind, PARTITIONS, RUN_AGAIN};
use crate::serialize::write_selection;
use crate::state_machine::{validate_transition, NegotiationState};
use crate::types::{Candidate, FinalizedSelection, HandlerOutcome, Priority, SystemChoice};
use mig_store::codec::{join_list, split_list};
use mig_store::{ConfigStore, Encoding, QuestionId, StoreError};

/// Dialog title for an error the worker raised but never re-asked about
pub const UNRECOVERED_ERROR_TITLE: &str = "Unexpected migration-assistant error";

/// Two-pass negotiator between the worker, the store and the presenter
#[derive(Debug)]
pub struct MigrationNegotiator<S, I, P> {
    config: MigrationConfig,
    store: S,
    inspector: I,
    presenter: P,
    partition_filter: PartitionFilter,
    correlator: ErrorCorrelator,
    state: NegotiationState,
    /// Cleared once the trigger arrives with systems to offer
    first_run: bool,
    /// A question other than the trigger was handled this round
    saw_question: bool,
    /// A recoverable error was raised since the last apply
    round_had_errors: bool,
    candidates: Vec<Candidate>,
}

impl<S, I, P> MigrationNegotiator<S, I, P>
where
    S: ConfigStore,
    I: PartitionInspector,
    P: Presenter,
{
    /// Create a negotiator waiting for the discovery pass
    #[must_use]
    pub fn new(config: MigrationConfig, store: S, inspector: I, presenter: P) -> Self {
        Self {
            config,
            store,
            inspector,
            presenter,
            partition_filter: PartitionFilter::new(),
            correlator: ErrorCorrelator::new(),
            state: NegotiationState::DiscoveryPending,
            first_run: true,
            saw_question: false,
            round_had_errors: false,
            candidates: Vec::new(),
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Whether the discovery pass has not yet produced a candidate tree
    #[inline]
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    /// Error waiting for its question
    #[inline]
    #[must_use]
    pub fn pending_error(&self) -> Option<&PendingError> {
        self.correlator.pending()
    }

    /// Candidate tree of the current round
    #[inline]
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[inline]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    #[inline]
    #[must_use]
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Take the collaborators back
    pub fn into_parts(self) -> (S, I, P) {
        (self.store, self.inspector, self.presenter)
    }

    /// Forget per-round flags before the worker starts
    ///
    /// An error left over from a round that never finished is reported
    /// first.
    pub fn start_round(&mut self) {
        self.finish_round();
        self.saw_question = false;
        self.round_had_errors = false;
    }

    /// Handle a question event
    ///
    /// # Errors
    /// - `NegotiatorError::Store` if a required write is rejected
    /// - `NegotiatorError::StateMachine` on an illegal transition
    pub fn run(&mut self, priority: Priority, question: &QuestionId) -> Result<HandlerOutcome, NegotiatorError> {
        let kind = QuestionKind::classify(question);
        tracing::debug!(
            target: LOG_TARGET,
            "Question {} ({}) in {:?}",
            question,
            priority,
            self.state
        );

        if kind != QuestionKind::RunAgain {
            self.saw_question = true;
        }

        if kind == QuestionKind::FailedUnmount {
            self.confirm_unmount(question)?;
            return Ok(HandlerOutcome::Continue);
        }

        if let Some(error) = self.correlator.correlate(&kind) {
            tracing::info!(
                target: LOG_TARGET,
                "Reporting {:?} error for {}",
                error.field,
                error.username
            );
            self.presenter
                .report_field_error(&error.message, &error.username, error.field);
            self.preseed_skip(question)?;
            return Ok(HandlerOutcome::Continue);
        }

        match self.state {
            state if state.is_discovery() => self.discover(question, &kind),
            NegotiationState::AwaitingSelection if kind == QuestionKind::RunAgain => {
                self.await_selection()
            }
            NegotiationState::Applying if kind == QuestionKind::RunAgain => self.conclude_apply(),
            _ => Ok(HandlerOutcome::Continue),
        }
    }

    /// Handle an error event
    ///
    /// Recoverable errors are held for the next user or password question;
    /// anything else is shown to the user straight away.
    ///
    /// # Errors
    /// Does not currently fail; the signature matches [`run`](Self::run).
    pub fn error(&mut self, priority: Priority, question: &QuestionId) -> Result<HandlerOutcome, NegotiatorError> {
        if self.config.is_recoverable(question.as_str()) {
            let message = self
                .store
                .extended_description(question.as_str())
                .or_else(|_| self.store.description(question.as_str()))
                .unwrap_or_else(|_| question.to_string());
            tracing::info!(target: LOG_TARGET, "Holding {} error: {}", priority, question);
            self.round_had_errors = true;
            if let Some(displaced) = self.correlator.hold(question.clone(), message) {
                tracing::warn!(
                    target: LOG_TARGET,
                    "Error from {} was never matched to a question: {}",
                    displaced.source,
                    displaced.message
                );
            }
        } else {
            let (title, body) = self.describe(question);
            tracing::error!(target: LOG_TARGET, "{}: {}", question, title);
            self.presenter.report_fatal_error(&title, &body);
        }
        Ok(HandlerOutcome::Continue)
    }

    /// Close the round, surfacing any error that never found its question
    pub fn finish_round(&mut self) {
        if let Some(pending) = self.correlator.expire() {
            tracing::warn!(
                target: LOG_TARGET,
                "Unrecovered error from {}: {}",
                pending.source,
                pending.message
            );
            self.presenter
                .report_fatal_error(UNRECOVERED_ERROR_TITLE, &pending.message);
        }
    }

    fn discover(&mut self, question: &QuestionId, kind: &QuestionKind) -> Result<HandlerOutcome, NegotiatorError> {
        match kind {
            QuestionKind::Partitions => {
                self.filter_partitions()?;
                if self.state == NegotiationState::DiscoveryPending {
                    self.transition(NegotiationState::DiscoveryActive)?;
                }
                Ok(HandlerOutcome::Continue)
            }
            QuestionKind::RunAgain => self.end_discovery(),
            kind if kind.is_user_field() => {
                self.preseed_skip(question)?;
                Ok(HandlerOutcome::Continue)
            }
            _ => {
                let choices = self.store.choices(question.as_str()).unwrap_or_else(|err| {
                    tracing::warn!(target: LOG_TARGET, "No choices for {}: {}", question, err);
                    Vec::new()
                });
                self.store
                    .preseed(question.as_str(), &join_list(&choices), Encoding::Plain)?;
                Ok(HandlerOutcome::Continue)
            }
        }
    }

    fn filter_partitions(&mut self) -> Result<(), StoreError> {
        let offered = self.store.choices(PARTITIONS).unwrap_or_else(|err| {
            tracing::warn!(target: LOG_TARGET, "No systems offered: {}", err);
            Vec::new()
        });
        let kept = self
            .partition_filter
            .filter(&mut self.inspector, &offered)
            .unwrap_or_else(|err| {
                tracing::warn!(target: LOG_TARGET, "Unable to inspect partitions: {}", err);
                Vec::new()
            });
        tracing::info!(
            target: LOG_TARGET,
            "{} of {} systems survive partitioning",
            kept.len(),
            offered.len()
        );
        self.store.preseed(PARTITIONS, &join_list(&kept), Encoding::Plain)
    }

    fn end_discovery(&mut self) -> Result<HandlerOutcome, NegotiatorError> {
        let systems = match self.store.get(PARTITIONS) {
            Ok(systems) => systems,
            Err(StoreError::UnknownQuestion(_)) => String::new(),
            Err(err) => return Err(err.into()),
        };

        if systems.is_empty() {
            tracing::info!(target: LOG_TARGET, "No systems to import from");
            self.store.set(RUN_AGAIN, "false")?;
            return self.conclude();
        }

        self.candidates = self.build_candidate_tree(&systems)?;
        self.first_run = false;

        if !self.saw_question {
            tracing::info!(target: LOG_TARGET, "Nothing to ask, skipping the selection");
            return self.conclude();
        }

        self.presenter.present_choices(&self.candidates);
        self.transition(NegotiationState::AwaitingSelection)?;
        self.await_selection()
    }

    fn await_selection(&mut self) -> Result<HandlerOutcome, NegotiatorError> {
        let Some(selection) = self.presenter.get_finalized_choices() else {
            tracing::info!(target: LOG_TARGET, "User went back from the migration step");
            return Ok(HandlerOutcome::Backup);
        };
        self.apply(&selection)?;
        Ok(HandlerOutcome::Continue)
    }

    fn apply(&mut self, selection: &FinalizedSelection) -> Result<(), NegotiatorError> {
        self.transition(NegotiationState::Applying)?;
        self.round_had_errors = false;

        let summary = write_selection(&mut self.store, selection)?;
        tracing::info!(
            target: LOG_TARGET,
            "Wrote {} users on {} systems and {} new accounts",
            summary.candidates,
            summary.partitions,
            summary.new_users
        );
        self.store.set(RUN_AGAIN, "true")?;
        Ok(())
    }

    fn conclude_apply(&mut self) -> Result<HandlerOutcome, NegotiatorError> {
        if self.round_had_errors {
            tracing::info!(target: LOG_TARGET, "Selection was rejected, asking again");
            self.finish_round();
            self.transition(NegotiationState::AwaitingSelection)?;
            return self.await_selection();
        }
        self.store.set(RUN_AGAIN, "false")?;
        self.conclude()
    }

    fn conclude(&mut self) -> Result<HandlerOutcome, NegotiatorError> {
        self.finish_round();
        self.transition(NegotiationState::Done)?;
        Ok(HandlerOutcome::Succeeded)
    }

    /// Build the candidate tree, degrading to an empty one on store errors
    fn build_candidate_tree(&mut self, systems: &str) -> Result<Vec<Candidate>, StoreError> {
        match self.collect_candidates(systems) {
            Ok(tree) => Ok(tree),
            Err(err) => {
                for line in err.message_lines() {
                    tracing::error!(target: LOG_TARGET, "{}", line);
                }
                self.store.set(PARTITIONS, "")?;
                Ok(Vec::new())
            }
        }
    }

    fn collect_candidates(&mut self, systems: &str) -> Result<Vec<Candidate>, StoreError> {
        let mut tree = Vec::new();
        let mut retained = Vec::new();

        for entry in split_list(systems) {
            let Some(system) = SystemChoice::parse(&entry) else {
                tracing::warn!(target: LOG_TARGET, "Ignoring malformed system {:?}", entry);
                continue;
            };

            let users_key = users_key(&system.partition);
            let users = self.store.get_list(&users_key)?;
            if users.is_empty() {
                tracing::info!(target: LOG_TARGET, "Filtering out {} as it has no users", entry);
                continue;
            }

            for user in users {
                let items = self.store.get_list(&items_key(&system.partition, &user))?;
                if items.is_empty() {
                    tracing::debug!(target: LOG_TARGET, "{} on {} has nothing to import", user, entry);
                    continue;
                }
                tree.push(Candidate::new(&system.partition, user, &system.os_label, items));
            }

            // checkboxes start unticked, the store has to agree
            self.store.set(&users_key, "")?;
            retained.push(entry);
        }

        self.store.set(PARTITIONS, &join_list(&retained))?;
        Ok(tree)
    }

    fn confirm_unmount(&mut self, question: &QuestionId) -> Result<(), StoreError> {
        let (title, body) = self.describe(question);
        let choice = self.presenter.confirm_dialog(
            &title,
            &body,
            &[DialogChoice::GoBack, DialogChoice::Continue],
        );
        let answer = match choice {
            Some(DialogChoice::GoBack) => "false",
            Some(DialogChoice::Continue) | None => "true",
        };
        self.store.preseed(question.as_str(), answer, Encoding::Plain)
    }

    fn preseed_skip(&mut self, question: &QuestionId) -> Result<(), StoreError> {
        self.store
            .preseed(question.as_str(), &self.config.skip_answer, Encoding::Plain)
    }

    /// Short and extended description, falling back to the identifier
    fn describe(&mut self, question: &QuestionId) -> (String, String) {
        let title = self
            .store
            .description(question.as_str())
            .unwrap_or_else(|_| question.to_string());
        let body = self
            .store
            .extended_description(question.as_str())
            .unwrap_or_default();
        (title, body)
    }

    fn transition(&mut self, to: NegotiationState) -> Result<(), StateMachineError> {
        validate_transition(self.state, to)?;
        tracing::debug!(target: LOG_TARGET, "{:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::StaticInspector;
    use crate::presenter::MockPresenter;
    use crate::types::{FieldKind, NewUserCredentials};
    use indexmap::IndexMap;
    use mig_store::{MemoryStore, CHOICES, DESCRIPTION, EXTENDED_DESCRIPTION};
    use pretty_assertions::assert_eq;

    const HDA1: &str = "Windows XP (/dev/hda1)";
    const HDA2: &str = "Windows Vista (/dev/hda2)";
    const ALICE_PASSWORD: &str = "migration-assistant/hda1/alice/password";

    type Negotiator = MigrationNegotiator<MemoryStore, StaticInspector, MockPresenter>;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_value(PARTITIONS, "")
            .with_meta(PARTITIONS, CHOICES, format!("{HDA1}, {HDA2}"))
            .with_value(RUN_AGAIN, "")
            .with_value("migration-assistant/hda1/users", "")
            .with_meta("migration-assistant/hda1/users", CHOICES, "alice")
            .with_value("migration-assistant/hda1/alice/items", "")
            .with_meta("migration-assistant/hda1/alice/items", CHOICES, "docs, photos")
            .with_value("migration-assistant/hda1/alice/user", "")
            .with_value(ALICE_PASSWORD, "")
            .with_value("migration-assistant/failed-unmount", "")
            .with_meta("migration-assistant/failed-unmount", DESCRIPTION, "Unmount failed")
            .with_meta(
                "migration-assistant/failed-unmount",
                EXTENDED_DESCRIPTION,
                "/dev/hda1 is busy",
            )
            .with_value("migration-assistant/password-empty", "")
            .with_meta(
                "migration-assistant/password-empty",
                EXTENDED_DESCRIPTION,
                "You must enter a password.",
            )
    }

    fn inspector() -> StaticInspector {
        StaticInspector::new()
            .with_partition("=dev=hda", "1", "/dev/hda1", Some("1 1 100 primary ntfs"))
            .with_partition("=dev=hda", "2", "/dev/hda2", Some("2 2 100 primary F ext3"))
    }

    fn negotiator(presenter: MockPresenter) -> Negotiator {
        MigrationNegotiator::new(MigrationConfig::default(), store(), inspector(), presenter)
    }

    fn run(negotiator: &mut Negotiator, id: &str) -> HandlerOutcome {
        negotiator.run(Priority::High, &QuestionId::new(id)).unwrap()
    }

    fn walk_discovery(negotiator: &mut Negotiator) {
        for id in [
            PARTITIONS,
            "migration-assistant/hda1/users",
            "migration-assistant/hda1/alice/items",
            "migration-assistant/hda1/alice/user",
            ALICE_PASSWORD,
        ] {
            assert_eq!(run(negotiator, id), HandlerOutcome::Continue);
        }
    }

    fn alice_selection() -> FinalizedSelection {
        let candidate = Candidate::new("hda1", "alice", "Windows XP", vec!["docs".to_string()])
            .with_new_user("alice2")
            .selected();
        FinalizedSelection::new(vec![candidate], IndexMap::new())
    }

    #[test]
    fn discovery_answers_every_question() {
        let mut negotiator = negotiator(MockPresenter::new());
        walk_discovery(&mut negotiator);

        let store = negotiator.store();
        assert_eq!(store.value(PARTITIONS), Some(HDA1));
        assert_eq!(store.value("migration-assistant/hda1/users"), Some("alice"));
        assert_eq!(
            store.value("migration-assistant/hda1/alice/items"),
            Some("docs, photos")
        );
        assert_eq!(
            store.value("migration-assistant/hda1/alice/user"),
            Some("skip-question")
        );
        assert_eq!(store.value(ALICE_PASSWORD), Some("skip-question"));
        assert_eq!(store.flag(PARTITIONS, "seen"), Some("true"));
        assert_eq!(negotiator.state(), NegotiationState::DiscoveryActive);
        assert!(negotiator.is_first_run());
    }

    #[test]
    fn unreadable_state_offers_no_systems() {
        let mut negotiator = MigrationNegotiator::new(
            MigrationConfig::default(),
            store(),
            StaticInspector::new().with_partition("=dev=hda", "1", "/dev/hda1", None),
            MockPresenter::new(),
        );
        run(&mut negotiator, PARTITIONS);
        assert_eq!(negotiator.store().value(PARTITIONS), Some(""));
    }

    #[test]
    fn unlistable_partitions_offer_no_systems() {
        let inspector: StaticInspector =
            serde_json::from_str(r#"{ "disks": { "=dev=hda": [["", "1"]] } }"#).unwrap();
        let mut negotiator = MigrationNegotiator::new(
            MigrationConfig::default(),
            store(),
            inspector,
            MockPresenter::new(),
        );

        assert_eq!(run(&mut negotiator, PARTITIONS), HandlerOutcome::Continue);
        assert_eq!(negotiator.store().value(PARTITIONS), Some(""));
        assert_eq!(negotiator.state(), NegotiationState::DiscoveryActive);
    }

    #[test]
    fn missing_partitions_question_ends_the_round() {
        let mut negotiator = MigrationNegotiator::new(
            MigrationConfig::default(),
            MemoryStore::new().with_value(RUN_AGAIN, ""),
            inspector(),
            MockPresenter::new(),
        );

        assert_eq!(run(&mut negotiator, RUN_AGAIN), HandlerOutcome::Succeeded);
        assert_eq!(negotiator.store().value(RUN_AGAIN), Some("false"));
        assert_eq!(negotiator.state(), NegotiationState::Done);
    }

    #[test]
    fn trigger_with_questions_asks_the_user_and_applies() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_present_choices()
            .withf(|candidates| {
                candidates.len() == 1
                    && candidates[0].partition == "hda1"
                    && candidates[0].source_user == "alice"
                    && candidates[0].os_label == "Windows XP"
                    && candidates[0].items.iter().collect::<Vec<_>>() == ["docs", "photos"]
            })
            .times(1)
            .return_const(());
        presenter
            .expect_get_finalized_choices()
            .times(1)
            .returning(|| Some(alice_selection()));

        let mut negotiator = negotiator(presenter);
        walk_discovery(&mut negotiator);
        assert_eq!(run(&mut negotiator, RUN_AGAIN), HandlerOutcome::Continue);

        let store = negotiator.store();
        assert_eq!(store.value(RUN_AGAIN), Some("true"));
        assert_eq!(store.value("migration-assistant/hda1/users"), Some("alice"));
        assert_eq!(
            store.value("migration-assistant/hda1/alice/user"),
            Some("alice2")
        );
        assert_eq!(negotiator.state(), NegotiationState::Applying);
        assert!(!negotiator.is_first_run());
    }

    #[test]
    fn tree_build_clears_users_and_prunes_systems() {
        let mut presenter = MockPresenter::new();
        presenter.expect_present_choices().return_const(());
        presenter.expect_get_finalized_choices().return_const(None);

        let mut negotiator = MigrationNegotiator::new(
            MigrationConfig::default(),
            store()
                .with_value(PARTITIONS, format!("{HDA1}, {HDA2}"))
                .with_value("migration-assistant/hda1/users", "alice")
                .with_value("migration-assistant/hda1/alice/items", "docs")
                .with_value("migration-assistant/hda2/users", ""),
            inspector(),
            presenter,
        );
        run(&mut negotiator, "migration-assistant/hda1/alice/user");
        run(&mut negotiator, RUN_AGAIN);

        let store = negotiator.store();
        assert_eq!(store.value(PARTITIONS), Some(HDA1));
        assert_eq!(store.last_set("migration-assistant/hda1/users"), Some(""));
        assert_eq!(negotiator.candidates().len(), 1);
    }

    #[test]
    fn backing_out_keeps_awaiting_selection() {
        let mut presenter = MockPresenter::new();
        presenter.expect_present_choices().times(1).return_const(());
        presenter
            .expect_get_finalized_choices()
            .times(1)
            .return_const(None);

        let mut negotiator = negotiator(presenter);
        walk_discovery(&mut negotiator);
        assert_eq!(run(&mut negotiator, RUN_AGAIN), HandlerOutcome::Backup);
        assert_eq!(negotiator.state(), NegotiationState::AwaitingSelection);
        assert_eq!(negotiator.store().value(RUN_AGAIN), Some(""));
    }

    #[test]
    fn no_systems_finishes_without_presenter() {
        let mut negotiator = MigrationNegotiator::new(
            MigrationConfig::default(),
            store(),
            StaticInspector::new(),
            MockPresenter::new(),
        );
        run(&mut negotiator, PARTITIONS);
        assert_eq!(run(&mut negotiator, RUN_AGAIN), HandlerOutcome::Succeeded);
        assert_eq!(negotiator.store().value(RUN_AGAIN), Some("false"));
        assert_eq!(negotiator.state(), NegotiationState::Done);
        assert!(negotiator.is_first_run());
    }

    #[test]
    fn trigger_alone_skips_presenter() {
        let mut negotiator = MigrationNegotiator::new(
            MigrationConfig::default(),
            store().with_value(PARTITIONS, HDA1),
            inspector(),
            MockPresenter::new(),
        );
        assert_eq!(run(&mut negotiator, RUN_AGAIN), HandlerOutcome::Succeeded);
        assert_eq!(negotiator.state(), NegotiationState::Done);
        assert!(!negotiator.is_first_run());
    }

    #[test]
    fn failed_unmount_go_back_answers_false() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_confirm_dialog()
            .withf(|title, body, choices| {
                title == "Unmount failed"
                    && body == "/dev/hda1 is busy"
                    && choices == [DialogChoice::GoBack, DialogChoice::Continue]
            })
            .times(1)
            .return_const(Some(DialogChoice::GoBack));

        let mut negotiator = negotiator(presenter);
        run(&mut negotiator, "migration-assistant/failed-unmount");
        assert_eq!(
            negotiator.store().value("migration-assistant/failed-unmount"),
            Some("false")
        );
    }

    #[test]
    fn failed_unmount_dismissed_answers_true() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_confirm_dialog()
            .times(1)
            .return_const(None);

        let mut negotiator = negotiator(presenter);
        run(&mut negotiator, "migration-assistant/failed-unmount");
        assert_eq!(
            negotiator.store().value("migration-assistant/failed-unmount"),
            Some("true")
        );
    }

    #[test]
    fn recoverable_error_is_reported_once_on_its_question() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_report_field_error()
            .withf(|message, username, field| {
                message == "You must enter a password."
                    && username == "alice"
                    && *field == FieldKind::Password
            })
            .times(1)
            .return_const(());

        let mut negotiator = negotiator(presenter);
        negotiator
            .error(Priority::Critical, &QuestionId::new("migration-assistant/password-empty"))
            .unwrap();
        assert!(negotiator.pending_error().is_some());

        run(&mut negotiator, "migration-assistant/hda1/users");
        assert!(negotiator.pending_error().is_some());

        run(&mut negotiator, ALICE_PASSWORD);
        assert!(negotiator.pending_error().is_none());
        assert_eq!(negotiator.store().value(ALICE_PASSWORD), Some("skip-question"));

        run(&mut negotiator, ALICE_PASSWORD);
    }

    #[test]
    fn unknown_error_is_fatal_dialog() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_report_fatal_error()
            .withf(|title, body| title == "Unmount failed" && body == "/dev/hda1 is busy")
            .times(1)
            .return_const(());

        let mut negotiator = negotiator(presenter);
        let outcome = negotiator
            .error(Priority::Critical, &QuestionId::new("migration-assistant/failed-unmount"))
            .unwrap();
        assert_eq!(outcome, HandlerOutcome::Continue);
        assert!(negotiator.pending_error().is_none());
    }

    #[test]
    fn uncorrelated_error_surfaces_at_round_end() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_report_fatal_error()
            .withf(|title, body| {
                title == UNRECOVERED_ERROR_TITLE && body == "You must enter a password."
            })
            .times(1)
            .return_const(());

        let mut negotiator = negotiator(presenter);
        negotiator
            .error(Priority::Critical, &QuestionId::new("migration-assistant/password-empty"))
            .unwrap();
        negotiator.finish_round();
        negotiator.finish_round();
    }

    #[test]
    fn stale_error_is_reported_when_the_next_round_starts() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_report_fatal_error()
            .withf(|title, body| {
                title == UNRECOVERED_ERROR_TITLE && body == "You must enter a password."
            })
            .times(1)
            .return_const(());

        let mut negotiator = negotiator(presenter);
        negotiator
            .error(Priority::Critical, &QuestionId::new("migration-assistant/password-empty"))
            .unwrap();
        negotiator.start_round();
        assert!(negotiator.pending_error().is_none());
    }

    #[test]
    fn rejected_selection_is_asked_again() {
        let mut presenter = MockPresenter::new();
        presenter.expect_present_choices().times(1).return_const(());
        presenter
            .expect_get_finalized_choices()
            .times(2)
            .returning(|| Some(alice_selection()));
        presenter.expect_report_field_error().times(1).return_const(());

        let mut negotiator = negotiator(presenter);
        walk_discovery(&mut negotiator);
        run(&mut negotiator, RUN_AGAIN);

        negotiator
            .error(Priority::Critical, &QuestionId::new("migration-assistant/password-empty"))
            .unwrap();
        run(&mut negotiator, ALICE_PASSWORD);
        assert_eq!(run(&mut negotiator, RUN_AGAIN), HandlerOutcome::Continue);
        assert_eq!(negotiator.state(), NegotiationState::Applying);

        assert_eq!(run(&mut negotiator, RUN_AGAIN), HandlerOutcome::Succeeded);
        assert_eq!(negotiator.store().value(RUN_AGAIN), Some("false"));
        assert_eq!(negotiator.state(), NegotiationState::Done);
    }

    #[test]
    fn store_failure_degrades_to_empty_tree() {
        let mut presenter = MockPresenter::new();
        presenter
            .expect_present_choices()
            .withf(|candidates| candidates.is_empty())
            .times(1)
            .return_const(());
        presenter.expect_get_finalized_choices().return_const(None);

        let mut negotiator = MigrationNegotiator::new(
            MigrationConfig::default(),
            store()
                .with_value(PARTITIONS, HDA1)
                .with_failure("migration-assistant/hda1/users", "line one\nline two"),
            inspector(),
            presenter,
        );
        run(&mut negotiator, "migration-assistant/hda1/alice/user");
        run(&mut negotiator, RUN_AGAIN);
        assert_eq!(negotiator.store().value(PARTITIONS), Some(""));
    }

    #[test]
    fn new_user_passwords_are_escaped_on_apply() {
        let mut presenter = MockPresenter::new();
        presenter.expect_present_choices().return_const(());
        presenter.expect_get_finalized_choices().returning(|| {
            let mut new_users = IndexMap::new();
            new_users.insert(
                "u1".to_string(),
                NewUserCredentials {
                    fullname: None,
                    password: Some("a\\b".to_string()),
                    password_confirmation: None,
                },
            );
            Some(FinalizedSelection::new(Vec::new(), new_users))
        });

        let mut negotiator = negotiator(presenter);
        walk_discovery(&mut negotiator);
        run(&mut negotiator, RUN_AGAIN);

        let store = negotiator.store();
        assert_eq!(
            store.value("migration-assistant/new-user/u1/password"),
            Some("a\\\\b")
        );
        assert_eq!(
            store.value("migration-assistant/new-user/u1/password-again"),
            Some("")
        );
        assert_eq!(
            store.value("migration-assistant/new-user/u1/fullname"),
            Some("")
        );
    }
}
