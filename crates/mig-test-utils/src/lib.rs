//! Testing utilities for the migration-assistant workspace
//!
//! Shared fixtures, a recording presenter and batched assertions.

#![allow(missing_docs)]

use indexmap::IndexMap;
use mig_core::config::RECOVERABLE_ERRORS;
use mig_core::question::{
    items_key, new_username_key, password_key, users_key, FAILED_UNMOUNT, PARTITIONS, RUN_AGAIN,
};
use mig_core::{
    Candidate, DialogChoice, FieldKind, FinalizedSelection, MigrationConfig, MigrationNegotiator,
    NewUserCredentials, Presenter, PresenterCall, StateRecord, StaticInspector, StoreEvent,
};
use mig_store::codec::join_list;
use mig_store::{MemoryStore, CHOICES, DESCRIPTION, EXTENDED_DESCRIPTION};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::panic::Location;

pub type TestNegotiator = MigrationNegotiator<MemoryStore, StaticInspector, RecordingPresenter>;

/// Extended description of each recoverable error, as the worker ships them
pub const ERROR_MESSAGES: [(&str, &str); 4] = [
    (
        "migration-assistant/password-mismatch",
        "The two passwords you entered were not the same. Please try again.",
    ),
    (
        "migration-assistant/password-empty",
        "You entered an empty password, which is not allowed.",
    ),
    (
        "migration-assistant/username-bad",
        "The username you entered is invalid.",
    ),
    (
        "migration-assistant/username-reserved",
        "The username you entered is reserved for use by the system.",
    ),
];

#[derive(Debug, Clone)]
struct System {
    label: String,
    partition: String,
    state: String,
    users: IndexMap<String, Vec<String>>,
}

impl System {
    fn choice(&self) -> String {
        format!("{} (/dev/{})", self.label, self.partition)
    }

    fn disk(&self) -> String {
        format!("=dev={}", self.partition.trim_end_matches(|c: char| c.is_ascii_digit()))
    }

    fn survives(&self) -> bool {
        !StateRecord::parse(&self.state).is_scheduled_for_format()
    }
}

/// Store and partition layout ready for a discovery pass
///
/// Every system becomes a choice of the partitions question and a partition
/// on its disk (`hda1` lives on `=dev=hda`). Every user gets the `items`,
/// `user` and `password` questions the worker would ask.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryFixture {
    systems: Vec<System>,
}

impl DiscoveryFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// With a system on `partition` whose contents survive partitioning
    pub fn with_system(self, label: &str, partition: &str) -> Self {
        let state = format!("1 {partition} 100 primary ntfs");
        self.with_system_state(label, partition, &state)
    }

    /// With a system whose partition state record is `state`
    pub fn with_system_state(mut self, label: &str, partition: &str, state: &str) -> Self {
        self.systems.push(System {
            label: label.to_string(),
            partition: partition.to_string(),
            state: state.to_string(),
            users: IndexMap::new(),
        });
        self
    }

    /// With a user on `partition` owning `items`
    ///
    /// # Panics
    /// If no system was declared on `partition`
    pub fn with_user(mut self, partition: &str, user: &str, items: &[&str]) -> Self {
        let system = self
            .systems
            .iter_mut()
            .find(|s| s.partition == partition)
            .unwrap_or_else(|| panic!("no system on {partition}"));
        system.users.insert(
            user.to_string(),
            items.iter().map(|i| (*i).to_string()).collect(),
        );
        self
    }

    /// Choice entry of the system on `partition`
    pub fn choice(&self, partition: &str) -> Option<String> {
        self.systems
            .iter()
            .find(|s| s.partition == partition)
            .map(System::choice)
    }

    pub fn store(&self) -> MemoryStore {
        let choices: Vec<String> = self.systems.iter().map(System::choice).collect();
        let mut store = MemoryStore::new()
            .with_value(PARTITIONS, "")
            .with_meta(PARTITIONS, CHOICES, join_list(&choices))
            .with_value(RUN_AGAIN, "")
            .with_value(FAILED_UNMOUNT, "")
            .with_meta(FAILED_UNMOUNT, DESCRIPTION, "Failed to unmount partitions")
            .with_meta(
                FAILED_UNMOUNT,
                EXTENDED_DESCRIPTION,
                "The migration assistant was unable to unmount the partitions it imported from.",
            );

        for (id, message) in ERROR_MESSAGES {
            store = store
                .with_value(id, "")
                .with_meta(id, DESCRIPTION, "Error")
                .with_meta(id, EXTENDED_DESCRIPTION, message);
        }

        for system in &self.systems {
            let part = &system.partition;
            store = store
                .with_value(users_key(part), "")
                .with_meta(users_key(part), CHOICES, join_list(system.users.keys()));
            for (user, items) in &system.users {
                store = store
                    .with_value(items_key(part, user), "")
                    .with_meta(items_key(part, user), CHOICES, join_list(items))
                    .with_value(new_username_key(part, user), "")
                    .with_value(password_key(part, user), "");
            }
        }
        store
    }

    pub fn inspector(&self) -> StaticInspector {
        self.systems.iter().fold(StaticInspector::new(), |inspector, system| {
            inspector.with_partition(
                system.disk(),
                system.partition.clone(),
                format!("/dev/{}", system.partition),
                Some(system.state.as_str()),
            )
        })
    }

    /// Events of a discovery pass over the systems that survive
    pub fn discovery_events(&self) -> Vec<StoreEvent> {
        let mut events = vec![StoreEvent::question(PARTITIONS)];
        for system in self.systems.iter().filter(|s| s.survives()) {
            let part = &system.partition;
            events.push(StoreEvent::question(users_key(part)));
            for user in system.users.keys() {
                events.push(StoreEvent::question(items_key(part, user)));
                events.push(StoreEvent::question(new_username_key(part, user)));
                events.push(StoreEvent::question(password_key(part, user)));
            }
        }
        events.push(StoreEvent::question(RUN_AGAIN));
        events
    }

    /// Negotiator over this fixture
    pub fn negotiator(&self, presenter: RecordingPresenter) -> TestNegotiator {
        MigrationNegotiator::new(
            MigrationConfig::default(),
            self.store(),
            self.inspector(),
            presenter,
        )
    }
}

/// What the user does when asked for a selection
#[derive(Debug, Clone)]
pub enum SelectionPlan {
    /// Tick every presented candidate, importing into an account of the same name
    AcceptAll,
    /// Tick the `(partition, user)` pairs listed
    Accept(Vec<(String, String)>),
    /// Return exactly this selection
    Exact(FinalizedSelection),
    /// Press back
    BackOut,
}

/// Presenter that records every call and answers from a plan
///
/// When the plans run out the user backs out; dialogs are dismissed unless
/// an answer was queued.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    plans: VecDeque<SelectionPlan>,
    confirmations: VecDeque<DialogChoice>,
    new_users: IndexMap<String, NewUserCredentials>,
    presented: Vec<Candidate>,
    calls: Vec<PresenterCall>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, plan: SelectionPlan) -> Self {
        self.plans.push_back(plan);
        self
    }

    pub fn with_confirmation(mut self, choice: DialogChoice) -> Self {
        self.confirmations.push_back(choice);
        self
    }

    /// With a new account added to every accepted selection
    pub fn with_new_user(mut self, id: &str, credentials: NewUserCredentials) -> Self {
        self.new_users.insert(id.to_string(), credentials);
        self
    }

    pub fn calls(&self) -> &[PresenterCall] {
        &self.calls
    }

    /// Candidates most recently presented
    pub fn presented(&self) -> &[Candidate] {
        &self.presented
    }

    pub fn presentations(&self) -> usize {
        self.count(|c| matches!(c, PresenterCall::PresentChoices { .. }))
    }

    pub fn selection_requests(&self) -> usize {
        self.count(|c| matches!(c, PresenterCall::GetFinalizedChoices { .. }))
    }

    /// `(message, username, field)` of every field error
    pub fn field_errors(&self) -> Vec<(&str, &str, FieldKind)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                PresenterCall::ReportFieldError {
                    message,
                    username,
                    field,
                } => Some((message.as_str(), username.as_str(), *field)),
                _ => None,
            })
            .collect()
    }

    /// `(title, body)` of every fatal error
    pub fn fatal_errors(&self) -> Vec<(&str, &str)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                PresenterCall::ReportFatalError { title, body } => {
                    Some((title.as_str(), body.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&PresenterCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn accept(&self, pick: impl Fn(&Candidate) -> bool) -> FinalizedSelection {
        let candidates = self
            .presented
            .iter()
            .cloned()
            .map(|c| {
                if pick(&c) {
                    let new_user = c.source_user.replace(' ', "").to_lowercase();
                    c.with_new_user(new_user).selected()
                } else {
                    c
                }
            })
            .collect();
        FinalizedSelection::new(candidates, self.new_users.clone())
    }
}

impl Presenter for RecordingPresenter {
    fn present_choices(&mut self, candidates: &[Candidate]) {
        self.presented = candidates.to_vec();
        self.calls.push(PresenterCall::PresentChoices {
            candidates: candidates.to_vec(),
        });
    }

    fn get_finalized_choices(&mut self) -> Option<FinalizedSelection> {
        let selection = match self.plans.pop_front().unwrap_or(SelectionPlan::BackOut) {
            SelectionPlan::AcceptAll => Some(self.accept(|_| true)),
            SelectionPlan::Accept(pairs) => Some(self.accept(|c| {
                pairs
                    .iter()
                    .any(|(part, user)| *part == c.partition && *user == c.source_user)
            })),
            SelectionPlan::Exact(selection) => Some(selection),
            SelectionPlan::BackOut => None,
        };
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
        let answer = self.confirmations.pop_front();
        self.calls.push(PresenterCall::ConfirmDialog {
            title: title.to_string(),
            body: body.to_string(),
            choices: choices.to_vec(),
            answer,
        });
        answer
    }
}

/// Collects check failures and reports them together
///
/// Checks never stop the test; [`finish`](Self::finish) panics once with
/// every failure and its location. Dropping a collector that still holds
/// failures panics the same way.
#[derive(Debug, Default)]
pub struct SoftAssertions {
    failures: Vec<String>,
}

impl SoftAssertions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure unless `condition` holds
    #[track_caller]
    pub fn check(&mut self, condition: bool, message: impl Into<String>) -> bool {
        if !condition {
            self.record(message.into());
        }
        condition
    }

    /// Record a failure unless `left == right`
    #[track_caller]
    pub fn check_eq<T>(&mut self, left: T, right: T, context: &str) -> bool
    where
        T: PartialEq + Debug,
    {
        let equal = left == right;
        if !equal {
            self.record(format!("{context}: {left:?} != {right:?}"));
        }
        equal
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Panic with every recorded failure, if any
    ///
    /// # Panics
    /// If any check failed
    #[track_caller]
    pub fn finish(mut self) {
        let failures = std::mem::take(&mut self.failures);
        if !failures.is_empty() {
            panic!("{}", render(&failures));
        }
    }

    #[track_caller]
    fn record(&mut self, message: String) {
        let location = Location::caller();
        self.failures
            .push(format!("{}:{}: {message}", location.file(), location.line()));
    }
}

impl Drop for SoftAssertions {
    fn drop(&mut self) {
        if !self.failures.is_empty() && !std::thread::panicking() {
            panic!("{}", render(&self.failures));
        }
    }
}

fn render(failures: &[String]) -> String {
    format!(
        "{} soft assertion(s) failed:\n  {}",
        failures.len(),
        failures.join("\n  ")
    )
}

/// Recoverable error identifiers the negotiator is configured with
pub fn recoverable_errors() -> impl Iterator<Item = &'static str> {
    RECOVERABLE_ERRORS.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_builds_worker_questions() {
        let fixture = DiscoveryFixture::new()
            .with_system("Windows XP", "hda1")
            .with_user("hda1", "John Doe", &["docs"]);
        let store = fixture.store();

        assert_eq!(
            store.question("migration-assistant/hda1/John:Doe/items").map(|q| q.meta[CHOICES].as_str()),
            Some("docs")
        );
        assert_eq!(fixture.choice("hda1").as_deref(), Some("Windows XP (/dev/hda1)"));
        assert_eq!(fixture.discovery_events().len(), 6);
    }

    #[test]
    fn formatted_systems_are_not_walked() {
        let fixture = DiscoveryFixture::new()
            .with_system_state("Windows XP", "hda1", "1 hda1 100 primary F ntfs")
            .with_user("hda1", "alice", &["docs"]);
        assert_eq!(
            fixture.discovery_events(),
            vec![StoreEvent::question(PARTITIONS), StoreEvent::question(RUN_AGAIN)]
        );
    }

    #[test]
    fn every_recoverable_error_has_a_message() {
        for id in recoverable_errors() {
            assert!(ERROR_MESSAGES.iter().any(|(e, _)| *e == id), "{id}");
        }
    }

    #[test]
    fn soft_assertions_collect_failures() {
        let mut soft = SoftAssertions::new();
        assert!(soft.check(true, "fine"));
        assert!(!soft.check(false, "first"));
        assert!(!soft.check_eq(1, 2, "second"));
        assert_eq!(soft.failures().len(), 2);
        assert!(soft.failures()[1].ends_with("second: 1 != 2"));

        let result = std::panic::catch_unwind(move || soft.finish());
        assert!(result.is_err());
    }

    #[test]
    fn clean_soft_assertions_finish_quietly() {
        let mut soft = SoftAssertions::new();
        soft.check_eq("a", "a", "same");
        assert!(soft.is_clean());
        soft.finish();
    }

    #[test]
    fn exhausted_plans_back_out() {
        let mut presenter = RecordingPresenter::new().with_plan(SelectionPlan::AcceptAll);
        presenter.present_choices(&[Candidate::new("hda1", "Alice Liddell", "XP", vec!["docs".to_string()])]);

        let selection = presenter.get_finalized_choices().unwrap();
        assert_eq!(selection.candidates[0].new_user, "aliceliddell");
        assert!(selection.candidates[0].selected);
        assert!(presenter.get_finalized_choices().is_none());
        assert_eq!(presenter.selection_requests(), 2);
    }
}
