//! Writing a finalized selection back to the store
//!
//! Selected candidates become per-user `items`/`user` answers plus a
//! per-partition `users` list. New accounts get `fullname`, `password` and
//! `password-again` answers; passwords are written in escaped mode and
//! missing fields as empty strings.

use crate::question::{
    items_key, new_user_key, new_username_key, users_key, FULLNAME_TEMPLATE, ITEMS_TEMPLATE,
    PASSWORD_AGAIN_TEMPLATE, PASSWORD_TEMPLATE, USERS_TEMPLATE, USER_TEMPLATE,
};
use crate::types::{FinalizedSelection, NewUserCredentials};
use indexmap::IndexMap;
use mig_store::codec::join_list;
use mig_store::{ConfigStore, Encoding, StoreError};

/// What a selection write touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Selected candidates written
    pub candidates: usize,
    /// Partitions whose users list was written
    pub partitions: usize,
    /// New accounts written
    pub new_users: usize,
}

/// Register `key` from `template` and preseed it
fn register_and_preseed<S>(
    store: &mut S,
    template: &str,
    key: &str,
    value: &str,
    encoding: Encoding,
) -> Result<(), StoreError>
where
    S: ConfigStore + ?Sized,
{
    store.register(template, key)?;
    store.preseed(key, value, encoding)
}

/// Write a finalized selection
///
/// # Errors
/// Returns the first store error; earlier writes are not rolled back.
pub fn write_selection<S>(store: &mut S, selection: &FinalizedSelection) -> Result<WriteSummary, StoreError>
where
    S: ConfigStore + ?Sized,
{
    let mut summary = WriteSummary::default();
    let mut users: IndexMap<&str, Vec<&str>> = IndexMap::new();

    for candidate in selection.selected() {
        let part = candidate.partition.as_str();
        let user = candidate.source_user.as_str();

        register_and_preseed(
            store,
            ITEMS_TEMPLATE,
            &items_key(part, user),
            &join_list(&candidate.items),
            Encoding::Plain,
        )?;
        register_and_preseed(
            store,
            USER_TEMPLATE,
            &new_username_key(part, user),
            &candidate.new_user,
            Encoding::Plain,
        )?;

        users.entry(part).or_default().push(user);
        summary.candidates += 1;
    }

    for (part, part_users) in &users {
        register_and_preseed(
            store,
            USERS_TEMPLATE,
            &users_key(part),
            &join_list(part_users),
            Encoding::Plain,
        )?;
        summary.partitions += 1;
    }

    for (id, credentials) in &selection.new_users {
        write_new_user(store, id, credentials)?;
        summary.new_users += 1;
    }

    Ok(summary)
}

fn write_new_user<S>(store: &mut S, id: &str, credentials: &NewUserCredentials) -> Result<(), StoreError>
where
    S: ConfigStore + ?Sized,
{
    let fields = [
        (FULLNAME_TEMPLATE, "fullname", &credentials.fullname, Encoding::Plain),
        (PASSWORD_TEMPLATE, "password", &credentials.password, Encoding::Escaped),
        (
            PASSWORD_AGAIN_TEMPLATE,
            "password-again",
            &credentials.password_confirmation,
            Encoding::Escaped,
        ),
    ];

    for (template, field, value, encoding) in fields {
        register_and_preseed(
            store,
            template,
            &new_user_key(id, field),
            value.as_deref().unwrap_or_default(),
            encoding,
        )?;
    }
    Ok(())
}
