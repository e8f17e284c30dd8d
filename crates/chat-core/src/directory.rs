use std::collections::{HashMap, HashSet};

use crate::types::User;

/// Last-known user records plus the channels that currently reference them.
///
/// Every mutation accepts absent input and treats it as a no-op, so event
/// handlers can forward optional payload fields without checking them first.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    users: HashMap<String, User>,
    channel_refs: HashMap<String, HashSet<String>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `user.id`. Last write wins.
    pub fn upsert_user(&mut self, user: Option<&User>) {
        if let Some(user) = user {
            self.users.insert(user.id.clone(), user.clone());
        }
    }

    /// Upsert each user in order; later duplicates win.
    pub fn upsert_users<'a, I>(&mut self, users: I)
    where
        I: IntoIterator<Item = &'a User>,
    {
        for user in users {
            self.upsert_user(Some(user));
        }
    }

    /// Upsert `user` and record that `channel_id` references it.
    pub fn reference_user(&mut self, user: Option<&User>, channel_id: &str) {
        let Some(user) = user else {
            return;
        };
        self.upsert_user(Some(user));
        self.channel_refs
            .entry(user.id.clone())
            .or_default()
            .insert(channel_id.to_owned());
    }

    /// Remove every reference to `channel_id`. User records are kept.
    pub fn drop_channel(&mut self, channel_id: &str) {
        self.channel_refs.retain(|_, channels| {
            channels.remove(channel_id);
            !channels.is_empty()
        });
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Channels currently referencing `user_id`.
    pub fn channels_for(&self, user_id: &str) -> impl Iterator<Item = &str> {
        self.channel_refs
            .get(user_id)
            .into_iter()
            .flat_map(|channels| channels.iter().map(String::as_str))
    }

    pub fn is_referenced(&self, user_id: &str, channel_id: &str) -> bool {
        self.channel_refs
            .get(user_id)
            .is_some_and(|channels| channels.contains(channel_id))
    }

    /// Users referenced by `channel_id`, for presence invalidation.
    pub fn users_in_channel<'a>(&'a self, channel_id: &'a str) -> impl Iterator<Item = &'a User> {
        self.channel_refs
            .iter()
            .filter(move |(_, channels)| channels.contains(channel_id))
            .filter_map(|(user_id, _)| self.users.get(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str, online: bool) -> User {
        let mut user = User::new(id);
        user.name = Some(name.to_owned());
        user.online = Some(online);
        user
    }

    #[test]
    fn last_upsert_wins() {
        let mut directory = Directory::new();
        directory.upsert_user(Some(&user("alice", "Alice", false)));
        directory.upsert_user(Some(&user("alice", "Alice B.", true)));
        directory.upsert_user(Some(&user("alice", "Alice C.", false)));

        let stored = directory.user("alice").expect("alice should be stored");
        assert_eq!(stored.name.as_deref(), Some("Alice C."));
        assert_eq!(stored.online, Some(false));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn absent_input_is_ignored() {
        let mut directory = Directory::new();
        directory.upsert_user(None);
        directory.reference_user(None, "messaging:general");
        assert!(directory.is_empty());
    }

    #[test]
    fn batch_upsert_keeps_later_duplicates() {
        let mut directory = Directory::new();
        let batch = [
            user("alice", "first", false),
            user("bob", "Bob", true),
            user("alice", "second", true),
        ];
        directory.upsert_users(batch.iter());

        assert_eq!(directory.len(), 2);
        assert_eq!(
            directory.user("alice").and_then(|u| u.name.as_deref()),
            Some("second")
        );
    }

    #[test]
    fn referencing_unknown_user_upserts_it() {
        let mut directory = Directory::new();
        directory.reference_user(Some(&user("carol", "Carol", true)), "messaging:general");

        assert!(directory.user("carol").is_some());
        assert!(directory.is_referenced("carol", "messaging:general"));
    }

    #[test]
    fn drop_channel_clears_references_but_keeps_users() {
        let mut directory = Directory::new();
        let alice = user("alice", "Alice", true);
        let bob = user("bob", "Bob", false);
        directory.reference_user(Some(&alice), "messaging:a");
        directory.reference_user(Some(&alice), "messaging:b");
        directory.reference_user(Some(&bob), "messaging:a");

        directory.drop_channel("messaging:a");

        assert!(!directory.is_referenced("alice", "messaging:a"));
        assert!(!directory.is_referenced("bob", "messaging:a"));
        assert!(directory.is_referenced("alice", "messaging:b"));
        assert_eq!(directory.users_in_channel("messaging:a").count(), 0);
        assert_eq!(directory.user("alice"), Some(&alice));
        assert_eq!(directory.user("bob"), Some(&bob));
        assert_eq!(directory.channels_for("bob").count(), 0);
    }

    #[test]
    fn lists_users_in_channel() {
        let mut directory = Directory::new();
        directory.reference_user(Some(&user("alice", "Alice", true)), "messaging:a");
        directory.reference_user(Some(&user("bob", "Bob", true)), "messaging:b");

        let ids: Vec<&str> = directory
            .users_in_channel("messaging:a")
            .map(|user| user.id.as_str())
            .collect();
        assert_eq!(ids, vec!["alice"]);
    }
}
