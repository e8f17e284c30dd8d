use std::collections::HashMap;

use tracing::debug;

use crate::{
    directory::Directory,
    error::ThreadError,
    thread::{ApplyOutcome, ReactionAggregator, ThreadView},
    types::{ThreadEvent, ThreadSnapshot, User},
};

/// Caller-owned container for one client session's reconciled state.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    directory: Directory,
    threads: HashMap<String, ThreadView>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut Directory {
        &mut self.directory
    }

    pub fn thread(&self, thread_id: &str) -> Option<&ThreadView> {
        self.threads.get(thread_id)
    }

    pub fn threads(&self) -> impl Iterator<Item = &ThreadView> {
        self.threads.values()
    }

    /// Build (or rebuild) a thread from a snapshot and reference every user
    /// it carries against the thread's channel.
    pub fn ingest_thread(&mut self, snapshot: ThreadSnapshot) -> &ThreadView {
        let view = ThreadView::from_snapshot(snapshot);
        let cid = view.channel().cid();
        for user in view.users() {
            self.directory.reference_user(Some(user), &cid);
        }

        let thread_id = view.id().to_owned();
        self.threads.insert(thread_id.clone(), view);
        &self.threads[&thread_id]
    }

    /// Route an event to its thread. Every user record the event carries is
    /// upserted; users are referenced against the thread's channel only when
    /// the thread accepted the event.
    pub fn apply_thread_event(
        &mut self,
        thread_id: &str,
        event: ThreadEvent,
        aggregator: &mut dyn ReactionAggregator,
    ) -> Result<ApplyOutcome, ThreadError> {
        let users: Vec<User> = event.users().into_iter().cloned().collect();
        self.directory.upsert_users(&users);

        let Some(view) = self.threads.get_mut(thread_id) else {
            debug!(thread_id, "event for unknown thread ignored");
            return Ok(ApplyOutcome::Ignored);
        };

        let outcome = view.apply(event, aggregator)?;
        if outcome == ApplyOutcome::Applied {
            let cid = view.channel().cid();
            for user in &users {
                self.directory.reference_user(Some(user), &cid);
            }
        }
        Ok(outcome)
    }

    /// Forget a torn-down channel: its threads and its user references.
    pub fn drop_channel(&mut self, channel_id: &str) {
        self.threads.retain(|_, view| view.channel().cid() != channel_id);
        self.directory.drop_channel(channel_id);
    }
}
