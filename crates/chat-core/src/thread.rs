use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    error::ThreadError,
    normalization::{format_message, format_read_state},
    reply_merge::{MergeOutcome, merge_reply_in_place},
    types::{
        ChannelSummary, Extra, Message, MessagePayload, Reaction, ReadPayload, ReadState,
        ThreadEvent, ThreadParticipant, ThreadSnapshot, User,
    },
};

/// Reaction arithmetic owned by the channel state.
///
/// Given a reaction and the message it targets, implementations return the
/// message with its aggregates (counts, scores, latest/own reactions)
/// recomputed. The thread view only decides which reply gets replaced.
pub trait ReactionAggregator {
    fn add_reaction(
        &mut self,
        reaction: &Reaction,
        message: &MessagePayload,
        enforce_unique: bool,
    ) -> MessagePayload;

    fn remove_reaction(&mut self, reaction: &Reaction, message: &MessagePayload) -> MessagePayload;
}

/// Result of applying a [`ThreadEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The view changed.
    Applied,
    /// The event did not target anything this view holds.
    Ignored,
}

impl From<bool> for ApplyOutcome {
    fn from(changed: bool) -> Self {
        if changed { Self::Applied } else { Self::Ignored }
    }
}

/// Reconciled state of one thread.
///
/// Built from a [`ThreadSnapshot`] and then mutated by events in the order
/// the caller delivers them.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadView {
    id: String,
    root: Message,
    replies: Vec<Message>,
    participants: Vec<ThreadParticipant>,
    reply_count: u64,
    channel: ChannelSummary,
    read: BTreeMap<String, ReadState>,
    extra: Extra,
}

impl ThreadView {
    pub fn from_snapshot(snapshot: ThreadSnapshot) -> Self {
        let ThreadSnapshot {
            parent_message_id,
            parent_message,
            latest_replies,
            thread_participants,
            reply_count,
            channel,
            read,
            extra,
        } = snapshot;

        let read = read
            .into_iter()
            .flatten()
            .filter_map(format_read_state)
            .map(|state| (state.user.id.clone(), state))
            .collect();

        Self {
            id: parent_message_id,
            root: format_message(parent_message),
            replies: latest_replies.into_iter().map(format_message).collect(),
            participants: thread_participants,
            reply_count,
            channel,
            read,
            extra,
        }
    }

    /// Thread id (the root message id reported by the snapshot).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Message {
        &self.root
    }

    /// Replies in display order.
    pub fn replies(&self) -> &[Message] {
        &self.replies
    }

    pub fn participants(&self) -> &[ThreadParticipant] {
        &self.participants
    }

    /// Reply count as last reported by the server. May differ from
    /// `replies().len()`.
    pub fn reply_count(&self) -> u64 {
        self.reply_count
    }

    pub fn set_reply_count(&mut self, reply_count: u64) {
        self.reply_count = reply_count;
    }

    pub fn channel(&self) -> &ChannelSummary {
        &self.channel
    }

    pub fn read_state(&self, user_id: &str) -> Option<&ReadState> {
        self.read.get(user_id)
    }

    pub fn read_states(&self) -> impl Iterator<Item = &ReadState> {
        self.read.values()
    }

    /// Snapshot fields this view does not model.
    pub fn extra(&self) -> &Extra {
        &self.extra
    }

    /// Every user record carried by the thread.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.root
            .user
            .iter()
            .chain(self.replies.iter().filter_map(|reply| reply.user.as_ref()))
            .chain(
                self.participants
                    .iter()
                    .filter_map(|participant| participant.user.as_ref()),
            )
            .chain(self.read.values().map(|state| &state.user))
    }

    /// Add a new reply, or replace it if the id is already known.
    pub fn add_reply(&mut self, payload: MessagePayload) -> Result<(), ThreadError> {
        if payload.parent() != Some(self.root.id.as_str()) {
            return Err(ThreadError::MessageNotInThread {
                message_id: payload.id,
                parent_id: payload.parent_id,
                thread_root_id: self.root.id.clone(),
            });
        }

        merge_reply_in_place(&mut self.replies, format_message(payload), true);
        Ok(())
    }

    /// Replace a known reply. Updates for unknown replies are dropped.
    pub fn update_reply(&mut self, payload: MessagePayload) -> bool {
        let message_id = payload.id.clone();
        let outcome = merge_reply_in_place(&mut self.replies, format_message(payload), false);
        if outcome == MergeOutcome::Ignored {
            debug!(thread_id = %self.id, %message_id, "dropping update for unknown reply");
            return false;
        }
        true
    }

    /// Route a generic "message updated" event to the root or a reply.
    pub fn update_message_or_reply_if_exists(&mut self, payload: MessagePayload) -> bool {
        let is_reply = match payload.parent() {
            Some(parent_id) if parent_id == self.root.id => true,
            Some(_) => return false,
            None if payload.id == self.root.id => false,
            None => return false,
        };

        if is_reply {
            return self.update_reply(payload);
        }
        self.root = format_message(payload);
        true
    }

    /// Apply an added reaction to the reply targeted by `message`.
    pub fn add_reaction(
        &mut self,
        reaction: &Reaction,
        message: Option<&MessagePayload>,
        enforce_unique: bool,
        aggregator: &mut dyn ReactionAggregator,
    ) -> bool {
        self.replace_reply_with(message, |message| {
            aggregator.add_reaction(reaction, message, enforce_unique)
        })
    }

    /// Apply a removed reaction to the reply targeted by `message`.
    pub fn remove_reaction(
        &mut self,
        reaction: &Reaction,
        message: Option<&MessagePayload>,
        aggregator: &mut dyn ReactionAggregator,
    ) -> bool {
        self.replace_reply_with(message, |message| {
            aggregator.remove_reaction(reaction, message)
        })
    }

    /// Store a read cursor update for one user, as sent by the server.
    pub fn mark_read(&mut self, payload: ReadPayload) -> bool {
        let Some(state) = format_read_state(payload) else {
            return false;
        };

        if let Some(previous) = self.read.get(&state.user.id)
            && previous.last_read > state.last_read
        {
            debug!(
                thread_id = %self.id,
                user_id = %state.user.id,
                previous = %previous.last_read,
                incoming = %state.last_read,
                "read cursor moved backwards"
            );
        }

        self.read.insert(state.user.id.clone(), state);
        true
    }

    /// Apply one transport event.
    pub fn apply(
        &mut self,
        event: ThreadEvent,
        aggregator: &mut dyn ReactionAggregator,
    ) -> Result<ApplyOutcome, ThreadError> {
        let changed = match event {
            ThreadEvent::NewReply(payload) => {
                self.add_reply(payload)?;
                true
            }
            ThreadEvent::ReplyUpdated(payload) => self.update_reply(payload),
            ThreadEvent::MessageUpdated(payload) => self.update_message_or_reply_if_exists(payload),
            ThreadEvent::ReactionAdded {
                reaction,
                message,
                enforce_unique,
            } => self.add_reaction(&reaction, message.as_ref(), enforce_unique, aggregator),
            ThreadEvent::ReactionRemoved { reaction, message } => {
                self.remove_reaction(&reaction, message.as_ref(), aggregator)
            }
            ThreadEvent::ReadUpdated(payload) => self.mark_read(payload),
        };

        Ok(changed.into())
    }

    fn replace_reply_with<F>(&mut self, message: Option<&MessagePayload>, recompute: F) -> bool
    where
        F: FnOnce(&MessagePayload) -> MessagePayload,
    {
        let Some(message) = message else {
            return false;
        };
        let Some(index) = self.replies.iter().position(|reply| reply.id == message.id) else {
            return false;
        };

        self.replies[index] = format_message(recompute(message));
        true
    }
}
