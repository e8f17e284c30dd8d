use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server fields the client does not model, kept verbatim.
pub type Extra = Map<String, Value>;

/// User record as last reported by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Unique user identifier.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Presence flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    /// Application role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Remaining profile/presence fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl User {
    /// Minimal user record carrying only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            online: None,
            role: None,
            extra: Extra::new(),
        }
    }
}

/// Reaction as delivered by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reaction {
    /// Reaction type, for example `like`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Message exactly as it appears on the wire (timestamps still strings).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePayload {
    /// Message identifier.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Root message id when this message is a thread reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_counts: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_scores: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_reactions: Option<Vec<Reaction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_reactions: Option<Vec<Reaction>>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MessagePayload {
    /// Bare payload with only an id, mostly useful for building events.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: None,
            kind: None,
            parent_id: None,
            user: None,
            created_at: None,
            updated_at: None,
            pinned_at: None,
            status: None,
            reply_count: None,
            reaction_counts: None,
            reaction_scores: None,
            latest_reactions: None,
            own_reactions: None,
            extra: Extra::new(),
        }
    }

    /// Parent id, treating an empty string the same as a missing one.
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Canonical in-memory message with parsed timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub text: Option<String>,
    pub kind: Option<String>,
    pub parent_id: Option<String>,
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pinned_at: Option<DateTime<Utc>>,
    /// Delivery status; `received` when the server did not send one.
    pub status: String,
    pub reply_count: Option<u64>,
    pub reaction_counts: BTreeMap<String, i64>,
    pub reaction_scores: BTreeMap<String, i64>,
    pub latest_reactions: Vec<Reaction>,
    pub own_reactions: Vec<Reaction>,
    pub extra: Extra,
}

/// Channel the thread belongs to. Only the addressing fields are modeled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ChannelSummary {
    /// Channel id in `type:id` form.
    pub fn cid(&self) -> String {
        match self.cid.as_deref().filter(|cid| !cid.is_empty()) {
            Some(cid) => cid.to_owned(),
            None => format!("{}:{}", self.kind, self.id),
        }
    }
}

/// Thread participant entry, passed through as received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadParticipant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Read cursor entry as delivered by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadPayload {
    pub user: User,
    pub last_read: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_messages: Option<u32>,
}

/// Parsed per-user read cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadState {
    pub user: User,
    pub last_read: DateTime<Utc>,
    pub last_read_message_id: Option<String>,
    pub unread_messages: u32,
}

/// Full thread snapshot used to (re)initialize a thread view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadSnapshot {
    pub parent_message_id: String,
    pub parent_message: MessagePayload,
    #[serde(default)]
    pub latest_replies: Vec<MessagePayload>,
    #[serde(default)]
    pub thread_participants: Vec<ThreadParticipant>,
    #[serde(default)]
    pub reply_count: u64,
    pub channel: ChannelSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<Vec<ReadPayload>>,
    /// Fields such as `title`, `created_at` or `channel_cid`.
    #[serde(flatten)]
    pub extra: Extra,
}

/// Incremental thread change delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ThreadEvent {
    /// A reply was created.
    NewReply(MessagePayload),
    /// A known reply was edited.
    ReplyUpdated(MessagePayload),
    /// Some message was edited; it may be the root, a reply or unrelated.
    MessageUpdated(MessagePayload),
    /// A reaction was added to `message`.
    ReactionAdded {
        reaction: Reaction,
        message: Option<MessagePayload>,
        /// Replace the user's previous reaction instead of adding another.
        enforce_unique: bool,
    },
    /// A reaction was removed from `message`.
    ReactionRemoved {
        reaction: Reaction,
        message: Option<MessagePayload>,
    },
    /// A user's read cursor moved.
    ReadUpdated(ReadPayload),
}

impl ThreadEvent {
    /// Every user record carried by the event.
    pub fn users(&self) -> Vec<&User> {
        let mut users = Vec::new();
        match self {
            Self::NewReply(message) | Self::ReplyUpdated(message) | Self::MessageUpdated(message) => {
                users.extend(message.user.as_ref());
            }
            Self::ReactionAdded {
                reaction, message, ..
            }
            | Self::ReactionRemoved { reaction, message } => {
                users.extend(reaction.user.as_ref());
                users.extend(message.as_ref().and_then(|message| message.user.as_ref()));
            }
            Self::ReadUpdated(read) => users.push(&read.user),
        }
        users
    }
}
