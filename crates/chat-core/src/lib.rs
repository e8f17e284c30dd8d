//! Client-side conversation state shared by transport and request layers.
//!
//! This crate owns the reconciliation rules for threads, replies, reactions
//! and user presence, plus the error categories and retry policy used by the
//! request client.

/// User directory and channel reference bookkeeping.
pub mod directory;
/// Error categories and reconciliation errors.
pub mod error;
/// Wire payload formatting (timestamps, defaults).
pub mod normalization;
/// Ordered, deduplicating reply merge.
pub mod reply_merge;
/// Backoff policy used by the token-expiry retry loop.
pub mod retry;
/// Session-level container for the directory and thread views.
pub mod state;
/// Thread reconciliation.
pub mod thread;
/// Wire and in-memory data model.
pub mod types;

pub use directory::Directory;
pub use error::{
    ErrorCategory, TOKEN_EXPIRED_CODE, ThreadError, classify_api_code, classify_http_status,
};
pub use normalization::{format_message, format_message_at, format_read_state, parse_timestamp};
pub use reply_merge::{MergeOutcome, merge_reply, merge_reply_in_place};
pub use retry::RetryPolicy;
pub use state::ChatState;
pub use thread::{ApplyOutcome, ReactionAggregator, ThreadView};
pub use types::{
    ChannelSummary, Extra, Message, MessagePayload, Reaction, ReadPayload, ReadState,
    ThreadEvent, ThreadParticipant, ThreadSnapshot, User,
};
