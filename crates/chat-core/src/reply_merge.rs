use crate::types::Message;

/// What [`merge_reply_in_place`] did with the incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// An entry with the same id was replaced at `index`.
    Replaced { index: usize },
    /// The message was new and was appended at `index`.
    Appended { index: usize },
    /// The message was new and appending was not requested.
    Ignored,
}

/// Merge `incoming` into `replies` without reordering.
///
/// A matching id is replaced in its current slot. A new id is appended at the
/// tail only when `append_if_new` is set; otherwise the call is a no-op.
pub fn merge_reply_in_place(
    replies: &mut Vec<Message>,
    incoming: Message,
    append_if_new: bool,
) -> MergeOutcome {
    if let Some(index) = replies.iter().position(|reply| reply.id == incoming.id) {
        replies[index] = incoming;
        return MergeOutcome::Replaced { index };
    }

    if !append_if_new {
        return MergeOutcome::Ignored;
    }

    replies.push(incoming);
    MergeOutcome::Appended {
        index: replies.len() - 1,
    }
}

/// Pure variant of [`merge_reply_in_place`] returning the merged sequence.
pub fn merge_reply(existing: &[Message], incoming: Message, append_if_new: bool) -> Vec<Message> {
    let mut merged = existing.to_vec();
    merge_reply_in_place(&mut merged, incoming, append_if_new);
    merged
}
