use chrono::{DateTime, Utc};
use tracing::warn;

use crate::types::{Message, MessagePayload, ReadPayload, ReadState};

const DEFAULT_MESSAGE_STATUS: &str = "received";

/// Parse an RFC 3339 wire timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
}

/// Convert a wire message into the canonical in-memory representation.
pub fn format_message(payload: MessagePayload) -> Message {
    format_message_at(payload, Utc::now())
}

/// Same as [`format_message`] with an explicit "now" used for missing
/// `created_at`/`updated_at` values.
pub fn format_message_at(payload: MessagePayload, now: DateTime<Utc>) -> Message {
    let created_at = timestamp_or(&payload.id, "created_at", payload.created_at.as_deref(), now);
    let updated_at = timestamp_or(&payload.id, "updated_at", payload.updated_at.as_deref(), now);
    let pinned_at = payload.pinned_at.as_deref().and_then(parse_timestamp);

    Message {
        id: payload.id,
        text: payload.text,
        kind: payload.kind,
        parent_id: payload.parent_id,
        user: payload.user,
        created_at,
        updated_at,
        pinned_at,
        status: payload
            .status
            .filter(|status| !status.is_empty())
            .unwrap_or_else(|| DEFAULT_MESSAGE_STATUS.to_owned()),
        reply_count: payload.reply_count,
        reaction_counts: payload.reaction_counts.unwrap_or_default(),
        reaction_scores: payload.reaction_scores.unwrap_or_default(),
        latest_reactions: payload.latest_reactions.unwrap_or_default(),
        own_reactions: payload.own_reactions.unwrap_or_default(),
        extra: payload.extra,
    }
}

/// Parse a read cursor entry. Entries with an unparseable `last_read` are
/// dropped.
pub fn format_read_state(payload: ReadPayload) -> Option<ReadState> {
    let Some(last_read) = parse_timestamp(&payload.last_read) else {
        warn!(
            user_id = %payload.user.id,
            last_read = %payload.last_read,
            "dropping read cursor with unparseable timestamp"
        );
        return None;
    };

    Some(ReadState {
        user: payload.user,
        last_read,
        last_read_message_id: payload.last_read_message_id,
        unread_messages: payload.unread_messages.unwrap_or(0),
    })
}

fn timestamp_or(
    message_id: &str,
    field: &'static str,
    raw: Option<&str>,
    fallback: DateTime<Utc>,
) -> DateTime<Utc> {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return fallback;
    };
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!(message_id, field, raw, "unparseable message timestamp");
        fallback
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::User;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 7, 12, 0, 0).single().expect("valid date")
    }

    #[test]
    fn parses_wire_timestamps() {
        let mut payload = MessagePayload::new("m1");
        payload.created_at = Some("2024-11-01T08:30:00Z".into());
        payload.updated_at = Some("2024-11-01T09:00:00+01:00".into());
        payload.pinned_at = Some("2024-11-02T10:00:00.250Z".into());

        let message = format_message_at(payload, now());

        assert_eq!(
            message.created_at,
            Utc.with_ymd_and_hms(2024, 11, 1, 8, 30, 0).single().expect("valid date")
        );
        assert_eq!(
            message.updated_at,
            Utc.with_ymd_and_hms(2024, 11, 1, 8, 0, 0).single().expect("valid date")
        );
        assert!(message.pinned_at.is_some());
    }

    #[test]
    fn fills_defaults_for_missing_fields() {
        let message = format_message_at(MessagePayload::new("m1"), now());

        assert_eq!(message.created_at, now());
        assert_eq!(message.updated_at, now());
        assert_eq!(message.pinned_at, None);
        assert_eq!(message.status, "received");
        assert!(message.reaction_counts.is_empty());
    }

    #[test]
    fn passes_through_unmodeled_fields() {
        let mut payload = MessagePayload::new("m1");
        payload.status = Some("sending".into());
        payload
            .extra
            .insert("custom".into(), serde_json::json!({ "pinned_by": "alice" }));

        let message = format_message_at(payload, now());

        assert_eq!(message.status, "sending");
        assert_eq!(
            message.extra.get("custom"),
            Some(&serde_json::json!({ "pinned_by": "alice" }))
        );
    }

    #[test]
    fn drops_read_cursor_with_bad_timestamp() {
        let read = ReadPayload {
            user: User::new("alice"),
            last_read: "yesterday".into(),
            last_read_message_id: None,
            unread_messages: Some(3),
        };
        assert_eq!(format_read_state(read), None);
    }

    #[test]
    fn read_cursor_defaults_unread_to_zero() {
        let read = ReadPayload {
            user: User::new("alice"),
            last_read: "2024-11-01T08:30:00Z".into(),
            last_read_message_id: Some("r2".into()),
            unread_messages: None,
        };
        let state = format_read_state(read).expect("cursor should parse");
        assert_eq!(state.unread_messages, 0);
        assert_eq!(state.last_read_message_id.as_deref(), Some("r2"));
    }
}
