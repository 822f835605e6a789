//! Conversions from database rows to the public API models.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use warbler_db::{Database, DbError, MessageRow, UserRow};
use warbler_types::models::{Message, User};

pub fn user_view(row: &UserRow) -> User {
    User {
        id: parse_id(&row.id, "user"),
        username: row.username.clone(),
        image_url: row.image_url.clone(),
        header_image_url: row.header_image_url.clone(),
        bio: row.bio.clone(),
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn user_views(rows: &[UserRow]) -> Vec<User> {
    rows.iter().map(user_view).collect()
}

/// Attach like counts and the viewer's own likes to a page of messages.
/// Runs inside a blocking DB task.
pub fn message_views(
    db: &Database,
    viewer_id: &str,
    rows: Vec<MessageRow>,
) -> Result<Vec<Message>, DbError> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let counts = db.like_counts(&ids)?;
    let liked = db.liked_among(viewer_id, &ids)?;

    Ok(rows
        .into_iter()
        .map(|row| Message {
            id: parse_id(&row.id, "message"),
            user_id: parse_id(&row.user_id, "author"),
            likes: counts.get(&row.id).copied().unwrap_or(0),
            liked: liked.contains(&row.id),
            created_at: parse_timestamp(&row.created_at),
            text: row.text,
            username: row.username,
        })
        .collect())
}

fn parse_id(value: &str, what: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, value, e);
        Uuid::default()
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') default has no timezone.
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", value, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_shapes() {
        let rfc = parse_timestamp("2024-03-01T12:30:00.123456Z");
        assert_eq!(rfc.to_rfc3339(), "2024-03-01T12:30:00.123456+00:00");

        let sqlite = parse_timestamp("2024-03-01 12:30:00");
        assert_eq!(sqlite.to_rfc3339(), "2024-03-01T12:30:00+00:00");

        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }

    #[test]
    fn corrupt_ids_fall_back_to_nil() {
        assert_eq!(parse_id("nope", "user"), Uuid::nil());
    }
}
