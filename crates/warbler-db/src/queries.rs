use std::collections::{HashMap, HashSet};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, Params, Row, params, types::ToSql};
use tracing::info;
use uuid::Uuid;
use warbler_types::models::UserStats;

use crate::Database;
use crate::error::{DbError, Result};
use crate::migrations::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL};
use crate::models::{MessageRow, NewUser, ProfileUpdate, UserRow};
use crate::password::{hash_password, verify_password};

const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.password, u.image_url, u.header_image_url, u.bio, u.created_at";

const MESSAGE_COLUMNS: &str = "m.id, m.text, m.user_id, u.username, m.created_at";

impl Database {
    // -- Users --

    /// Hash the password and insert a new user. Username and email
    /// collisions surface as [`DbError::UniqueViolation`].
    pub fn signup(&self, new_user: &NewUser) -> Result<UserRow> {
        let username = required("username", &new_user.username)?;
        let email = required("email", &new_user.email)?;
        if new_user.password.is_empty() {
            return Err(DbError::MissingField("password"));
        }

        let user = UserRow {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: hash_password(&new_user.password)?,
            image_url: non_blank(new_user.image_url.as_deref())
                .unwrap_or(DEFAULT_IMAGE_URL)
                .to_string(),
            header_image_url: DEFAULT_HEADER_IMAGE_URL.to_string(),
            bio: None,
            created_at: now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, image_url, header_image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.password,
                    user.image_url,
                    user.header_image_url,
                    user.created_at
                ],
            )?;
            Ok(())
        })?;

        info!("Signed up user {}", user.username);
        Ok(user)
    }

    /// Returns the user when `username` exists and `password` matches.
    /// Unknown users and wrong passwords both yield `Ok(None)`.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<UserRow>> {
        let Some(user) = self.get_user_by_username(username)? else {
            return Ok(None);
        };

        Ok(verify_password(password, &user.password).then_some(user))
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.username = ?1", username))
    }

    /// All users ordered by username, optionally filtered to usernames
    /// containing `search` (case-insensitive for ASCII).
    pub fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| match non_blank(search) {
            Some(search) => query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS} FROM users u
                     WHERE u.username LIKE ?1 ESCAPE '\\'
                     ORDER BY u.username"
                ),
                [format!("%{}%", escape_like(search))],
            ),
            None => query_users(
                conn,
                &format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.username"),
                params![],
            ),
        })
    }

    /// Overwrite the editable profile fields. Returns `None` if the user
    /// does not exist.
    pub fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<UserRow>> {
        let fields = ProfileFields::from_update(update)?;
        self.with_conn(|conn| fields.apply(conn, id))
    }

    /// [`update_profile`](Self::update_profile), gated on `password`
    /// matching the user's current hash. The check and the write share one
    /// transaction. Returns `None` for an unknown user or a wrong password.
    pub fn update_profile_confirmed(
        &self,
        id: &str,
        password: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<UserRow>> {
        let fields = ProfileFields::from_update(update)?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(current) = query_user(&tx, "u.id = ?1", id)? else {
                return Ok(None);
            };
            if !verify_password(password, &current.password) {
                return Ok(None);
            }

            let updated = fields.apply(&tx, id)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Delete a user. Their messages, likes and follow edges go with them.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        let deleted = self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?))?;
        if deleted > 0 {
            info!("Deleted user {}", id);
        }
        Ok(deleted > 0)
    }

    pub fn user_stats(&self, id: &str) -> Result<UserStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE followed_id = ?1),
                    (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
                [id],
                |row| {
                    Ok(UserStats {
                        messages: row.get::<_, i64>(0)? as u64,
                        following: row.get::<_, i64>(1)? as u64,
                        followers: row.get::<_, i64>(2)? as u64,
                        likes: row.get::<_, i64>(3)? as u64,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    // -- Follows --

    /// Add the edge `follower -> followed`. Returns false if it already
    /// existed.
    pub fn follow(&self, follower_id: &str, followed_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?1, ?2, ?3)",
                params![follower_id, followed_id, now()],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn unfollow(&self, follower_id: &str, followed_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                [follower_id, followed_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Does `user_id` follow `other_id`?
    pub fn is_following(&self, user_id: &str, other_id: &str) -> Result<bool> {
        self.with_conn(|conn| follow_exists(conn, user_id, other_id))
    }

    /// Is `user_id` followed by `other_id`?
    pub fn is_followed_by(&self, user_id: &str, other_id: &str) -> Result<bool> {
        self.with_conn(|conn| follow_exists(conn, other_id, user_id))
    }

    /// Users that `user_id` follows.
    pub fn following(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS} FROM follows f
                     JOIN users u ON u.id = f.followed_id
                     WHERE f.follower_id = ?1
                     ORDER BY u.username"
                ),
                [user_id],
            )
        })
    }

    /// Users following `user_id`.
    pub fn followers(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS} FROM follows f
                     JOIN users u ON u.id = f.follower_id
                     WHERE f.followed_id = ?1
                     ORDER BY u.username"
                ),
                [user_id],
            )
        })
    }

    // -- Messages --

    pub fn create_message(&self, user_id: &str, text: &str) -> Result<MessageRow> {
        let id = Uuid::new_v4().to_string();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, text, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, text, user_id, now()],
            )?;
            query_message(conn, &id)?
                .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// A user's own messages, newest first.
    pub fn messages_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m
                     JOIN users u ON u.id = m.user_id
                     WHERE m.user_id = ?1
                     ORDER BY m.created_at DESC, m.rowid DESC
                     LIMIT ?2"
                ),
                params![user_id, limit],
            )
        })
    }

    /// Delete one message and its likes.
    pub fn delete_message(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])? > 0))
    }

    /// Messages written by `user_id` or by anyone they follow, newest first.
    pub fn home_timeline(&self, user_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m
                     JOIN users u ON u.id = m.user_id
                     WHERE m.user_id = ?1
                        OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1)
                     ORDER BY m.created_at DESC, m.rowid DESC
                     LIMIT ?2"
                ),
                params![user_id, limit],
            )
        })
    }

    // -- Likes --

    /// Returns false if the like already existed.
    pub fn like_message(&self, user_id: &str, message_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO likes (user_id, message_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, message_id, now()],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn unlike_message(&self, user_id: &str, message_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                [user_id, message_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Toggle a like: removes it if present, adds it if not.
    /// Returns true when the message is liked afterwards.
    pub fn toggle_like(&self, user_id: &str, message_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let removed = tx.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                [user_id, message_id],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO likes (user_id, message_id, created_at) VALUES (?1, ?2, ?3)",
                    params![user_id, message_id, now()],
                )?;
            }

            tx.commit()?;
            Ok(removed == 0)
        })
    }

    pub fn is_liked(&self, user_id: &str, message_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ?1 AND message_id = ?2)",
                [user_id, message_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Messages `user_id` has liked, most recently liked first.
    pub fn liked_messages(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM likes l
                     JOIN messages m ON m.id = l.message_id
                     JOIN users u ON u.id = m.user_id
                     WHERE l.user_id = ?1
                     ORDER BY l.created_at DESC, l.rowid DESC"
                ),
                [user_id],
            )
        })
    }

    /// Users who liked `message_id`.
    pub fn users_liked(&self, message_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS} FROM likes l
                     JOIN users u ON u.id = l.user_id
                     WHERE l.message_id = ?1
                     ORDER BY u.username"
                ),
                [message_id],
            )
        })
    }

    /// Batch-fetch like counts for a set of message IDs. Messages without
    /// likes are absent from the map.
    pub fn like_counts(&self, message_ids: &[String]) -> Result<HashMap<String, usize>> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, COUNT(*) FROM likes WHERE message_id IN ({}) GROUP BY message_id",
                placeholders(1, message_ids.len())
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn ToSql> = message_ids.iter().map(|id| id as &dyn ToSql).collect();

            let counts = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;

            Ok(counts)
        })
    }

    /// The subset of `message_ids` that `user_id` has liked.
    pub fn liked_among(&self, user_id: &str, message_ids: &[String]) -> Result<HashSet<String>> {
        if message_ids.is_empty() {
            return Ok(HashSet::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id FROM likes WHERE user_id = ?1 AND message_id IN ({})",
                placeholders(2, message_ids.len())
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn ToSql> = Vec::with_capacity(message_ids.len() + 1);
            params.push(&user_id);
            params.extend(message_ids.iter().map(|id| id as &dyn ToSql));

            let liked = stmt
                .query_map(params.as_slice(), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;

            Ok(liked)
        })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Profile values after required checks and default substitution.
struct ProfileFields<'a> {
    username: &'a str,
    email: &'a str,
    image_url: &'a str,
    header_image_url: &'a str,
    bio: Option<&'a str>,
}

impl<'a> ProfileFields<'a> {
    fn from_update(update: &'a ProfileUpdate) -> Result<Self> {
        Ok(Self {
            username: required("username", &update.username)?,
            email: required("email", &update.email)?,
            image_url: non_blank(update.image_url.as_deref()).unwrap_or(DEFAULT_IMAGE_URL),
            header_image_url: non_blank(update.header_image_url.as_deref())
                .unwrap_or(DEFAULT_HEADER_IMAGE_URL),
            bio: non_blank(update.bio.as_deref()),
        })
    }

    fn apply(&self, conn: &Connection, id: &str) -> Result<Option<UserRow>> {
        let changed = conn.execute(
            "UPDATE users
             SET username = ?2, email = ?3, image_url = ?4, header_image_url = ?5, bio = ?6
             WHERE id = ?1",
            params![id, self.username, self.email, self.image_url, self.header_image_url, self.bio],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        query_user(conn, "u.id = ?1", id)
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(DbError::MissingField(field))
    } else {
        Ok(value)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `?start, ?start+1, ...` for `count` parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn follow_exists(conn: &Connection, follower_id: &str, followed_id: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2)",
        [follower_id, followed_id],
        |row| row.get(0),
    )?)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users u WHERE {predicate}"))?;
    stmt.query_row([value], user_from_row).optional()
}

fn query_users<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m
         JOIN users u ON u.id = m.user_id
         WHERE m.id = ?1"
    ))?;
    stmt.query_row([id], message_from_row).optional()
}

fn query_messages<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
