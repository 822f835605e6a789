use rusqlite::ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A required user field (signup or profile update) was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A UNIQUE or PRIMARY KEY constraint rejected the write. Holds the
    /// offending `table.column` list as reported by SQLite.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A foreign key pointed at a user or message that does not exist.
    #[error("referenced row does not exist")]
    MissingReference,

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    #[error("password hashing failed: {0}")]
    Password(String),

    #[error("DB lock poisoned")]
    LockPoisoned,

    #[error("database error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl DbError {
    /// True when the error names `column` (e.g. `users.email`) as the
    /// duplicated value.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation(cols) if cols.split(", ").any(|c| c == column))
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            let detail = || message.clone().unwrap_or_default();
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    let detail = detail();
                    let columns = detail
                        .strip_prefix("UNIQUE constraint failed: ")
                        .unwrap_or(detail.as_str())
                        .to_string();
                    return DbError::UniqueViolation(columns);
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return DbError::MissingReference,
                ffi::SQLITE_CONSTRAINT_CHECK => return DbError::CheckViolation(detail()),
                _ => {}
            }
        }
        DbError::Sqlite(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT UNIQUE);
             CREATE TABLE child (
                 parent_id INTEGER NOT NULL REFERENCES parent(id),
                 n INTEGER NOT NULL CHECK (n > 0)
             );
             INSERT INTO parent (id, name) VALUES (1, 'a');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn classifies_unique_violation() {
        let err: DbError = conn()
            .execute("INSERT INTO parent (id, name) VALUES (2, 'a')", [])
            .unwrap_err()
            .into();
        assert!(err.is_unique_violation_on("parent.name"));
        assert!(!err.is_unique_violation_on("parent.id"));
    }

    #[test]
    fn classifies_foreign_key_violation() {
        let err: DbError = conn()
            .execute("INSERT INTO child (parent_id, n) VALUES (99, 1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::MissingReference));
    }

    #[test]
    fn classifies_check_violation() {
        let err: DbError = conn()
            .execute("INSERT INTO child (parent_id, n) VALUES (1, 0)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::CheckViolation(_)));
    }

    #[test]
    fn other_errors_pass_through() {
        let err: DbError = conn().execute("SELECT * FROM nowhere", []).unwrap_err().into();
        assert!(matches!(err, DbError::Sqlite(_)));
    }
}
