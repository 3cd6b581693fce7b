use agora_types::models::User;
use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::OptionalExt;
use crate::Database;
use crate::models::{UserRow, encode_time, time_at, uuid_at};

impl Database {
    /// Returns `false` without writing when the email is already registered.
    pub fn insert_user(&self, user: &User, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (id, username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    user.id.to_string(),
                    &user.username,
                    &user.email,
                    password_hash,
                    encode_time(&user.created_at),
                ),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, created_at, password_hash FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok(UserRow {
                        user: map_user(row)?,
                        password_hash: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }
}

pub(super) fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, username, email, created_at FROM users WHERE id = ?1",
        [id.to_string()],
        map_user,
    )
    .optional()
}

pub(super) fn user_exists(conn: &Connection, id: Uuid) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id.to_string()], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        created_at: time_at(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: "a".to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_email_is_refused() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_user(&sample("a@x.com"), "h1").unwrap());
        assert!(!db.insert_user(&sample("a@x.com"), "h2").unwrap());

        let row = db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(row.password_hash, "h1");
    }

    #[test]
    fn lookup_by_id_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let user = sample("b@x.com");
        db.insert_user(&user, "h").unwrap();

        let found = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.email, "b@x.com");
        assert!(db.get_user_by_id(Uuid::new_v4()).unwrap().is_none());
    }
}
