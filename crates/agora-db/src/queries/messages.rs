use agora_types::models::Message;
use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use crate::Database;
use crate::models::{encode_time, opt_uuid_at, time_at, uuid_at};

const MESSAGE_COLUMNS: &str = "id, text, sender_id, receiver_id, offer_id, created_at";

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, text, sender_id, receiver_id, offer_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    message.id.to_string(),
                    &message.text,
                    message.sender_id.to_string(),
                    message.receiver_id.to_string(),
                    message.offer_id.map(|id| id.to_string()),
                    encode_time(&message.created_at),
                ),
            )?;
            Ok(())
        })
    }

    /// Points an already stored message at an offer. Returns `false` if the
    /// message does not exist.
    pub fn set_message_offer(&self, message_id: Uuid, offer_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET offer_id = ?1 WHERE id = ?2",
                [offer_id.to_string(), message_id.to_string()],
            )?;
            Ok(updated == 1)
        })
    }

    /// Every message exchanged between `a` and `b` in either direction, oldest
    /// first. With `offer_id` set, only that offer's thread.
    pub fn list_conversation(&self, a: Uuid, b: Uuid, offer_id: Option<Uuid>) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE ((sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1))
                   AND (?3 IS NULL OR offer_id = ?3)
                 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![a.to_string(), b.to_string(), offer_id.map(|id| id.to_string())],
                    map_message,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All messages attached to an offer, oldest first. No de-duplication of
    /// any kind happens here.
    pub fn list_messages_for_offer(&self, offer_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE offer_id = ?1 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt
                .query_map([offer_id.to_string()], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_at(row, 0)?,
        text: row.get(1)?,
        sender_id: uuid_at(row, 2)?,
        receiver_id: uuid_at(row, 3)?,
        offer_id: opt_uuid_at(row, 4)?,
        created_at: time_at(row, 5)?,
    })
}
