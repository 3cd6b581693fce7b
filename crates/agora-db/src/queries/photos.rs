use agora_types::models::Photo;
use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use super::OptionalExt;
use crate::Database;
use crate::models::{encode_time, opt_uuid_at, time_at, uuid_at};

impl Database {
    pub fn insert_photo(&self, photo: &Photo) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO photos (id, path, user_id, offer_id, request_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    photo.id.to_string(),
                    &photo.path,
                    photo.user_id.to_string(),
                    photo.offer_id.map(|id| id.to_string()),
                    photo.request_id.map(|id| id.to_string()),
                    encode_time(&photo.created_at),
                ),
            )?;
            Ok(())
        })
    }

    pub fn get_photo(&self, id: Uuid) -> Result<Option<Photo>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, path, user_id, offer_id, request_id, created_at FROM photos WHERE id = ?1",
                [id.to_string()],
                map_photo,
            )
            .optional()
        })
    }

    /// Links an existing, unattached photo to an offer. Only the photo's
    /// uploader may attach it; returns `false` when nothing was linked.
    pub fn attach_photo(&self, photo_id: Uuid, offer_id: Uuid, owner_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE photos SET offer_id = ?1
                 WHERE id = ?2 AND user_id = ?3 AND offer_id IS NULL",
                [offer_id.to_string(), photo_id.to_string(), owner_id.to_string()],
            )?;
            Ok(updated == 1)
        })
    }

    pub fn list_photos_for_offer(&self, offer_id: Uuid) -> Result<Vec<Photo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, path, user_id, offer_id, request_id, created_at
                 FROM photos WHERE offer_id = ?1
                 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([offer_id.to_string()], map_photo)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_photo(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: uuid_at(row, 0)?,
        path: row.get(1)?,
        user_id: uuid_at(row, 2)?,
        offer_id: opt_uuid_at(row, 3)?,
        request_id: opt_uuid_at(row, 4)?,
        created_at: time_at(row, 5)?,
    })
}
