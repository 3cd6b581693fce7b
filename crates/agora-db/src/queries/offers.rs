use agora_types::models::Offer;
use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use super::OptionalExt;
use crate::Database;
use crate::models::{encode_time, time_at, uuid_at};

impl Database {
    pub fn insert_offer(&self, offer: &Offer) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO offers (id, title, description, user_id, community_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    offer.id.to_string(),
                    &offer.title,
                    &offer.description,
                    offer.user_id.to_string(),
                    offer.community_id.to_string(),
                    encode_time(&offer.created_at),
                ),
            )?;
            Ok(())
        })
    }

    pub fn get_offer(&self, id: Uuid) -> Result<Option<Offer>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, title, description, user_id, community_id, created_at
                 FROM offers WHERE id = ?1",
                [id.to_string()],
                map_offer,
            )
            .optional()
        })
    }

    /// Newest first.
    pub fn list_offers_for_community(&self, community_id: Uuid) -> Result<Vec<Offer>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, description, user_id, community_id, created_at
                 FROM offers
                 WHERE community_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([community_id.to_string()], map_offer)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_offer(row: &Row<'_>) -> rusqlite::Result<Offer> {
    Ok(Offer {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        user_id: uuid_at(row, 3)?,
        community_id: uuid_at(row, 4)?,
        created_at: time_at(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn community_listing_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let author = fixtures::user(&db, "a");
        let community = fixtures::community(&db, "Riverside");
        let older = fixtures::offer(&db, &author, &community);

        let newer = Offer {
            id: Uuid::new_v4(),
            title: "Ladder".to_string(),
            description: "Three metres".to_string(),
            created_at: Utc::now() + Duration::seconds(5),
            ..older.clone()
        };
        db.insert_offer(&newer).unwrap();

        let ids: Vec<Uuid> = db
            .list_offers_for_community(community.id)
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn missing_offer_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_offer(Uuid::new_v4()).unwrap().is_none());
    }
}
