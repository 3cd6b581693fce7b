use agora_types::models::Community;
use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use tracing::debug;
use uuid::Uuid;

use super::OptionalExt;
use super::users::user_exists;
use crate::Database;
use crate::models::{JoinOutcome, encode_time, opt_uuid_at, time_at, uuid_at};

const COMMUNITY_COLUMNS: &str = "c.id, c.name, c.country, c.city, c.owner_id, c.created_at";

impl Database {
    // -- Communities --

    pub fn insert_community(&self, community: &Community) -> Result<()> {
        self.with_conn(|conn| insert_community(conn, community))
    }

    /// Inserts the community, records `owner_id` as its owner and adds the owner
    /// as a member, all in one transaction. Ownership alone never implies
    /// membership, so both facts are written explicitly.
    pub fn create_owned_community(&self, community: &Community, owner_id: Uuid) -> Result<Community> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_community(&tx, community)?;
            set_owner(&tx, community.id, owner_id)?;
            add_member(&tx, owner_id, community.id)?;
            tx.commit()?;
            Ok(Community {
                owner_id: Some(owner_id),
                ..community.clone()
            })
        })
    }

    /// Records `user_id` as the creator/owner. Returns `false` if the community
    /// does not exist. Does not touch membership.
    pub fn set_owner(&self, community_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| set_owner(conn, community_id, user_id))
    }

    pub fn get_community(&self, id: Uuid) -> Result<Option<Community>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COMMUNITY_COLUMNS} FROM communities c WHERE c.id = ?1"),
                [id.to_string()],
                map_community,
            )
            .optional()
        })
    }

    pub fn list_communities_by_country(&self, country: &str) -> Result<Vec<Community>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMUNITY_COLUMNS} FROM communities c
                 WHERE c.country = ?1
                 ORDER BY c.name, c.created_at"
            ))?;
            let rows = stmt
                .query_map([country], map_community)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Membership --

    /// Adds `user_id` to `community_id`. Idempotent: a repeated call reports
    /// `AlreadyMember` and writes nothing.
    pub fn add_member(&self, user_id: Uuid, community_id: Uuid) -> Result<JoinOutcome> {
        self.with_conn(|conn| add_member(conn, user_id, community_id))
    }

    pub fn is_member(&self, user_id: Uuid, community_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM memberships WHERE user_id = ?1 AND community_id = ?2",
                    [user_id.to_string(), community_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Communities the user belongs to, in join order. Empty if none.
    pub fn list_communities_for_user(&self, user_id: Uuid) -> Result<Vec<Community>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMUNITY_COLUMNS}
                 FROM memberships m
                 JOIN communities c ON c.id = m.community_id
                 WHERE m.user_id = ?1
                 ORDER BY m.created_at, m.rowid"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], map_community)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn insert_community(conn: &Connection, community: &Community) -> Result<()> {
    conn.execute(
        "INSERT INTO communities (id, name, country, city, owner_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            community.id.to_string(),
            &community.name,
            &community.country,
            &community.city,
            community.owner_id.map(|id| id.to_string()),
            encode_time(&community.created_at),
        ),
    )?;
    Ok(())
}

fn set_owner(conn: &Connection, community_id: Uuid, user_id: Uuid) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE communities SET owner_id = ?1 WHERE id = ?2",
        [user_id.to_string(), community_id.to_string()],
    )?;
    Ok(updated == 1)
}

fn community_exists(conn: &Connection, id: Uuid) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM communities WHERE id = ?1", [id.to_string()], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn add_member(conn: &Connection, user_id: Uuid, community_id: Uuid) -> Result<JoinOutcome> {
    if !user_exists(conn, user_id)? {
        return Ok(JoinOutcome::UnknownUser);
    }
    if !community_exists(conn, community_id)? {
        return Ok(JoinOutcome::UnknownCommunity);
    }

    // The composite primary key makes the pair unique; a repeat insert is ignored.
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO memberships (user_id, community_id, created_at) VALUES (?1, ?2, ?3)",
        [user_id.to_string(), community_id.to_string(), encode_time(&Utc::now())],
    )?;

    if inserted == 1 {
        Ok(JoinOutcome::Joined)
    } else {
        debug!("{} already a member of {}", user_id, community_id);
        Ok(JoinOutcome::AlreadyMember)
    }
}

fn map_community(row: &Row<'_>) -> rusqlite::Result<Community> {
    Ok(Community {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        country: row.get(2)?,
        city: row.get(3)?,
        owner_id: opt_uuid_at(row, 4)?,
        created_at: time_at(row, 5)?,
    })
}
