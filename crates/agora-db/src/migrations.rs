use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Id of the ownerless community every fresh database starts with.
pub const SEED_COMMUNITY_ID: &str = "00000000-0000-0000-0000-000000000001";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE communities (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                country     TEXT NOT NULL,
                city        TEXT NOT NULL,
                owner_id    TEXT REFERENCES users(id),
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_communities_country ON communities(country);

            CREATE TABLE memberships (
                user_id         TEXT NOT NULL REFERENCES users(id),
                community_id    TEXT NOT NULL REFERENCES communities(id),
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, community_id)
            );

            CREATE TABLE offers (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                user_id         TEXT NOT NULL REFERENCES users(id),
                community_id    TEXT NOT NULL REFERENCES communities(id),
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_offers_community ON offers(community_id, created_at);

            CREATE TABLE photos (
                id          TEXT PRIMARY KEY,
                path        TEXT NOT NULL UNIQUE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                offer_id    TEXT REFERENCES offers(id),
                request_id  TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_photos_offer ON photos(offer_id);

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                text        TEXT NOT NULL,
                sender_id   TEXT NOT NULL REFERENCES users(id),
                receiver_id TEXT NOT NULL REFERENCES users(id),
                offer_id    TEXT REFERENCES offers(id),
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_messages_pair ON messages(sender_id, receiver_id, created_at);
            CREATE INDEX idx_messages_offer ON messages(offer_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO communities (id, name, country, city) VALUES (?1, 'general', '', '')",
            [SEED_COMMUNITY_ID],
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
