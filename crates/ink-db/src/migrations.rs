use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password        TEXT NOT NULL,
                role            TEXT NOT NULL DEFAULT 'artist' CHECK (role IN ('artist', 'admin')),
                artist_name     TEXT NOT NULL,
                bio             TEXT NOT NULL DEFAULT '',
                specialties     TEXT NOT NULL DEFAULT '[]',
                profile_image   TEXT NOT NULL DEFAULT '',
                verified        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            -- One row per directed edge: follower -> followee
            CREATE TABLE follows (
                follower_id     TEXT NOT NULL REFERENCES users(id),
                followee_id     TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id),
                CHECK (follower_id <> followee_id)
            );

            CREATE INDEX idx_follows_followee ON follows(followee_id);

            CREATE TABLE items (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                image           TEXT NOT NULL DEFAULT '',
                author_id       TEXT NOT NULL REFERENCES users(id),
                category        TEXT NOT NULL DEFAULT '[]',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_items_author ON items(author_id);
            CREATE INDEX idx_items_created ON items(created_at);

            CREATE TABLE item_likes (
                item_id         TEXT NOT NULL REFERENCES items(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                PRIMARY KEY (item_id, user_id)
            );

            CREATE INDEX idx_item_likes_user ON item_likes(user_id);

            CREATE TABLE comments (
                id              TEXT PRIMARY KEY,
                content         TEXT NOT NULL,
                author_id       TEXT NOT NULL REFERENCES users(id),
                item_id         TEXT NOT NULL REFERENCES items(id),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_comments_item ON comments(item_id, created_at);
            CREATE INDEX idx_comments_author ON comments(author_id);

            -- status is written once at creation; display status is derived from end_date
            CREATE TABLE collabs (
                id              TEXT PRIMARY KEY,
                author_id       TEXT NOT NULL REFERENCES users(id),
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                styles          TEXT NOT NULL DEFAULT '[]',
                location        TEXT NOT NULL DEFAULT '',
                start_date      TEXT,
                end_date        TEXT,
                status          TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_collabs_created ON collabs(created_at);

            CREATE TABLE collab_likes (
                collab_id       TEXT NOT NULL REFERENCES collabs(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                PRIMARY KEY (collab_id, user_id)
            );

            CREATE TABLE collab_participants (
                collab_id       TEXT NOT NULL REFERENCES collabs(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                PRIMARY KEY (collab_id, user_id)
            );

            CREATE INDEX idx_collab_likes_user ON collab_likes(user_id);
            CREATE INDEX idx_collab_participants_user ON collab_participants(user_id);

            CREATE TABLE sessions (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                expires_at      TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_user ON sessions(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
