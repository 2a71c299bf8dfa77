use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use tracing::debug;
use uuid::Uuid;

use crate::models::SessionRow;
use crate::{Database, OptionalExt, uuid_at};

impl Database {
    /// Open a session for `user_id`, returning its id. Expired sessions of
    /// every user are swept first.
    pub fn create_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.with_conn(|conn| {
            let swept = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
            if swept > 0 {
                debug!("Swept {} expired sessions", swept);
            }

            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.to_string(), user_id.to_string(), now, expires_at],
            )?;
            Ok(id)
        })
    }

    /// Look up a live session together with its user's current name and role.
    /// Expired sessions and sessions of deleted users resolve to `None`.
    pub fn find_session(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT s.id, s.user_id, u.artist_name, u.role, s.expires_at
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.id = ?1 AND s.expires_at > ?2",
                rusqlite::params![id.to_string(), now],
                |row| {
                    let role: String = row.get(3)?;
                    Ok(SessionRow {
                        session_id: uuid_at(row, 0)?,
                        user_id: uuid_at(row, 1)?,
                        artist_name: row.get(2)?,
                        role: role.parse().map_err(|e: String| {
                            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
                        })?,
                        expires_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Returns true if a session was removed.
    pub fn delete_session(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{artist, db};
    use chrono::Duration;
    use ink_types::models::Role;

    #[test]
    fn session_lifecycle() {
        let db = db();
        let a = artist(&db, "Mina");
        let now = Utc::now();
        let sid = db.create_session(a.id, now + Duration::days(7)).unwrap();

        let session = db.find_session(sid, now).unwrap().unwrap();
        assert_eq!(session.user_id, a.id);
        assert_eq!(session.artist_name, "Mina");
        assert_eq!(session.role, Role::Artist);

        assert!(db.delete_session(sid).unwrap());
        assert!(db.find_session(sid, now).unwrap().is_none());
    }

    #[test]
    fn expired_sessions_do_not_resolve() {
        let db = db();
        let a = artist(&db, "Mina");
        let now = Utc::now();
        let sid = db.create_session(a.id, now + Duration::hours(1)).unwrap();

        assert!(db.find_session(sid, now + Duration::hours(2)).unwrap().is_none());
    }

    #[test]
    fn new_session_sweeps_expired_rows() {
        let db = db();
        let a = artist(&db, "Mina");
        let now = Utc::now();
        for _ in 0..5 {
            db.create_session(a.id, now - Duration::hours(1)).unwrap();
        }
        let live = db.create_session(a.id, now + Duration::days(7)).unwrap();

        let rows: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(rows, 1);
        assert!(db.find_session(live, now).unwrap().is_some());
    }
}
