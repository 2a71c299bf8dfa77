use anyhow::Result;
use chrono::{DateTime, Utc};
use ink_types::models::Role;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::{ArtistRow, AuthorRow, NewUser, ProfileChanges, UserRow};
use crate::{Database, OptionalExt, Where, like_pattern, limit_sql, tags_at, tags_json, uuid_at};

pub(crate) const USER_COLUMNS: &str = "u.id, u.email, u.password, u.role, u.artist_name, u.bio, \
     u.specialties, u.profile_image, u.verified, u.created_at, u.updated_at";

pub(crate) const AUTHOR_COLUMNS: &str = "u.id, u.artist_name, u.profile_image, u.verified";

const FOLLOWERS_COUNT: &str = "(SELECT COUNT(*) FROM follows f WHERE f.followee_id = u.id)";
const WORKS_COUNT: &str = "(SELECT COUNT(*) FROM items i WHERE i.author_id = u.id)";

#[derive(Debug, Clone, Copy, Default)]
pub enum ArtistOrder {
    /// Most followers first
    #[default]
    Popular,
    Newest,
}

/// Which artists to list. Only `artist` accounts are ever returned.
#[derive(Debug, Clone, Default)]
pub struct ArtistFilter {
    pub exclude: Option<Uuid>,
    /// Case-insensitive substring of artist name or email
    pub search: Option<String>,
    pub verified: Option<bool>,
    pub joined_since: Option<DateTime<Utc>>,
    pub order: ArtistOrder,
}

impl ArtistFilter {
    fn clauses(&self) -> Where {
        let mut w = Where::default();
        w.and("u.role = ?", Role::Artist.as_str().to_string());
        if let Some(id) = self.exclude {
            w.and("u.id <> ?", id.to_string());
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            w.and(
                "u.artist_name LIKE ? ESCAPE '\\' OR u.email LIKE ? ESCAPE '\\'",
                like_pattern(term),
            );
        }
        if let Some(verified) = self.verified {
            w.and("u.verified = ?", verified);
        }
        if let Some(since) = self.joined_since {
            w.and("u.created_at >= ?", since);
        }
        w
    }
}

/// True if `err` is the UNIQUE violation on `users.email`, e.g. from a signup
/// that lost a race with another signup for the same address.
pub fn is_duplicate_email(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, Some(msg))) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("users.email")
        }
        _ => false,
    }
}

impl Database {
    pub fn create_user(&self, new: &NewUser) -> Result<UserRow> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, role, artist_name, bio, specialties,
                                    profile_image, verified, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                rusqlite::params![
                    id.to_string(),
                    new.email.trim().to_lowercase(),
                    new.password_hash,
                    new.role.as_str(),
                    new.artist_name.trim(),
                    new.bio,
                    tags_json(&new.specialties),
                    new.profile_image,
                    new.verified,
                    now,
                ],
            )?;
            query_user(conn, "u.id = ?1", &id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("User vanished after insert: {}", id))
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", &id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let email = email.trim().to_lowercase();
        self.with_conn(|conn| query_user(conn, "u.email = ?1", &email))
    }

    /// Update the public profile. Returns false if the user does not exist.
    pub fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users
                 SET artist_name = ?2, bio = ?3, specialties = ?4,
                     profile_image = COALESCE(?5, profile_image), updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    changes.artist_name.trim(),
                    changes.bio,
                    tags_json(&changes.specialties),
                    changes.profile_image,
                    Utc::now(),
                ],
            )?;
            Ok(n > 0)
        })
    }

    /// Change sign-in credentials. `None` leaves a field untouched.
    pub fn update_account(
        &self,
        id: Uuid,
        email: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<()> {
        let email = email.map(|e| e.trim().to_lowercase());
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET email = COALESCE(?2, email), password = COALESCE(?3, password), updated_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id.to_string(), email, password_hash, Utc::now()],
            )?;
            Ok(())
        })
    }

    /// Flip the verified flag of an artist. `None` if no such artist.
    pub fn toggle_verified(&self, id: Uuid) -> Result<Option<bool>> {
        self.with_tx(|conn| {
            let current: Option<bool> = conn
                .query_row(
                    "SELECT verified FROM users WHERE id = ?1 AND role = 'artist'",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(current) = current else {
                return Ok(None);
            };

            conn.execute(
                "UPDATE users SET verified = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id.to_string(), !current, Utc::now()],
            )?;
            Ok(Some(!current))
        })
    }

    pub fn list_artists(
        &self,
        filter: &ArtistFilter,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<ArtistRow>> {
        let w = filter.clauses();
        let order = match filter.order {
            ArtistOrder::Popular => "followers_count DESC, u.created_at DESC",
            ArtistOrder::Newest => "u.created_at DESC",
        };
        let sql = format!(
            "SELECT {USER_COLUMNS}, {FOLLOWERS_COUNT} AS followers_count, {WORKS_COUNT} AS works_count
             FROM users u{} ORDER BY {order}{}",
            w.sql(),
            limit_sql(limit, offset),
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(w.params().as_slice(), |row| {
                    Ok(ArtistRow {
                        user: user_at(row)?,
                        followers_count: row.get::<_, i64>(11)? as u64,
                        works_count: row.get::<_, i64>(12)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_artists(&self, filter: &ArtistFilter) -> Result<u64> {
        let w = filter.clauses();
        let sql = format!("SELECT COUNT(*) FROM users u{}", w.sql());
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(&sql, w.params().as_slice(), |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn count_verified_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users WHERE verified = 1", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    /// Users following `id`.
    pub fn followers_of(&self, id: Uuid) -> Result<Vec<AuthorRow>> {
        self.with_conn(|conn| {
            query_authors(
                conn,
                "JOIN follows f ON f.follower_id = u.id WHERE f.followee_id = ?1 ORDER BY f.created_at DESC",
                id,
            )
        })
    }

    /// Users that `id` follows.
    pub fn following_of(&self, id: Uuid) -> Result<Vec<AuthorRow>> {
        self.with_conn(|conn| {
            query_authors(
                conn,
                "JOIN follows f ON f.followee_id = u.id WHERE f.follower_id = ?1 ORDER BY f.created_at DESC",
                id,
            )
        })
    }

    pub fn following_ids(&self, id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT followee_id FROM follows WHERE follower_id = ?1")?;
            let ids = stmt
                .query_map([id.to_string()], |row| uuid_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE {predicate}");
    conn.query_row(&sql, [value], user_at).optional()
}

fn query_authors(conn: &Connection, tail: &str, id: Uuid) -> Result<Vec<AuthorRow>> {
    let sql = format!("SELECT {AUTHOR_COLUMNS} FROM users u {tail}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([id.to_string()], |row| author_at(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Map the 11 `USER_COLUMNS` starting at column 0.
pub(crate) fn user_at(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let role: String = row.get(3)?;
    Ok(UserRow {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        role: role
            .parse()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?,
        artist_name: row.get(4)?,
        bio: row.get(5)?,
        specialties: tags_at(row, 6)?,
        profile_image: row.get(7)?,
        verified: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Map the 4 `AUTHOR_COLUMNS` starting at column `start`.
pub(crate) fn author_at(row: &Row<'_>, start: usize) -> rusqlite::Result<AuthorRow> {
    Ok(AuthorRow {
        id: uuid_at(row, start)?,
        artist_name: row.get(start + 1)?,
        profile_image: row.get(start + 2)?,
        verified: row.get(start + 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MembershipSet;
    use crate::test_support::{artist, db, item};

    #[test]
    fn duplicate_email_insert_is_recognized() {
        let db = db();
        let mina = artist(&db, "Mina");
        let err = db
            .create_user(&NewUser {
                email: "MINA@ink.test".into(),
                password_hash: "hash".into(),
                artist_name: "Other".into(),
                bio: String::new(),
                specialties: vec![],
                profile_image: String::new(),
                role: Role::Artist,
                verified: false,
            })
            .unwrap_err();
        assert!(is_duplicate_email(&err));

        let other = artist(&db, "Jun");
        let err = db.update_account(other.id, Some(mina.email.as_str()), None).unwrap_err();
        assert!(is_duplicate_email(&err));

        assert!(!is_duplicate_email(&anyhow::anyhow!("UNIQUE constraint failed: users.email")));
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let db = db();
        let mina = artist(&db, "Mina");

        let found = db.get_user_by_email("  MINA@Ink.Test ").unwrap().unwrap();
        assert_eq!(found.id, mina.id);
        assert_eq!(found.role, Role::Artist);
    }

    #[test]
    fn duplicate_email_is_rejected_by_store() {
        let db = db();
        artist(&db, "Mina");

        let result = db.create_user(&NewUser {
            email: "MINA@ink.test".into(),
            password_hash: "hash".into(),
            artist_name: "Other".into(),
            bio: String::new(),
            specialties: vec![],
            profile_image: String::new(),
            role: Role::Artist,
            verified: false,
        });
        assert!(result.is_err());
    }

    #[test]
    fn artists_ordered_by_followers() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let c = artist(&db, "C");
        item(&db, c.id, "koi");

        db.toggle_membership(MembershipSet::Followers, c.id, a.id).unwrap();
        db.toggle_membership(MembershipSet::Followers, c.id, b.id).unwrap();
        db.toggle_membership(MembershipSet::Followers, b.id, a.id).unwrap();

        let filter = ArtistFilter {
            exclude: Some(a.id),
            ..Default::default()
        };
        let rows = db.list_artists(&filter, None, 0).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.user.artist_name.as_str()).collect();
        assert_eq!(names, vec!["C", "B"]);
        assert_eq!(rows[0].followers_count, 2);
        assert_eq!(rows[0].works_count, 1);
        assert_eq!(db.count_artists(&filter).unwrap(), 2);
    }

    #[test]
    fn artist_search_and_verified_filter() {
        let db = db();
        let a = artist(&db, "Hana");
        artist(&db, "Jun");
        assert_eq!(db.toggle_verified(a.id).unwrap(), Some(true));

        let search = ArtistFilter {
            search: Some("han".into()),
            ..Default::default()
        };
        assert_eq!(db.count_artists(&search).unwrap(), 1);

        let unverified = ArtistFilter {
            verified: Some(false),
            ..Default::default()
        };
        let rows = db.list_artists(&unverified, Some(10), 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user.artist_name, "Jun");
        assert_eq!(db.count_verified_users().unwrap(), 1);
    }

    #[test]
    fn profile_update_keeps_image_when_absent() {
        let db = db();
        let a = artist(&db, "Mina");
        db.update_profile(
            a.id,
            &ProfileChanges {
                artist_name: " Mina K ".into(),
                bio: "linework".into(),
                specialties: vec!["fineline".into()],
                profile_image: Some("/uploads/profile-1.png".into()),
            },
        )
        .unwrap();
        db.update_profile(
            a.id,
            &ProfileChanges {
                artist_name: "Mina K".into(),
                bio: "linework".into(),
                specialties: vec![],
                profile_image: None,
            },
        )
        .unwrap();

        let row = db.get_user_by_id(a.id).unwrap().unwrap();
        assert_eq!(row.artist_name, "Mina K");
        assert_eq!(row.profile_image, "/uploads/profile-1.png");
        assert!(row.specialties.is_empty());
    }

    #[test]
    fn follow_views_are_derived_from_one_edge() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        db.toggle_membership(MembershipSet::Followers, b.id, a.id).unwrap();

        let followers: Vec<_> = db.followers_of(b.id).unwrap().into_iter().map(|u| u.id).collect();
        let following: Vec<_> = db.following_of(a.id).unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(followers, vec![a.id]);
        assert_eq!(following, vec![b.id]);
        assert_eq!(db.following_ids(a.id).unwrap(), vec![b.id]);
        assert!(db.followers_of(a.id).unwrap().is_empty());
    }
}
