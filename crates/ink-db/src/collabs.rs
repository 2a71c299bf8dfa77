use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};
use tracing::debug;
use uuid::Uuid;

use crate::models::{AuthorRow, CollabRow, NewCollab};
use crate::users::{AUTHOR_COLUMNS, author_at};
use crate::{Database, OptionalExt, Where, like_pattern, placeholders, tags_at, tags_json, uuid_at};

const COLLAB_SELECT: &str = "SELECT c.id, c.title, c.description, c.styles, c.location, \
     c.start_date, c.end_date, c.created_at, u.id, u.artist_name, u.profile_image, u.verified \
     FROM collabs c JOIN users u ON u.id = c.author_id";

/// Stored filters for collab listings. Status is not among them: it is derived
/// from the end date at read time, so callers filter on it afterwards.
#[derive(Debug, Clone, Default)]
pub struct CollabFilter {
    pub style: Option<String>,
    /// Case-insensitive substring of title, description or location
    pub search: Option<String>,
}

impl CollabFilter {
    fn clauses(&self) -> Where {
        let mut w = Where::default();
        if let Some(style) = self.style.as_deref().filter(|s| !s.is_empty()) {
            w.and(
                "EXISTS (SELECT 1 FROM json_each(c.styles) WHERE json_each.value = ?)",
                style.to_string(),
            );
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            w.and(
                "c.title LIKE ? ESCAPE '\\' OR c.description LIKE ? ESCAPE '\\' OR c.location LIKE ? ESCAPE '\\'",
                like_pattern(term),
            );
        }
        w
    }
}

impl Database {
    pub fn create_collab(&self, new: &NewCollab) -> Result<CollabRow> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO collabs (id, author_id, title, description, styles, location,
                                      start_date, end_date, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'open', ?9, ?9)",
                rusqlite::params![
                    id.to_string(),
                    new.author_id.to_string(),
                    new.title.trim(),
                    new.description.trim(),
                    tags_json(&new.styles),
                    new.location.trim(),
                    new.start_date,
                    new.end_date,
                    now,
                ],
            )?;
            query_collab(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Collab vanished after insert: {}", id))
        })
    }

    pub fn get_collab(&self, id: Uuid) -> Result<Option<CollabRow>> {
        self.with_conn(|conn| query_collab(conn, id))
    }

    /// Collabs newest first.
    pub fn list_collabs(&self, filter: &CollabFilter) -> Result<Vec<CollabRow>> {
        let w = filter.clauses();
        let sql = format!("{COLLAB_SELECT}{} ORDER BY c.created_at DESC", w.sql());
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(w.params().as_slice(), collab_at)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a collab with its likes and participants. Returns false if it
    /// did not exist.
    pub fn delete_collab(&self, id: Uuid) -> Result<bool> {
        self.with_tx(|conn| {
            let id = id.to_string();
            let likes = conn.execute("DELETE FROM collab_likes WHERE collab_id = ?1", [&id])?;
            let participants =
                conn.execute("DELETE FROM collab_participants WHERE collab_id = ?1", [&id])?;
            let n = conn.execute("DELETE FROM collabs WHERE id = ?1", [&id])?;
            debug!(
                "Deleted collab {} ({} likes, {} participants)",
                id, likes, participants
            );
            Ok(n > 0)
        })
    }

    /// Participant summaries for a batch of collabs, in join order.
    pub fn participants_for(&self, collab_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<AuthorRow>>> {
        if collab_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT p.collab_id, {AUTHOR_COLUMNS}
                 FROM collab_participants p JOIN users u ON u.id = p.user_id
                 WHERE p.collab_id IN ({})
                 ORDER BY p.created_at, p.rowid",
                placeholders(collab_ids.len())
            );
            let ids: Vec<String> = collab_ids.iter().map(Uuid::to_string).collect();
            let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((uuid_at(row, 0)?, author_at(row, 1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut map: HashMap<Uuid, Vec<AuthorRow>> = HashMap::new();
            for (collab_id, author) in rows {
                map.entry(collab_id).or_default().push(author);
            }
            Ok(map)
        })
    }
}

fn query_collab(conn: &Connection, id: Uuid) -> Result<Option<CollabRow>> {
    let sql = format!("{COLLAB_SELECT} WHERE c.id = ?1");
    conn.query_row(&sql, [id.to_string()], collab_at).optional()
}

fn collab_at(row: &Row<'_>) -> rusqlite::Result<CollabRow> {
    Ok(CollabRow {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        styles: tags_at(row, 3)?,
        location: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        created_at: row.get(7)?,
        author: author_at(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MembershipSet;
    use crate::test_support::{artist, db};
    use chrono::Duration;

    fn collab(db: &Database, author: Uuid, title: &str, styles: &[&str], location: &str) -> Uuid {
        db.create_collab(&NewCollab {
            author_id: author,
            title: title.into(),
            description: String::new(),
            styles: styles.iter().map(|s| s.to_string()).collect(),
            location: location.into(),
            start_date: None,
            end_date: Some(Utc::now() + Duration::days(3)),
        })
        .unwrap()
        .id
    }

    #[test]
    fn create_round_trips_dates() {
        let db = db();
        let a = artist(&db, "A");
        let id = collab(&db, a.id, "Flash day", &["traditional"], "Seoul");

        let row = db.get_collab(id).unwrap().unwrap();
        assert!(row.start_date.is_none());
        assert!(row.end_date.unwrap() > Utc::now());
        assert_eq!(row.author.id, a.id);
    }

    #[test]
    fn style_and_search_filters() {
        let db = db();
        let a = artist(&db, "A");
        collab(&db, a.id, "Flash day", &["traditional"], "Seoul");
        collab(&db, a.id, "Guest spot", &["fineline", "blackwork"], "Busan");

        let by_style = CollabFilter {
            style: Some("blackwork".into()),
            ..Default::default()
        };
        let rows = db.list_collabs(&by_style).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Guest spot");

        let by_location = CollabFilter {
            search: Some("seoul".into()),
            ..Default::default()
        };
        assert_eq!(db.list_collabs(&by_location).unwrap()[0].title, "Flash day");
    }

    #[test]
    fn delete_removes_memberships() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let id = collab(&db, a.id, "Convention booth", &[], "");
        db.toggle_membership(MembershipSet::CollabParticipants, id, b.id).unwrap();
        db.toggle_membership(MembershipSet::CollabLikes, id, b.id).unwrap();

        let participants = db.participants_for(&[id]).unwrap();
        assert_eq!(participants[&id][0].artist_name, "B");

        assert!(db.delete_collab(id).unwrap());
        assert!(db.get_collab(id).unwrap().is_none());
        assert_eq!(db.member_count(MembershipSet::CollabLikes, id).unwrap(), 0);
        assert!(!db.delete_collab(id).unwrap());
    }
}
