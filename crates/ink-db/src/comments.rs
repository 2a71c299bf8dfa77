use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::CommentRow;
use crate::users::author_at;
use crate::{Database, OptionalExt, Where, like_pattern, limit_sql, uuid_at};

const COMMENT_SELECT: &str = "SELECT c.id, c.content, c.item_id, i.title, c.created_at, c.updated_at, \
     u.email, u.id, u.artist_name, u.profile_image, u.verified \
     FROM comments c \
     JOIN users u ON u.id = c.author_id \
     JOIN items i ON i.id = c.item_id";

impl Database {
    pub fn create_comment(&self, item_id: Uuid, author_id: Uuid, content: &str) -> Result<CommentRow> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, content, author_id, item_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![
                    id.to_string(),
                    content.trim(),
                    author_id.to_string(),
                    item_id.to_string(),
                    now,
                ],
            )?;
            query_comment(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Comment vanished after insert: {}", id))
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    pub fn update_comment(&self, id: Uuid, content: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id.to_string(), content.trim(), Utc::now()],
            )?;
            query_comment(conn, id)
        })
    }

    /// Returns true if a comment was removed.
    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM comments WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    /// Comments on an item, newest first.
    pub fn comments_for_item(&self, item_id: Uuid) -> Result<Vec<CommentRow>> {
        let mut w = Where::default();
        w.and("c.item_id = ?", item_id.to_string());
        self.query_comments(&w, None, 0)
    }

    /// Comments across all items, newest first, optionally filtered by a
    /// case-insensitive substring of the content.
    pub fn list_comments(
        &self,
        search: Option<&str>,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<CommentRow>> {
        self.query_comments(&search_clause(search), limit, offset)
    }

    pub fn count_comments(&self, search: Option<&str>) -> Result<u64> {
        let w = search_clause(search);
        let sql = format!("SELECT COUNT(*) FROM comments c{}", w.sql());
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(&sql, w.params().as_slice(), |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    fn query_comments(&self, w: &Where, limit: Option<u32>, offset: u32) -> Result<Vec<CommentRow>> {
        let sql = format!(
            "{COMMENT_SELECT}{} ORDER BY c.created_at DESC, c.rowid DESC{}",
            w.sql(),
            limit_sql(limit, offset)
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(w.params().as_slice(), comment_at)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn search_clause(search: Option<&str>) -> Where {
    let mut w = Where::default();
    if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
        w.and("c.content LIKE ? ESCAPE '\\'", like_pattern(term));
    }
    w
}

fn query_comment(conn: &Connection, id: Uuid) -> Result<Option<CommentRow>> {
    let sql = format!("{COMMENT_SELECT} WHERE c.id = ?1");
    conn.query_row(&sql, [id.to_string()], comment_at).optional()
}

fn comment_at(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: uuid_at(row, 0)?,
        content: row.get(1)?,
        item_id: uuid_at(row, 2)?,
        item_title: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        author_email: row.get(6)?,
        author: author_at(row, 7)?,
    })
}
