use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::{ItemChanges, ItemRow, NewItem};
use crate::users::author_at;
use crate::{
    Database, OptionalExt, Where, like_pattern, limit_sql, placeholders, tags_at, tags_json,
    uuid_at,
};

const ITEM_SELECT: &str = "SELECT i.id, i.title, i.description, i.image, i.category, i.created_at, \
     i.updated_at, u.id, u.artist_name, u.profile_image, u.verified \
     FROM items i JOIN users u ON u.id = i.author_id";

#[derive(Debug, Clone, Copy, Default)]
pub enum ItemOrder {
    #[default]
    Newest,
    MostLiked,
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Exact tag the item must carry
    pub category: Option<String>,
    /// Case-insensitive substring of title, description, author name or a tag
    pub search: Option<String>,
    pub author: Option<Uuid>,
    pub liked_by: Option<Uuid>,
    pub order: ItemOrder,
}

impl ItemFilter {
    fn clauses(&self) -> Where {
        let mut w = Where::default();
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            w.and(
                "EXISTS (SELECT 1 FROM json_each(i.category) WHERE json_each.value = ?)",
                category.to_string(),
            );
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            w.and(
                "i.title LIKE ? ESCAPE '\\' OR i.description LIKE ? ESCAPE '\\' \
                 OR u.artist_name LIKE ? ESCAPE '\\' \
                 OR EXISTS (SELECT 1 FROM json_each(i.category) WHERE json_each.value LIKE ? ESCAPE '\\')",
                like_pattern(term),
            );
        }
        if let Some(author) = self.author {
            w.and("i.author_id = ?", author.to_string());
        }
        if let Some(user) = self.liked_by {
            w.and(
                "EXISTS (SELECT 1 FROM item_likes l WHERE l.item_id = i.id AND l.user_id = ?)",
                user.to_string(),
            );
        }
        w
    }
}

impl Database {
    pub fn create_item(&self, new: &NewItem) -> Result<ItemRow> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO items (id, title, description, image, author_id, category, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    id.to_string(),
                    new.title.trim(),
                    new.description.trim(),
                    new.image,
                    new.author_id.to_string(),
                    tags_json(&new.category),
                    now,
                ],
            )?;
            query_item(conn, id)?.ok_or_else(|| anyhow::anyhow!("Item vanished after insert: {}", id))
        })
    }

    pub fn get_item(&self, id: Uuid) -> Result<Option<ItemRow>> {
        self.with_conn(|conn| query_item(conn, id))
    }

    /// Apply an author's edits. Returns `None` when the item does not exist or
    /// belongs to someone else.
    pub fn update_item(
        &self,
        id: Uuid,
        author: Uuid,
        changes: &ItemChanges,
    ) -> Result<Option<ItemRow>> {
        self.with_tx(|conn| {
            let category = changes.category.as_deref().map(tags_json);
            let n = conn.execute(
                "UPDATE items
                 SET title = ?3, description = ?4,
                     category = COALESCE(?5, category), image = COALESCE(?6, image), updated_at = ?7
                 WHERE id = ?1 AND author_id = ?2",
                rusqlite::params![
                    id.to_string(),
                    author.to_string(),
                    changes.title.trim(),
                    changes.description.trim(),
                    category,
                    changes.image,
                    Utc::now(),
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_item(conn, id)
        })
    }

    pub fn list_items(
        &self,
        filter: &ItemFilter,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<ItemRow>> {
        let w = filter.clauses();
        let order = match filter.order {
            ItemOrder::Newest => "i.created_at DESC",
            ItemOrder::MostLiked => {
                "(SELECT COUNT(*) FROM item_likes l WHERE l.item_id = i.id) DESC, i.created_at DESC"
            }
        };
        let sql = format!(
            "{ITEM_SELECT}{} ORDER BY {order}{}",
            w.sql(),
            limit_sql(limit, offset)
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(w.params().as_slice(), item_at)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_items(&self, filter: &ItemFilter) -> Result<u64> {
        let w = filter.clauses();
        let sql = format!(
            "SELECT COUNT(*) FROM items i JOIN users u ON u.id = i.author_id{}",
            w.sql()
        );
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(&sql, w.params().as_slice(), |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    /// Comment counts for a batch of items. Items without comments are absent.
    pub fn comment_counts(&self, item_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>> {
        if item_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT item_id, COUNT(*) FROM comments WHERE item_id IN ({}) GROUP BY item_id",
                placeholders(item_ids.len())
            );
            let ids: Vec<String> = item_ids.iter().map(Uuid::to_string).collect();
            let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let counts = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((uuid_at(row, 0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(counts)
        })
    }
}

fn query_item(conn: &Connection, id: Uuid) -> Result<Option<ItemRow>> {
    let sql = format!("{ITEM_SELECT} WHERE i.id = ?1");
    conn.query_row(&sql, [id.to_string()], item_at).optional()
}

fn item_at(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        image: row.get(3)?,
        category: tags_at(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        author: author_at(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MembershipSet;
    use crate::test_support::{artist, db, item};

    fn tagged(db: &Database, author: Uuid, title: &str, tags: &[&str]) -> Uuid {
        db.create_item(&NewItem {
            title: title.into(),
            description: format!("{} piece", title),
            image: String::new(),
            author_id: author,
            category: tags.iter().map(|t| t.to_string()).collect(),
        })
        .unwrap()
        .id
    }

    #[test]
    fn create_trims_and_joins_author() {
        let db = db();
        let a = artist(&db, "Mina");
        let row = db
            .create_item(&NewItem {
                title: "  Crane  ".into(),
                description: " sleeve ".into(),
                image: "/uploads/artwork-1.png".into(),
                author_id: a.id,
                category: vec!["irezumi".into()],
            })
            .unwrap();

        assert_eq!(row.title, "Crane");
        assert_eq!(row.description, "sleeve");
        assert_eq!(row.author.artist_name, "Mina");
        assert_eq!(row.category, vec!["irezumi"]);
    }

    #[test]
    fn category_and_search_filters() {
        let db = db();
        let mina = artist(&db, "Mina");
        let jun = artist(&db, "Jun");
        tagged(&db, mina.id, "Koi", &["irezumi", "color"]);
        tagged(&db, mina.id, "Rose", &["fineline"]);
        tagged(&db, jun.id, "Skull", &["blackwork"]);

        let irezumi = ItemFilter {
            category: Some("irezumi".into()),
            ..Default::default()
        };
        assert_eq!(db.count_items(&irezumi).unwrap(), 1);

        // matches the author's name
        let by_name = ItemFilter {
            search: Some("jun".into()),
            ..Default::default()
        };
        let rows = db.list_items(&by_name, None, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Skull");

        // matches a tag substring
        let by_tag = ItemFilter {
            search: Some("LINE".into()),
            ..Default::default()
        };
        assert_eq!(db.list_items(&by_tag, None, 0).unwrap()[0].title, "Rose");

        let mine = ItemFilter {
            author: Some(mina.id),
            ..Default::default()
        };
        assert_eq!(db.count_items(&mine).unwrap(), 2);
    }

    #[test]
    fn liked_by_and_popularity_order() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let quiet = item(&db, a.id, "quiet");
        let loved = item(&db, a.id, "loved");
        db.toggle_membership(MembershipSet::ItemLikes, loved, a.id).unwrap();
        db.toggle_membership(MembershipSet::ItemLikes, loved, b.id).unwrap();
        db.toggle_membership(MembershipSet::ItemLikes, quiet, b.id).unwrap();

        let popular = ItemFilter {
            order: ItemOrder::MostLiked,
            ..Default::default()
        };
        let rows = db.list_items(&popular, Some(1), 0).unwrap();
        assert_eq!(rows[0].id, loved);

        let liked_by_a = ItemFilter {
            liked_by: Some(a.id),
            ..Default::default()
        };
        let rows = db.list_items(&liked_by_a, None, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, loved);
    }

    #[test]
    fn only_the_author_can_update() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let id = item(&db, a.id, "draft");

        let changes = ItemChanges {
            title: "final".into(),
            description: "done".into(),
            category: None,
            image: None,
        };
        assert!(db.update_item(id, b.id, &changes).unwrap().is_none());

        let row = db.update_item(id, a.id, &changes).unwrap().unwrap();
        assert_eq!(row.title, "final");
        // category untouched when not supplied
        assert_eq!(row.category, vec!["blackwork"]);
    }

    #[test]
    fn pagination_slices_results() {
        let db = db();
        let a = artist(&db, "A");
        for n in 0..5 {
            item(&db, a.id, &format!("piece {}", n));
        }
        let filter = ItemFilter::default();
        assert_eq!(db.list_items(&filter, Some(2), 0).unwrap().len(), 2);
        assert_eq!(db.list_items(&filter, Some(2), 4).unwrap().len(), 1);
        assert_eq!(db.count_items(&filter).unwrap(), 5);
    }
}
