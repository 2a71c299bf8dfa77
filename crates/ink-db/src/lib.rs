pub mod collabs;
pub mod comments;
pub mod integrity;
pub mod items;
pub mod membership;
pub mod migrations;
pub mod models;
pub mod sessions;
pub mod users;

use anyhow::Result;
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

pub use integrity::{ItemPurge, PurgeReport};
pub use membership::MembershipSet;
pub use users::is_duplicate_email;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

// -- Column helpers --

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn tags_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn tags_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Escape a user search term for a `LIKE ... ESCAPE '\'` clause.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Accumulates `AND`-joined filter clauses with their positional parameters.
#[derive(Default)]
pub(crate) struct Where {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl Where {
    /// Add a clause, binding `value` once for every `?` it contains.
    pub(crate) fn and<P: ToSql + Clone + 'static>(&mut self, clause: &str, value: P) {
        for _ in 0..clause.matches('?').count() {
            self.params.push(Box::new(value.clone()));
        }
        self.clauses.push(format!("({})", clause));
    }

    pub(crate) fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

pub(crate) fn limit_sql(limit: Option<u32>, offset: u32) -> String {
    match limit {
        Some(limit) => format!(" LIMIT {} OFFSET {}", limit, offset),
        None => String::new(),
    }
}

/// Placeholder list `?, ?, ?` for an `IN (...)` clause.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::{NewItem, NewUser, UserRow};
    use ink_types::models::Role;

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn artist(db: &Database, name: &str) -> UserRow {
        db.create_user(&NewUser {
            email: format!("{}@ink.test", name.to_lowercase()),
            password_hash: "hash".into(),
            artist_name: name.into(),
            bio: String::new(),
            specialties: vec![],
            profile_image: String::new(),
            role: Role::Artist,
            verified: false,
        })
        .unwrap()
    }

    pub fn item(db: &Database, author: Uuid, title: &str) -> Uuid {
        db.create_item(&NewItem {
            title: title.into(),
            description: String::new(),
            image: String::new(),
            author_id: author,
            category: vec!["blackwork".into()],
        })
        .unwrap()
        .id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("rose"), "%rose%");
    }

    #[test]
    fn where_binds_value_per_placeholder() {
        let mut w = Where::default();
        w.and("a = ? OR b = ?", "x".to_string());
        w.and("c = ?", 1_i64);
        assert_eq!(w.sql(), " WHERE (a = ? OR b = ?) AND (c = ?)");
        assert_eq!(w.params().len(), 3);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = test_support::db();
        let user = test_support::artist(&db, "Mina");

        let result: Result<()> = db.with_tx(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", [user.id.to_string()])?;
            anyhow::bail!("boom")
        });

        assert!(result.is_err());
        assert!(db.get_user_by_id(user.id).unwrap().is_some());
    }
}
