//! Cascading removal of users and items.
//!
//! Each routine runs in a single transaction: either every dependent record is
//! gone and the target removed, or nothing changed and the error is returned.

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::{Database, OptionalExt};

/// What a user purge removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub items: usize,
    /// Comments on the user's items plus the user's own comments
    pub comments: usize,
    /// Like rows on the user's items plus the user's likes elsewhere
    pub item_likes: usize,
    pub follows: usize,
    pub collabs: usize,
    /// Collab like and participant rows
    pub collab_memberships: usize,
    pub sessions: usize,
    /// Image paths of the deleted items, for file cleanup
    pub item_images: Vec<String>,
}

/// What an item deletion removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ItemPurge {
    pub comments: usize,
    pub likes: usize,
    pub image: String,
}

impl Database {
    /// Remove a user and everything that references them. Returns `None` if
    /// the user does not exist.
    pub fn purge_user(&self, user_id: Uuid) -> Result<Option<PurgeReport>> {
        let report = self.with_tx(|conn| purge_user_in(conn, user_id))?;
        if let Some(report) = &report {
            info!(
                "Purged user {}: {} items, {} comments, {} item likes, {} follows, {} collabs, {} sessions",
                user_id,
                report.items,
                report.comments,
                report.item_likes,
                report.follows,
                report.collabs,
                report.sessions
            );
        }
        Ok(report)
    }

    /// Remove an item with its comments and likes. Nothing outside the item is
    /// touched. Returns `None` if the item does not exist.
    pub fn purge_item(&self, item_id: Uuid) -> Result<Option<ItemPurge>> {
        self.with_tx(|conn| {
            let id = item_id.to_string();
            let image: Option<String> = conn
                .query_row("SELECT image FROM items WHERE id = ?1", [&id], |r| r.get(0))
                .optional()?;
            let Some(image) = image else {
                return Ok(None);
            };

            let comments = conn.execute("DELETE FROM comments WHERE item_id = ?1", [&id])?;
            let likes = conn.execute("DELETE FROM item_likes WHERE item_id = ?1", [&id])?;
            conn.execute("DELETE FROM items WHERE id = ?1", [&id])?;

            Ok(Some(ItemPurge {
                comments,
                likes,
                image,
            }))
        })
    }
}

fn purge_user_in(conn: &Connection, user_id: Uuid) -> Result<Option<PurgeReport>> {
    let uid = user_id.to_string();
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [&uid], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Ok(None);
    }

    let mut report = PurgeReport::default();

    // images of the user's items, for the caller to unlink
    let mut stmt = conn.prepare("SELECT image FROM items WHERE author_id = ?1")?;
    report.item_images = stmt
        .query_map([&uid], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    report.item_images.retain(|path| !path.is_empty());

    const OWN_ITEMS: &str = "SELECT id FROM items WHERE author_id = ?1";

    // comments on the user's items, then the user's own comments
    report.comments += conn.execute(
        &format!("DELETE FROM comments WHERE item_id IN ({OWN_ITEMS})"),
        [&uid],
    )?;
    report.comments += conn.execute("DELETE FROM comments WHERE author_id = ?1", [&uid])?;

    // the items themselves, after their like rows
    report.item_likes += conn.execute(
        &format!("DELETE FROM item_likes WHERE item_id IN ({OWN_ITEMS})"),
        [&uid],
    )?;
    report.items = conn.execute("DELETE FROM items WHERE author_id = ?1", [&uid])?;

    // the user's likes on remaining items
    report.item_likes += conn.execute("DELETE FROM item_likes WHERE user_id = ?1", [&uid])?;

    // follow edges in both directions
    report.follows = conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 OR followee_id = ?1",
        [&uid],
    )?;

    // collabs authored by the user, then the user's memberships on the rest
    const OWN_COLLABS: &str = "SELECT id FROM collabs WHERE author_id = ?1";
    for table in ["collab_likes", "collab_participants"] {
        report.collab_memberships += conn.execute(
            &format!("DELETE FROM {table} WHERE collab_id IN ({OWN_COLLABS})"),
            [&uid],
        )?;
    }
    report.collabs = conn.execute("DELETE FROM collabs WHERE author_id = ?1", [&uid])?;
    for table in ["collab_likes", "collab_participants"] {
        report.collab_memberships +=
            conn.execute(&format!("DELETE FROM {table} WHERE user_id = ?1"), [&uid])?;
    }

    report.sessions = conn.execute("DELETE FROM sessions WHERE user_id = ?1", [&uid])?;

    // the user record last
    conn.execute("DELETE FROM users WHERE id = ?1", [&uid])?;

    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MembershipSet;
    use crate::items::ItemFilter;
    use crate::models::NewCollab;
    use crate::test_support::{artist, db, item};
    use chrono::{Duration, Utc};

    #[test]
    fn purge_user_removes_all_dependents() {
        let db = db();
        let u = artist(&db, "U");
        let other = artist(&db, "Other");
        let third = artist(&db, "Third");

        let own = item(&db, u.id, "own");
        let foreign = item(&db, other.id, "foreign");

        // comments on U's item by someone else, and U's comment elsewhere
        db.create_comment(own, other.id, "nice").unwrap();
        db.create_comment(foreign, u.id, "thanks").unwrap();
        let kept = db.create_comment(foreign, third.id, "kept").unwrap();

        // likes in both directions
        db.toggle_membership(MembershipSet::ItemLikes, own, other.id).unwrap();
        db.toggle_membership(MembershipSet::ItemLikes, foreign, u.id).unwrap();
        db.toggle_membership(MembershipSet::ItemLikes, foreign, third.id).unwrap();

        // follows in both directions
        db.toggle_membership(MembershipSet::Followers, other.id, u.id).unwrap();
        db.toggle_membership(MembershipSet::Followers, u.id, third.id).unwrap();
        db.toggle_membership(MembershipSet::Followers, other.id, third.id).unwrap();

        db.create_session(u.id, Utc::now() + Duration::days(1)).unwrap();

        let report = db.purge_user(u.id).unwrap().unwrap();
        assert_eq!(report.items, 1);
        assert_eq!(report.comments, 2);
        assert_eq!(report.item_likes, 2);
        assert_eq!(report.follows, 2);
        assert_eq!(report.sessions, 1);

        assert!(db.get_user_by_id(u.id).unwrap().is_none());
        assert!(db.get_item(own).unwrap().is_none());

        let by_u = ItemFilter {
            author: Some(u.id),
            ..Default::default()
        };
        assert_eq!(db.count_items(&by_u).unwrap(), 0);

        let remaining: Vec<_> = db.comments_for_item(foreign).unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec![kept.id]);

        assert_eq!(db.members(MembershipSet::ItemLikes, foreign).unwrap(), vec![third.id]);
        assert_eq!(db.members(MembershipSet::Followers, other.id).unwrap(), vec![third.id]);
        assert!(db.following_ids(third.id).unwrap().iter().all(|id| *id != u.id));
    }

    #[test]
    fn purge_user_cleans_collabs() {
        let db = db();
        let u = artist(&db, "U");
        let other = artist(&db, "Other");

        let new_collab = |author: Uuid| NewCollab {
            author_id: author,
            title: "Guest spot".into(),
            description: String::new(),
            styles: vec![],
            location: String::new(),
            start_date: None,
            end_date: None,
        };
        let own = db.create_collab(&new_collab(u.id)).unwrap().id;
        let foreign = db.create_collab(&new_collab(other.id)).unwrap().id;

        db.toggle_membership(MembershipSet::CollabParticipants, own, other.id).unwrap();
        db.toggle_membership(MembershipSet::CollabParticipants, foreign, u.id).unwrap();
        db.toggle_membership(MembershipSet::CollabLikes, foreign, u.id).unwrap();

        let report = db.purge_user(u.id).unwrap().unwrap();
        assert_eq!(report.collabs, 1);
        assert_eq!(report.collab_memberships, 3);

        assert!(db.get_collab(own).unwrap().is_none());
        assert!(db.get_collab(foreign).unwrap().is_some());
        assert_eq!(db.member_count(MembershipSet::CollabParticipants, foreign).unwrap(), 0);
        assert_eq!(db.member_count(MembershipSet::CollabLikes, foreign).unwrap(), 0);
    }

    #[test]
    fn follower_list_empties_when_follower_deleted() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");

        db.toggle_membership(MembershipSet::Followers, b.id, a.id).unwrap();
        assert_eq!(db.members(MembershipSet::Followers, b.id).unwrap(), vec![a.id]);
        assert_eq!(db.following_ids(a.id).unwrap(), vec![b.id]);

        db.purge_user(a.id).unwrap().unwrap();
        assert!(db.members(MembershipSet::Followers, b.id).unwrap().is_empty());
    }

    #[test]
    fn purge_missing_user_is_none() {
        let db = db();
        assert!(db.purge_user(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn purge_item_touches_only_its_comments() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let doomed = item(&db, a.id, "doomed");
        let survivor = item(&db, a.id, "survivor");

        db.create_comment(doomed, b.id, "one").unwrap();
        db.create_comment(doomed, a.id, "two").unwrap();
        db.create_comment(survivor, b.id, "three").unwrap();
        db.toggle_membership(MembershipSet::ItemLikes, doomed, b.id).unwrap();
        db.toggle_membership(MembershipSet::ItemLikes, survivor, b.id).unwrap();
        db.toggle_membership(MembershipSet::Followers, a.id, b.id).unwrap();

        let purge = db.purge_item(doomed).unwrap().unwrap();
        assert_eq!(purge.comments, 2);
        assert_eq!(purge.likes, 1);

        assert!(db.get_item(doomed).unwrap().is_none());
        assert_eq!(db.comments_for_item(survivor).unwrap().len(), 1);
        assert_eq!(db.member_count(MembershipSet::ItemLikes, survivor).unwrap(), 1);
        assert_eq!(db.member_count(MembershipSet::Followers, a.id).unwrap(), 1);
        assert!(db.purge_item(doomed).unwrap().is_none());
    }
}
