use std::collections::HashMap;

use anyhow::{Result, bail};
use chrono::Utc;
use ink_types::models::Membership;
use rusqlite::Connection;
use rusqlite::types::ToSql;
use uuid::Uuid;

use crate::{Database, placeholders, uuid_at};

/// A set of user ids hanging off an owner record, stored as one row per member.
///
/// `Followers` is keyed by the followee: its members are the followers. The
/// "following" view of a user reads the same table from the other side, so the
/// two directions of a follow can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipSet {
    ItemLikes,
    CollabLikes,
    CollabParticipants,
    Followers,
}

impl MembershipSet {
    fn table(&self) -> &'static str {
        match self {
            Self::ItemLikes => "item_likes",
            Self::CollabLikes => "collab_likes",
            Self::CollabParticipants => "collab_participants",
            Self::Followers => "follows",
        }
    }

    fn owner_column(&self) -> &'static str {
        match self {
            Self::ItemLikes => "item_id",
            Self::CollabLikes | Self::CollabParticipants => "collab_id",
            Self::Followers => "followee_id",
        }
    }

    fn member_column(&self) -> &'static str {
        match self {
            Self::Followers => "follower_id",
            _ => "user_id",
        }
    }

    /// Query that is true when the owner record exists. Only artists can be
    /// followed.
    fn owner_exists_sql(&self) -> &'static str {
        match self {
            Self::ItemLikes => "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1)",
            Self::CollabLikes | Self::CollabParticipants => {
                "SELECT EXISTS(SELECT 1 FROM collabs WHERE id = ?1)"
            }
            Self::Followers => "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1 AND role = 'artist')",
        }
    }
}

impl Database {
    /// Toggle `member` in the set owned by `owner`: removes if present, inserts
    /// if absent. Returns the new membership and the resulting set size, or
    /// `None` if the owner does not exist.
    pub fn toggle_membership(
        &self,
        set: MembershipSet,
        owner: Uuid,
        member: Uuid,
    ) -> Result<Option<Membership>> {
        if set == MembershipSet::Followers && owner == member {
            bail!("User {} cannot follow themself", member);
        }

        self.with_tx(|conn| {
            let (table, owner_col, member_col) = (set.table(), set.owner_column(), set.member_column());
            let owner_id = owner.to_string();
            let member_id = member.to_string();

            let exists: bool = conn.query_row(set.owner_exists_sql(), [&owner_id], |r| r.get(0))?;
            if !exists {
                return Ok(None);
            }

            let removed = conn.execute(
                &format!("DELETE FROM {table} WHERE {owner_col} = ?1 AND {member_col} = ?2"),
                [&owner_id, &member_id],
            )?;

            if removed == 0 {
                conn.execute(
                    &format!(
                        "INSERT INTO {table} ({owner_col}, {member_col}, created_at) VALUES (?1, ?2, ?3)"
                    ),
                    rusqlite::params![owner_id, member_id, Utc::now()],
                )?;
            }

            Ok(Some(Membership {
                member: removed == 0,
                count: count_members(conn, set, owner)?,
            }))
        })
    }

    #[cfg(test)]
    pub(crate) fn is_member(&self, set: MembershipSet, owner: Uuid, member: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: i64 = conn.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND {} = ?2)",
                    set.table(),
                    set.owner_column(),
                    set.member_column()
                ),
                [owner.to_string(), member.to_string()],
                |r| r.get(0),
            )?;
            Ok(found != 0)
        })
    }

    pub fn member_count(&self, set: MembershipSet, owner: Uuid) -> Result<usize> {
        self.with_conn(|conn| count_members(conn, set, owner))
    }

    /// Members of one set, oldest first.
    #[cfg(test)]
    pub(crate) fn members(&self, set: MembershipSet, owner: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .members_for(set, &[owner])?
            .remove(&owner)
            .unwrap_or_default())
    }

    /// Batch-fetch the members of many sets at once. Owners without members
    /// are absent from the map.
    pub fn members_for(
        &self,
        set: MembershipSet,
        owners: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        if owners.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {owner}, {member} FROM {table} WHERE {owner} IN ({}) ORDER BY created_at, rowid",
                placeholders(owners.len()),
                owner = set.owner_column(),
                member = set.member_column(),
                table = set.table(),
            );
            let ids: Vec<String> = owners.iter().map(Uuid::to_string).collect();
            let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((uuid_at(row, 0)?, uuid_at(row, 1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut map: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
            for (owner, member) in rows {
                map.entry(owner).or_default().push(member);
            }
            Ok(map)
        })
    }
}

fn count_members(conn: &Connection, set: MembershipSet, owner: Uuid) -> Result<usize> {
    let n: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", set.table(), set.owner_column()),
        [owner.to_string()],
        |r| r.get(0),
    )?;
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{artist, db, item};

    #[test]
    fn like_then_unlike() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let item = item(&db, a.id, "peony");

        let liked = db.toggle_membership(MembershipSet::ItemLikes, item, b.id).unwrap();
        assert_eq!(liked, Some(Membership { member: true, count: 1 }));
        assert_eq!(db.members(MembershipSet::ItemLikes, item).unwrap(), vec![b.id]);

        let unliked = db.toggle_membership(MembershipSet::ItemLikes, item, b.id).unwrap();
        assert_eq!(unliked, Some(Membership { member: false, count: 0 }));
        assert!(db.members(MembershipSet::ItemLikes, item).unwrap().is_empty());
    }

    #[test]
    fn toggle_alternates_rather_than_counting() {
        let db = db();
        let a = artist(&db, "A");
        let item = item(&db, a.id, "peony");

        let results: Vec<bool> = (0..4)
            .map(|_| db.toggle_membership(MembershipSet::ItemLikes, item, a.id).unwrap().unwrap().member)
            .collect();
        assert_eq!(results, vec![true, false, true, false]);
        assert_eq!(db.member_count(MembershipSet::ItemLikes, item).unwrap(), 0);
    }

    #[test]
    fn follow_twice_restores_both_sides() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");

        let first = db.toggle_membership(MembershipSet::Followers, b.id, a.id).unwrap().unwrap();
        assert!(first.member);
        assert_eq!(first.count, 1);
        assert!(db.is_member(MembershipSet::Followers, b.id, a.id).unwrap());
        assert_eq!(db.following_ids(a.id).unwrap(), vec![b.id]);

        let second = db.toggle_membership(MembershipSet::Followers, b.id, a.id).unwrap().unwrap();
        assert!(!second.member);
        assert!(db.members(MembershipSet::Followers, b.id).unwrap().is_empty());
        assert!(db.following_ids(a.id).unwrap().is_empty());
    }

    #[test]
    fn self_follow_is_rejected() {
        let db = db();
        let a = artist(&db, "A");
        assert!(db.toggle_membership(MembershipSet::Followers, a.id, a.id).is_err());
        assert!(db.followers_of(a.id).unwrap().is_empty());
    }

    #[test]
    fn members_for_groups_by_owner() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let first = item(&db, a.id, "one");
        let second = item(&db, a.id, "two");
        let untouched = item(&db, a.id, "three");

        db.toggle_membership(MembershipSet::ItemLikes, first, a.id).unwrap();
        db.toggle_membership(MembershipSet::ItemLikes, first, b.id).unwrap();
        db.toggle_membership(MembershipSet::ItemLikes, second, b.id).unwrap();

        let map = db
            .members_for(MembershipSet::ItemLikes, &[first, second, untouched])
            .unwrap();
        assert_eq!(map[&first], vec![a.id, b.id]);
        assert_eq!(map[&second], vec![b.id]);
        assert!(!map.contains_key(&untouched));
    }

    #[test]
    fn missing_owner_is_none() {
        let db = db();
        let a = artist(&db, "A");
        let ghost = Uuid::new_v4();

        for set in [
            MembershipSet::ItemLikes,
            MembershipSet::CollabLikes,
            MembershipSet::CollabParticipants,
            MembershipSet::Followers,
        ] {
            assert_eq!(db.toggle_membership(set, ghost, a.id).unwrap(), None);
        }
    }

    #[test]
    fn purged_item_cannot_be_liked() {
        let db = db();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let doomed = item(&db, a.id, "flash");
        db.purge_item(doomed).unwrap();

        assert_eq!(db.toggle_membership(MembershipSet::ItemLikes, doomed, b.id).unwrap(), None);
        assert_eq!(db.member_count(MembershipSet::ItemLikes, doomed).unwrap(), 0);
    }

    #[test]
    fn only_artists_can_be_followed() {
        let db = db();
        let a = artist(&db, "A");
        let admin = db
            .create_user(&crate::models::NewUser {
                email: "root@ink.test".into(),
                password_hash: "hash".into(),
                artist_name: "Root".into(),
                bio: String::new(),
                specialties: vec![],
                profile_image: String::new(),
                role: ink_types::models::Role::Admin,
                verified: true,
            })
            .unwrap();

        assert_eq!(db.toggle_membership(MembershipSet::Followers, admin.id, a.id).unwrap(), None);
    }
}
