//! Row-to-view assembly. Each function runs inside a `db_call` and batch-fetches
//! the memberships and counts its views need.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use ink_db::models::{ArtistRow, AuthorRow, CollabRow, CommentRow, ItemRow, UserRow};
use ink_db::{Database, MembershipSet};
use ink_types::api::{
    AdminArtistView, AdminCommentView, ArtistSummary, AuthorSummary, CollabView, CommentView,
    ItemView, ProfileView,
};
use ink_types::models::CollabStatus;

pub fn author_summary(author: AuthorRow) -> AuthorSummary {
    AuthorSummary {
        id: author.id,
        artist_name: author.artist_name,
        profile_image: author.profile_image,
        verified: author.verified,
    }
}

pub fn item_views(db: &Database, rows: Vec<ItemRow>, viewer: Option<Uuid>) -> Result<Vec<ItemView>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut likes_by_item = db.members_for(MembershipSet::ItemLikes, &ids)?;
    let comments = db.comment_counts(&ids)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let likes = likes_by_item.remove(&row.id).unwrap_or_default();
            ItemView {
                id: row.id,
                title: row.title,
                description: row.description,
                image: row.image,
                author: author_summary(row.author),
                category: row.category,
                likes_count: likes.len(),
                is_liked: viewer.is_some_and(|v| likes.contains(&v)),
                likes,
                comments_count: comments.get(&row.id).copied().unwrap_or(0),
                created_at: row.created_at,
                updated_at: row.updated_at,
            }
        })
        .collect())
}

pub fn item_view(db: &Database, row: ItemRow, viewer: Option<Uuid>) -> Result<ItemView> {
    let mut views = item_views(db, vec![row], viewer)?;
    views
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Item view assembly returned nothing"))
}

/// Ids the viewer follows, empty for anonymous requests.
pub fn following_set(db: &Database, viewer: Option<Uuid>) -> Result<HashSet<Uuid>> {
    match viewer {
        Some(id) => Ok(db.following_ids(id)?.into_iter().collect()),
        None => Ok(HashSet::new()),
    }
}

pub fn artist_summary(row: ArtistRow, following: &HashSet<Uuid>) -> ArtistSummary {
    let user = row.user;
    ArtistSummary {
        is_following: following.contains(&user.id),
        id: user.id,
        artist_name: user.artist_name,
        profile_image: user.profile_image,
        bio: user.bio,
        specialties: user.specialties,
        verified: user.verified,
        followers_count: row.followers_count,
        works_count: row.works_count,
    }
}

pub fn artist_summaries(
    db: &Database,
    rows: Vec<ArtistRow>,
    viewer: Option<Uuid>,
) -> Result<Vec<ArtistSummary>> {
    let following = following_set(db, viewer)?;
    Ok(rows
        .into_iter()
        .map(|row| artist_summary(row, &following))
        .collect())
}

pub fn collab_views(
    db: &Database,
    rows: Vec<CollabRow>,
    viewer: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<Vec<CollabView>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut participants_by_collab = db.participants_for(&ids)?;
    let likes_by_collab = db.members_for(MembershipSet::CollabLikes, &ids)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let participants = participants_by_collab.remove(&row.id).unwrap_or_default();
            let likes = likes_by_collab.get(&row.id).map(Vec::as_slice).unwrap_or_default();
            CollabView {
                id: row.id,
                author: author_summary(row.author),
                title: row.title,
                description: row.description,
                styles: row.styles,
                location: row.location,
                start_date: row.start_date,
                derived_status: CollabStatus::derive(row.end_date, now),
                end_date: row.end_date,
                participants_count: participants.len(),
                is_participating: viewer.is_some_and(|v| participants.iter().any(|p| p.id == v)),
                participants: participants.into_iter().map(author_summary).collect(),
                likes_count: likes.len(),
                is_liked: viewer.is_some_and(|v| likes.contains(&v)),
                created_at: row.created_at,
            }
        })
        .collect())
}

pub fn comment_view(row: CommentRow) -> CommentView {
    CommentView {
        id: row.id,
        content: row.content,
        author: author_summary(row.author),
        item_id: row.item_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn profile_view(user: UserRow) -> ProfileView {
    ProfileView {
        id: user.id,
        email: user.email,
        artist_name: user.artist_name,
        bio: user.bio,
        specialties: user.specialties,
        profile_image: user.profile_image,
        role: user.role,
        verified: user.verified,
        created_at: user.created_at,
    }
}

pub fn admin_artist_view(row: ArtistRow) -> AdminArtistView {
    let user = row.user;
    AdminArtistView {
        id: user.id,
        artist_name: user.artist_name,
        email: user.email,
        bio: user.bio,
        specialties: user.specialties,
        verified: user.verified,
        followers_count: row.followers_count,
        works_count: row.works_count,
        created_at: user.created_at,
    }
}

pub fn admin_comment_view(row: CommentRow) -> AdminCommentView {
    AdminCommentView {
        id: row.id,
        content: row.content,
        author: author_summary(row.author),
        author_email: row.author_email,
        item_id: row.item_id,
        item_title: row.item_title,
        created_at: row.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ink_db::models::{NewCollab, NewItem, NewUser};
    use ink_types::models::Role;

    fn artist(db: &Database, name: &str) -> Uuid {
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
        .id
    }

    #[test]
    fn item_views_carry_viewer_flags_and_counts() {
        let db = Database::open_in_memory().unwrap();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let row = db
            .create_item(&NewItem {
                title: "Koi".into(),
                description: String::new(),
                image: String::new(),
                author_id: a,
                category: vec![],
            })
            .unwrap();
        db.toggle_membership(MembershipSet::ItemLikes, row.id, b).unwrap();
        db.create_comment(row.id, a, "thanks").unwrap();

        let view = item_view(&db, row.clone(), Some(b)).unwrap();
        assert!(view.is_liked);
        assert_eq!(view.likes, vec![b]);
        assert_eq!(view.likes_count, 1);
        assert_eq!(view.comments_count, 1);

        let anonymous = item_view(&db, row, None).unwrap();
        assert!(!anonymous.is_liked);
    }

    #[test]
    fn collab_views_derive_status() {
        let db = Database::open_in_memory().unwrap();
        let a = artist(&db, "A");
        let b = artist(&db, "B");
        let now = Utc::now();
        let row = db
            .create_collab(&NewCollab {
                author_id: a,
                title: "Expired".into(),
                description: String::new(),
                styles: vec![],
                location: String::new(),
                start_date: None,
                end_date: Some(now - Duration::days(1)),
            })
            .unwrap();
        db.toggle_membership(MembershipSet::CollabParticipants, row.id, b).unwrap();

        let views = collab_views(&db, vec![row], Some(b), now).unwrap();
        assert_eq!(views[0].derived_status, CollabStatus::Closed);
        assert!(views[0].is_participating);
        assert_eq!(views[0].participants_count, 1);
        assert_eq!(views[0].participants[0].artist_name, "B");
        assert!(!views[0].is_liked);
    }
}
