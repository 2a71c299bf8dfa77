//! Database row types. Kept apart from the ink-types API views so the store
//! stays independent of the HTTP surface.

use chrono::{DateTime, Utc};
use ink_types::models::Role;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub artist_name: String,
    pub bio: String,
    pub specialties: Vec<String>,
    pub profile_image: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user plus the counters shown on artist listings.
#[derive(Debug, Clone)]
pub struct ArtistRow {
    pub user: UserRow,
    pub followers_count: u64,
    pub works_count: u64,
}

/// The public face of a user embedded in other records.
#[derive(Debug, Clone)]
pub struct AuthorRow {
    pub id: Uuid,
    pub artist_name: String,
    pub profile_image: String,
    pub verified: bool,
}

#[derive(Debug, Clone)]
pub struct ItemRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub author: AuthorRow,
    pub category: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: Uuid,
    pub content: String,
    pub author: AuthorRow,
    pub author_email: String,
    pub item_id: Uuid,
    pub item_title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CollabRow {
    pub id: Uuid,
    pub author: AuthorRow,
    pub title: String,
    pub description: String,
    pub styles: Vec<String>,
    pub location: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A live session joined with the current state of its user.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub artist_name: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

// -- Inserts --

pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub artist_name: String,
    pub bio: String,
    pub specialties: Vec<String>,
    pub profile_image: String,
    pub role: Role,
    pub verified: bool,
}

pub struct NewItem {
    pub title: String,
    pub description: String,
    pub image: String,
    pub author_id: Uuid,
    pub category: Vec<String>,
}

/// Fields an author may change on an item. `None` leaves a field untouched.
#[derive(Default)]
pub struct ItemChanges {
    pub title: String,
    pub description: String,
    pub category: Option<Vec<String>>,
    pub image: Option<String>,
}

pub struct NewCollab {
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub styles: Vec<String>,
    pub location: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

pub struct ProfileChanges {
    pub artist_name: String,
    pub bio: String,
    pub specialties: Vec<String>,
    pub profile_image: Option<String>,
}
