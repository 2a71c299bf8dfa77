use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CollabStatus, Role, normalize_tags};

// -- JWT Claims --

/// Session token claims. `sid` points at a row in the sessions table; the token
/// is only honoured while that row exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub artist_name: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAccountRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteAccountRequest {
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// -- Shared views --

#[derive(Debug, Clone, Serialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub artist_name: String,
    pub profile_image: String,
    pub verified: bool,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, current_page: u32, per_page: u32, total: u64) -> Self {
        let total_pages = total.div_ceil(per_page as u64) as u32;
        Self {
            items,
            current_page,
            total_pages,
            total,
            has_next_page: current_page < total_pages,
            has_prev_page: current_page > 1,
        }
    }
}

// -- Items --

#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub author: AuthorSummary,
    pub category: Vec<String>,
    pub likes: Vec<Uuid>,
    pub likes_count: usize,
    pub is_liked: bool,
    pub comments_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ItemDetailResponse {
    pub item: ItemView,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: usize,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub content: String,
    pub author: AuthorSummary,
    pub item_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Artists --

#[derive(Debug, Serialize)]
pub struct ArtistSummary {
    pub id: Uuid,
    pub artist_name: String,
    pub profile_image: String,
    pub bio: String,
    pub specialties: Vec<String>,
    pub verified: bool,
    pub followers_count: u64,
    pub works_count: u64,
    pub is_following: bool,
}

#[derive(Debug, Serialize)]
pub struct ArtistProfileResponse {
    pub artist: ArtistSummary,
    pub following_count: u64,
    pub items: Vec<ItemView>,
    pub is_following: bool,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub following: bool,
    pub followers_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: Uuid,
    pub email: String,
    pub artist_name: String,
    pub bio: String,
    pub specialties: Vec<String>,
    pub profile_image: String,
    pub role: Role,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MyInkResponse {
    pub profile: ProfileView,
    pub followers: Vec<AuthorSummary>,
    pub following: Vec<AuthorSummary>,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub popular_items: Vec<ItemView>,
    pub popular_artists: Vec<ArtistSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InspireQuery {
    pub category: Option<String>,
}

// -- Collabs --

/// Tag input that may arrive either as a JSON list or as one comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Text(String),
}

impl TagsInput {
    pub fn into_tags(self) -> Vec<String> {
        match self {
            Self::List(values) => normalize_tags(values),
            Self::Text(value) => normalize_tags([value]),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCollabRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub styles: Option<TagsInput>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CollabQuery {
    pub status: Option<String>,
    pub style: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CollabView {
    pub id: Uuid,
    pub author: AuthorSummary,
    pub title: String,
    pub description: String,
    pub styles: Vec<String>,
    pub location: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub derived_status: CollabStatus,
    pub participants: Vec<AuthorSummary>,
    pub participants_count: usize,
    pub likes_count: usize,
    pub is_liked: bool,
    pub is_participating: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ParticipateResponse {
    pub participating: bool,
    pub participants_count: usize,
}

// -- Admin --

#[derive(Debug, Default, Deserialize)]
pub struct AdminArtistQuery {
    pub search: Option<String>,
    pub verified: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminSearchQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AdminArtistView {
    pub id: Uuid,
    pub artist_name: String,
    pub email: String,
    pub bio: String,
    pub specialties: Vec<String>,
    pub verified: bool,
    pub followers_count: u64,
    pub works_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AdminCommentView {
    pub id: Uuid,
    pub content: String,
    pub author: AuthorSummary,
    pub author_email: String,
    pub item_id: Uuid,
    pub item_title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_users: u64,
    pub total_items: u64,
    pub total_comments: u64,
    pub verified_artists: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub recent_users: Vec<AdminArtistView>,
    pub recent_items: Vec<ItemView>,
    pub pending_verification: Vec<AdminArtistView>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub verified: bool,
    pub message: String,
}
