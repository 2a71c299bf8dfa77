use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use ink_db::items::ItemFilter;
use ink_db::users::{ArtistFilter, ArtistOrder};
use ink_types::api::{
    AdminArtistQuery, AdminArtistView, AdminCommentView, AdminSearchQuery, DashboardResponse,
    DashboardStats, ItemView, Page, SuccessResponse, VerifyResponse,
};
use ink_types::models::{ActorContext, Role};

use crate::error::{ApiError, ApiResult};
use crate::views::{admin_artist_view, admin_comment_view, item_views};
use crate::{AppState, db_call, page_window};

pub const ADMIN_PAGE_SIZE: u32 = 20;
const DASHBOARD_LIST: u32 = 10;
const RECENT_DAYS: i64 = 7;

/// GET /admin/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
) -> ApiResult<Json<DashboardResponse>> {
    let admin = actor.user_id;
    let dashboard = db_call(&state, move |db| {
        let stats = DashboardStats {
            total_users: db.count_artists(&ArtistFilter::default())?,
            total_items: db.count_items(&ItemFilter::default())?,
            total_comments: db.count_comments(None)?,
            verified_artists: db.count_verified_users()?,
        };

        let recent = ArtistFilter {
            joined_since: Some(Utc::now() - Duration::days(RECENT_DAYS)),
            order: ArtistOrder::Newest,
            ..Default::default()
        };
        let pending = ArtistFilter {
            verified: Some(false),
            order: ArtistOrder::Newest,
            ..Default::default()
        };
        let items = db.list_items(&ItemFilter::default(), Some(DASHBOARD_LIST), 0)?;

        Ok(DashboardResponse {
            stats,
            recent_users: db
                .list_artists(&recent, Some(DASHBOARD_LIST), 0)?
                .into_iter()
                .map(admin_artist_view)
                .collect(),
            recent_items: item_views(db, items, Some(admin))?,
            pending_verification: db
                .list_artists(&pending, Some(DASHBOARD_LIST), 0)?
                .into_iter()
                .map(admin_artist_view)
                .collect(),
        })
    })
    .await?;

    Ok(Json(dashboard))
}

/// `verified=true|false` filters; anything else lists all.
fn verified_filter(raw: Option<&str>) -> Option<bool> {
    match raw {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// GET /admin/artists?search&verified&page
pub async fn list_artists(
    State(state): State<AppState>,
    Query(query): Query<AdminArtistQuery>,
) -> ApiResult<Json<Page<AdminArtistView>>> {
    let (page, offset) = page_window(query.page, ADMIN_PAGE_SIZE);
    let filter = ArtistFilter {
        search: query.search,
        verified: verified_filter(query.verified.as_deref()),
        order: ArtistOrder::Newest,
        ..Default::default()
    };

    let (rows, total) = db_call(&state, move |db| {
        let total = db.count_artists(&filter)?;
        Ok((db.list_artists(&filter, Some(ADMIN_PAGE_SIZE), offset)?, total))
    })
    .await?;

    let views = rows.into_iter().map(admin_artist_view).collect();
    Ok(Json(Page::new(views, page, ADMIN_PAGE_SIZE, total)))
}

/// POST /admin/artists/{id}/verify - flip the verified badge.
pub async fn toggle_verification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<VerifyResponse>> {
    let verified = db_call(&state, move |db| db.toggle_verified(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Artist"))?;

    info!("Artist {} verification set to {}", id, verified);
    let message = if verified {
        "Artist verified"
    } else {
        "Artist verification removed"
    };
    Ok(Json(VerifyResponse {
        success: true,
        verified,
        message: message.into(),
    }))
}

/// DELETE /admin/artists/{id} - the same purge as self-deletion. Only the
/// artist's own sessions are revoked.
pub async fn delete_artist(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    let purged = db_call(&state, move |db| {
        let Some(artist) = db.get_user_by_id(id)?.filter(|u| u.role == Role::Artist) else {
            return Ok(None);
        };
        Ok(db.purge_user(id)?.map(|report| (artist, report)))
    })
    .await?;

    let (artist, report) = purged.ok_or_else(|| ApiError::not_found("Artist"))?;

    for image in report.item_images.iter().chain(Some(&artist.profile_image)) {
        if !image.is_empty() {
            state.storage.delete_file(image).await;
        }
    }

    info!(
        "Admin {} deleted artist {} ({} items, {} comments)",
        actor.user_id, id, report.items, report.comments
    );
    Ok(Json(SuccessResponse::new("Artist account deleted")))
}

/// GET /admin/items?search&page
pub async fn list_items(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<AdminSearchQuery>,
) -> ApiResult<Json<Page<ItemView>>> {
    let (page, offset) = page_window(query.page, ADMIN_PAGE_SIZE);
    let filter = ItemFilter {
        search: query.search,
        ..Default::default()
    };
    let admin = actor.user_id;

    let (views, total) = db_call(&state, move |db| {
        let total = db.count_items(&filter)?;
        let rows = db.list_items(&filter, Some(ADMIN_PAGE_SIZE), offset)?;
        Ok((item_views(db, rows, Some(admin))?, total))
    })
    .await?;

    Ok(Json(Page::new(views, page, ADMIN_PAGE_SIZE, total)))
}

/// DELETE /admin/items/{id}
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    let purged = db_call(&state, move |db| db.purge_item(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Item"))?;

    if !purged.image.is_empty() {
        state.storage.delete_file(&purged.image).await;
    }

    info!("Admin removed item {} ({} comments)", id, purged.comments);
    Ok(Json(SuccessResponse::new("Item deleted")))
}

/// GET /admin/comments?search&page
pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<AdminSearchQuery>,
) -> ApiResult<Json<Page<AdminCommentView>>> {
    let (page, offset) = page_window(query.page, ADMIN_PAGE_SIZE);
    let search = query.search;

    let (rows, total) = db_call(&state, move |db| {
        let total = db.count_comments(search.as_deref())?;
        Ok((
            db.list_comments(search.as_deref(), Some(ADMIN_PAGE_SIZE), offset)?,
            total,
        ))
    })
    .await?;

    let views = rows.into_iter().map(admin_comment_view).collect();
    Ok(Json(Page::new(views, page, ADMIN_PAGE_SIZE, total)))
}

/// DELETE /admin/comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    if !db_call(&state, move |db| db.delete_comment(id)).await? {
        return Err(ApiError::not_found("Comment"));
    }
    Ok(Json(SuccessResponse::new("Comment deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_filter_values() {
        assert_eq!(verified_filter(Some("true")), Some(true));
        assert_eq!(verified_filter(Some("false")), Some(false));
        assert_eq!(verified_filter(Some("all")), None);
        assert_eq!(verified_filter(None), None);
    }
}
