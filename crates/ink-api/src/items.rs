use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use ink_db::MembershipSet;
use ink_db::items::ItemFilter;
use ink_db::models::{ItemChanges, NewItem};
use ink_types::api::{
    ItemDetailResponse, ItemQuery, ItemView, LikeResponse, Page, SuccessResponse,
};
use ink_types::models::ActorContext;

use crate::error::{ApiError, ApiResult};
use crate::forms::FormData;
use crate::middleware::Viewer;
use crate::storage::UploadKind;
use crate::views::{comment_view, item_view, item_views};
use crate::{AppState, db_call, page_window};

pub const FEED_PAGE_SIZE: u32 = 12;

/// A category query value that actually filters. Blank and "all" mean no filter.
pub(crate) fn category_filter(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
}

/// GET /items?category&search&page - the feed, newest first.
pub async fn list_items(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Json<Page<ItemView>>> {
    let (page, offset) = page_window(query.page, FEED_PAGE_SIZE);
    let filter = ItemFilter {
        category: category_filter(query.category),
        search: query.search,
        ..Default::default()
    };
    let viewer = viewer.user_id();

    let (views, total) = db_call(&state, move |db| {
        let total = db.count_items(&filter)?;
        let rows = db.list_items(&filter, Some(FEED_PAGE_SIZE), offset)?;
        Ok((item_views(db, rows, viewer)?, total))
    })
    .await?;

    Ok(Json(Page::new(views, page, FEED_PAGE_SIZE, total)))
}

/// GET /items/{id} - an item with its comments, newest first.
pub async fn get_item(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ItemDetailResponse>> {
    let viewer = viewer.user_id();
    let detail = db_call(&state, move |db| {
        let Some(row) = db.get_item(id)? else {
            return Ok(None);
        };
        let item = item_view(db, row, viewer)?;
        let comments = db.comments_for_item(id)?.into_iter().map(comment_view).collect();
        Ok(Some(ItemDetailResponse { item, comments }))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Item"))?;

    Ok(Json(detail))
}

/// POST /items (multipart: title, description, category, image)
pub async fn create_item(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ItemView>)> {
    let form = FormData::read(multipart, "image").await?;

    let title = form.text("title");
    if title.is_empty() {
        return Err(ApiError::validation("Title is required"));
    }

    let image = match &form.file {
        Some(file) => state.storage.save(UploadKind::Artwork, file).await?,
        None => String::new(),
    };

    let new = NewItem {
        title,
        description: form.text("description"),
        image,
        author_id: actor.user_id,
        category: form.list("category"),
    };
    let viewer = Some(actor.user_id);
    let view = db_call(&state, move |db| {
        let row = db.create_item(&new)?;
        item_view(db, row, viewer)
    })
    .await?;

    info!("{} published item {}", actor.artist_name, view.id);
    Ok((StatusCode::CREATED, Json(view)))
}

/// PUT /items/{id} (multipart) - author only. A missing `category` field
/// leaves the tags unchanged.
pub async fn update_item(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<ItemView>> {
    let form = FormData::read(multipart, "image").await?;

    let title = form.text("title");
    if title.is_empty() {
        return Err(ApiError::validation("Title is required"));
    }

    let image = match &form.file {
        Some(file) => Some(state.storage.save(UploadKind::Artwork, file).await?),
        None => None,
    };

    let changes = ItemChanges {
        title,
        description: form.text("description"),
        category: form.has("category").then(|| form.list("category")),
        image: image.clone(),
    };
    let author = actor.user_id;
    let updated = db_call(&state, move |db| {
        match db.update_item(id, author, &changes)? {
            Some(row) => Ok(Some(item_view(db, row, Some(author))?)),
            None => Ok(None),
        }
    })
    .await?;

    match updated {
        Some(view) => Ok(Json(view)),
        None => {
            if let Some(path) = image {
                state.storage.delete_file(&path).await;
            }
            Err(ApiError::not_found("Item"))
        }
    }
}

/// DELETE /items/{id} - author only. Comments and likes go with the item.
pub async fn delete_item(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    let author = actor.user_id;
    let purged = db_call(&state, move |db| {
        match db.get_item(id)? {
            Some(item) if item.author.id == author => db.purge_item(id),
            _ => Ok(None),
        }
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Item not found or you do not have permission".into()))?;

    info!(
        "Item {} deleted by its author ({} comments, {} likes)",
        id, purged.comments, purged.likes
    );
    if !purged.image.is_empty() {
        state.storage.delete_file(&purged.image).await;
    }

    Ok(Json(SuccessResponse::new("Item deleted")))
}

/// POST /items/{id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LikeResponse>> {
    let user = actor.user_id;
    let membership = db_call(&state, move |db| {
        db.toggle_membership(MembershipSet::ItemLikes, id, user)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Item"))?;

    Ok(Json(LikeResponse {
        liked: membership.member,
        likes_count: membership.count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_all_means_no_filter() {
        assert_eq!(category_filter(None), None);
        assert_eq!(category_filter(Some("  ".into())), None);
        assert_eq!(category_filter(Some("All".into())), None);
        assert_eq!(category_filter(Some(" irezumi ".into())), Some("irezumi".into()));
    }
}
