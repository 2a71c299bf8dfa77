use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use ink_types::api::{CommentRequest, CommentView, SuccessResponse};
use ink_types::models::ActorContext;

use crate::error::{ApiError, ApiResult};
use crate::views::comment_view;
use crate::{AppState, db_call};

pub const MAX_COMMENT_CHARS: usize = 500;

fn comment_content(req: CommentRequest) -> ApiResult<String> {
    let content = req.content.unwrap_or_default().trim().to_string();
    if content.is_empty() {
        return Err(ApiError::validation("Please enter a comment"));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiError::validation("Comments cannot exceed 500 characters"));
    }
    Ok(content)
}

/// GET /items/{id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CommentView>>> {
    let comments = db_call(&state, move |db| {
        if db.get_item(item_id)?.is_none() {
            return Ok(None);
        }
        Ok(Some(db.comments_for_item(item_id)?))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Item"))?;

    Ok(Json(comments.into_iter().map(comment_view).collect()))
}

/// POST /items/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(item_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentView>)> {
    let content = comment_content(req)?;

    let author = actor.user_id;
    let comment = db_call(&state, move |db| {
        if db.get_item(item_id)?.is_none() {
            return Ok(None);
        }
        db.create_comment(item_id, author, &content).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Item"))?;

    Ok((StatusCode::CREATED, Json(comment_view(comment))))
}

/// PUT /comments/{id} - author only.
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<Json<CommentView>> {
    let content = comment_content(req)?;

    ensure_comment_author(&state, id, actor.user_id, "edit").await?;

    let comment = db_call(&state, move |db| db.update_comment(id, &content))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    Ok(Json(comment_view(comment)))
}

/// DELETE /comments/{id} - author only.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    ensure_comment_author(&state, id, actor.user_id, "delete").await?;

    if !db_call(&state, move |db| db.delete_comment(id)).await? {
        return Err(ApiError::not_found("Comment"));
    }
    Ok(Json(SuccessResponse::new("Comment deleted")))
}

async fn ensure_comment_author(state: &AppState, id: Uuid, user: Uuid, action: &str) -> ApiResult<()> {
    let comment = db_call(state, move |db| db.get_comment(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    if comment.author.id != user {
        return Err(ApiError::Forbidden(format!(
            "You do not have permission to {} this comment",
            action
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(content: Option<&str>) -> CommentRequest {
        CommentRequest {
            content: content.map(str::to_string),
        }
    }

    #[test]
    fn content_is_trimmed_and_required() {
        assert_eq!(comment_content(req(Some("  nice lines "))).unwrap(), "nice lines");
        assert!(comment_content(req(Some("   "))).is_err());
        assert!(comment_content(req(None)).is_err());
    }

    #[test]
    fn content_length_is_capped() {
        assert!(comment_content(req(Some(&"a".repeat(500)))).is_ok());
        assert!(comment_content(req(Some(&"a".repeat(501)))).is_err());
    }
}
