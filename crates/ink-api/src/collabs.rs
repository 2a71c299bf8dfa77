use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use ink_db::MembershipSet;
use ink_db::collabs::CollabFilter;
use ink_db::models::NewCollab;
use ink_types::api::{
    CollabQuery, CollabView, CreateCollabRequest, LikeResponse, ParticipateResponse,
    SuccessResponse,
};
use ink_types::models::{ActorContext, CollabStatus, Membership, Role, parse_date};

use crate::error::{ApiError, ApiResult};
use crate::middleware::Viewer;
use crate::views::collab_views;
use crate::{AppState, db_call};

pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// GET /collabs?status&style&search - newest first. The status filter applies
/// to the derived status; unknown values are ignored.
pub async fn list_collabs(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<CollabQuery>,
) -> ApiResult<Json<Vec<CollabView>>> {
    let status: Option<CollabStatus> = query.status.as_deref().and_then(|s| s.parse().ok());
    let filter = CollabFilter {
        style: query.style.filter(|s| !s.eq_ignore_ascii_case("all")),
        search: query.search,
    };
    let viewer = viewer.user_id();
    let now = Utc::now();

    let mut views = db_call(&state, move |db| {
        let rows = db.list_collabs(&filter)?;
        collab_views(db, rows, viewer, now)
    })
    .await?;

    if let Some(status) = status {
        views.retain(|c| c.derived_status == status);
    }
    Ok(Json(views))
}

/// GET /collabs/{id}
pub async fn get_collab(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CollabView>> {
    let viewer = viewer.user_id();
    let view = db_call(&state, move |db| {
        let Some(row) = db.get_collab(id)? else {
            return Ok(None);
        };
        Ok(collab_views(db, vec![row], viewer, Utc::now())?.pop())
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Collab"))?;

    Ok(Json(view))
}

/// POST /collabs - artists only.
pub async fn create_collab(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(req): Json<CreateCollabRequest>,
) -> ApiResult<(StatusCode, Json<CollabView>)> {
    if actor.role != Role::Artist {
        return Err(ApiError::Forbidden("Only artists can create collabs".into()));
    }

    let new = new_collab(actor.user_id, req)?;
    let author = actor.user_id;
    let view = db_call(&state, move |db| {
        let row = db.create_collab(&new)?;
        Ok(collab_views(db, vec![row], Some(author), Utc::now())?.pop())
    })
    .await?
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Collab view missing after insert")))?;

    info!("{} opened collab {}", actor.artist_name, view.id);
    Ok((StatusCode::CREATED, Json(view)))
}

fn new_collab(author_id: Uuid, req: CreateCollabRequest) -> ApiResult<NewCollab> {
    let title = req.title.unwrap_or_default().trim().to_string();
    if title.is_empty() {
        return Err(ApiError::validation("Title is required"));
    }

    let description = req.description.unwrap_or_default().trim().to_string();
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ApiError::validation("Description cannot exceed 2000 characters"));
    }

    Ok(NewCollab {
        author_id,
        title,
        description,
        styles: req.styles.map(|s| s.into_tags()).unwrap_or_default(),
        location: req.location.unwrap_or_default().trim().to_string(),
        start_date: date_field(req.start_date.as_deref(), "start date")?,
        end_date: date_field(req.end_date.as_deref(), "end date")?,
    })
}

fn date_field(raw: Option<&str>, name: &str) -> ApiResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => parse_date(value)
            .map(Some)
            .ok_or_else(|| ApiError::Validation(format!("Invalid {}: {}", name, value))),
    }
}

/// POST /collabs/{id}/participate - artists only.
pub async fn toggle_participate(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ParticipateResponse>> {
    if actor.role != Role::Artist {
        return Err(ApiError::Forbidden("Only artists can participate in collabs".into()));
    }

    let membership = toggle(&state, MembershipSet::CollabParticipants, id, actor.user_id).await?;
    Ok(Json(ParticipateResponse {
        participating: membership.member,
        participants_count: membership.count,
    }))
}

/// POST /collabs/{id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LikeResponse>> {
    let membership = toggle(&state, MembershipSet::CollabLikes, id, actor.user_id).await?;
    Ok(Json(LikeResponse {
        liked: membership.member,
        likes_count: membership.count,
    }))
}

async fn toggle(
    state: &AppState,
    set: MembershipSet,
    collab: Uuid,
    user: Uuid,
) -> ApiResult<Membership> {
    db_call(state, move |db| db.toggle_membership(set, collab, user))
        .await?
        .ok_or_else(|| ApiError::not_found("Collab"))
}

/// DELETE /collabs/{id} - author or admin.
pub async fn delete_collab(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    let collab = db_call(&state, move |db| db.get_collab(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Collab"))?;

    if collab.author.id != actor.user_id && !actor.is_admin() {
        return Err(ApiError::Forbidden("You do not have permission to delete this collab".into()));
    }

    if !db_call(&state, move |db| db.delete_collab(id)).await? {
        return Err(ApiError::not_found("Collab"));
    }

    info!("Collab {} deleted by {}", id, actor.user_id);
    Ok(Json(SuccessResponse::new("Collab deleted")))
}
