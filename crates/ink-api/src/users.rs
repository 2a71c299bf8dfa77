use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
};
use axum_extra::extract::CookieJar;
use tracing::info;
use uuid::Uuid;

use ink_db::MembershipSet;
use ink_db::items::{ItemFilter, ItemOrder};
use ink_db::models::{ArtistRow, ProfileChanges};
use ink_db::users::{ArtistFilter, ArtistOrder};
use ink_types::api::{
    ArtistProfileResponse, ArtistSummary, DeleteAccountRequest, FollowResponse, HomeResponse,
    InspireQuery, ItemView, MyInkResponse, ProfileView, SuccessResponse, UpdateAccountRequest,
};
use ink_types::models::{ActorContext, Role};

use crate::auth::{MAX_BIO_CHARS, clear_cookie, hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::forms::FormData;
use crate::items::category_filter;
use crate::middleware::Viewer;
use crate::storage::UploadKind;
use crate::views::{
    artist_summaries, artist_summary, author_summary, following_set, item_views, profile_view,
};
use crate::{AppState, db_call};

const HOME_ITEMS: u32 = 4;
const HOME_ARTISTS: u32 = 4;

/// GET / - most liked items and most followed artists.
pub async fn home(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> ApiResult<Json<HomeResponse>> {
    let viewer = viewer.user_id();
    let home = db_call(&state, move |db| {
        let popular = ItemFilter {
            order: ItemOrder::MostLiked,
            ..Default::default()
        };
        let items = db.list_items(&popular, Some(HOME_ITEMS), 0)?;

        let artists = ArtistFilter {
            exclude: viewer,
            order: ArtistOrder::Popular,
            ..Default::default()
        };
        let artists = db.list_artists(&artists, Some(HOME_ARTISTS), 0)?;

        Ok(HomeResponse {
            popular_items: item_views(db, items, viewer)?,
            popular_artists: artist_summaries(db, artists, viewer)?,
        })
    })
    .await?;

    Ok(Json(home))
}

/// GET /artists - every artist but the viewer, most followed first.
pub async fn list_artists(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> ApiResult<Json<Vec<ArtistSummary>>> {
    let viewer = viewer.user_id();
    let artists = db_call(&state, move |db| {
        let filter = ArtistFilter {
            exclude: viewer,
            ..Default::default()
        };
        let rows = db.list_artists(&filter, None, 0)?;
        artist_summaries(db, rows, viewer)
    })
    .await?;

    Ok(Json(artists))
}

/// GET /artist/{id}
pub async fn get_artist(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ArtistProfileResponse>> {
    let viewer = viewer.user_id();
    let profile = db_call(&state, move |db| {
        let Some(user) = db.get_user_by_id(id)?.filter(|u| u.role == Role::Artist) else {
            return Ok(None);
        };

        let by_artist = ItemFilter {
            author: Some(id),
            ..Default::default()
        };
        let items = db.list_items(&by_artist, None, 0)?;
        let row = ArtistRow {
            user,
            followers_count: db.member_count(MembershipSet::Followers, id)? as u64,
            works_count: items.len() as u64,
        };

        let following = following_set(db, viewer)?;
        let artist = artist_summary(row, &following);
        Ok(Some(ArtistProfileResponse {
            is_following: artist.is_following,
            following_count: db.following_ids(id)?.len() as u64,
            items: item_views(db, items, viewer)?,
            artist,
        }))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Artist"))?;

    Ok(Json(profile))
}

/// POST /artist/{id}/follow
pub async fn toggle_follow(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FollowResponse>> {
    if id == actor.user_id {
        return Err(ApiError::validation("You cannot follow yourself"));
    }

    let follower = actor.user_id;
    let membership = db_call(&state, move |db| {
        db.toggle_membership(MembershipSet::Followers, id, follower)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Artist"))?;

    Ok(Json(FollowResponse {
        following: membership.member,
        followers_count: membership.count,
    }))
}

/// GET /myink - own profile, follow lists and items.
pub async fn my_ink(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
) -> ApiResult<Json<MyInkResponse>> {
    let id = actor.user_id;
    let page = db_call(&state, move |db| {
        let Some(user) = db.get_user_by_id(id)? else {
            return Ok(None);
        };

        let mine = ItemFilter {
            author: Some(id),
            ..Default::default()
        };
        let items = db.list_items(&mine, None, 0)?;

        Ok(Some(MyInkResponse {
            profile: profile_view(user),
            followers: db.followers_of(id)?.into_iter().map(author_summary).collect(),
            following: db.following_of(id)?.into_iter().map(author_summary).collect(),
            items: item_views(db, items, Some(id))?,
        }))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(page))
}

/// PUT /myink (multipart: artistName, bio, specialties, profileImage)
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    multipart: Multipart,
) -> ApiResult<Json<ProfileView>> {
    let form = FormData::read(multipart, "profileImage").await?;

    let artist_name = form.text("artistName");
    if artist_name.is_empty() {
        return Err(ApiError::validation("Artist Name is required."));
    }
    let bio = form.text("bio");
    if bio.chars().count() > MAX_BIO_CHARS {
        return Err(ApiError::validation("Bio cannot exceed 500 characters"));
    }

    let profile_image = match &form.file {
        Some(file) => Some(state.storage.save(UploadKind::Profile, file).await?),
        None => None,
    };

    let changes = ProfileChanges {
        artist_name,
        bio,
        specialties: form.list("specialties"),
        profile_image,
    };
    let id = actor.user_id;
    let user = db_call(&state, move |db| {
        if !db.update_profile(id, &changes)? {
            return Ok(None);
        }
        db.get_user_by_id(id)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(profile_view(user)))
}

/// PUT /myink/account - change email and/or password. Blank fields are ignored.
pub async fn update_account(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(req): Json<UpdateAccountRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let email = req
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    let password_hash = match req.password.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let id = actor.user_id;
    db_call(&state, move |db| {
        let Some(user) = db.get_user_by_id(id)? else {
            return Ok(Err(ApiError::not_found("User")));
        };

        let email = email.filter(|e| *e != user.email);
        if let Some(email) = &email {
            if db.get_user_by_email(email)?.is_some_and(|other| other.id != id) {
                return Ok(Err(ApiError::validation("Email is already in use")));
            }
        }

        db.update_account(id, email.as_deref(), password_hash.as_deref())?;
        Ok(Ok(()))
    })
    .await
    .map_err(ApiError::or_email_conflict)??;

    info!("User {} updated account settings", id);
    Ok(Json(SuccessResponse::new("Account updated")))
}

/// DELETE /myink - password-confirmed self-deletion. Runs the full purge and
/// ends the session.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    jar: CookieJar,
    Json(req): Json<DeleteAccountRequest>,
) -> ApiResult<(CookieJar, Json<SuccessResponse>)> {
    let password = req.password.unwrap_or_default().trim().to_string();
    if password.is_empty() {
        return Err(ApiError::validation("Please enter your password"));
    }

    let id = actor.user_id;
    let user = db_call(&state, move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if !verify_password(&password, &user.password) {
        return Err(ApiError::validation("Password does not match"));
    }

    let report = db_call(&state, move |db| db.purge_user(id))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    for image in report.item_images.iter().chain(Some(&user.profile_image)) {
        if !image.is_empty() {
            state.storage.delete_file(image).await;
        }
    }

    info!("User {} deleted their account", id);
    Ok((jar.remove(clear_cookie()), Json(SuccessResponse::new("Account deleted"))))
}

/// GET /inspire?category - items the actor has liked.
pub async fn inspire(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<InspireQuery>,
) -> ApiResult<Json<Vec<ItemView>>> {
    let id = actor.user_id;
    let filter = ItemFilter {
        category: category_filter(query.category),
        liked_by: Some(id),
        ..Default::default()
    };
    let items = db_call(&state, move |db| {
        let rows = db.list_items(&filter, None, 0)?;
        item_views(db, rows, Some(id))
    })
    .await?;

    Ok(Json(items))
}
