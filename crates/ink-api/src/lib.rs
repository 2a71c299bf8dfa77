pub mod admin;
pub mod auth;
pub mod collabs;
pub mod comments;
pub mod error;
pub mod forms;
pub mod items;
pub mod middleware;
pub mod storage;
pub mod users;
pub mod views;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;

use ink_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::middleware::{require_admin, require_auth, resolve_actor};
use crate::storage::Storage;

/// Room for a 5 MB image plus the rest of the form.
const BODY_LIMIT: usize = 8 * 1024 * 1024;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub storage: Storage,
}

/// Run a blocking store call on the blocking pool.
pub(crate) async fn db_call<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(ApiError::Internal)
}

/// Normalize a 1-based page number and return it with the row offset.
pub(crate) fn page_window(page: Option<u32>, per_page: u32) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    (page, (page - 1).saturating_mul(per_page))
}

/// The complete application router. Every request passes through
/// `resolve_actor`; protected routes additionally require a session and admin
/// routes an admin role.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(users::home))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/items", get(items::list_items))
        .route("/items/{id}", get(items::get_item))
        .route("/items/{id}/comments", get(comments::list_comments))
        .route("/artists", get(users::list_artists))
        .route("/artist/{id}", get(users::get_artist))
        .route("/collabs", get(collabs::list_collabs))
        .route("/collabs/{id}", get(collabs::get_collab));

    let protected_routes = Router::new()
        .route("/auth/signout", post(auth::signout))
        .route("/items", post(items::create_item))
        .route("/items/{id}", put(items::update_item).delete(items::delete_item))
        .route("/items/{id}/like", post(items::toggle_like))
        .route("/items/{id}/comments", post(comments::create_comment))
        .route("/comments/{id}", put(comments::update_comment).delete(comments::delete_comment))
        .route("/artist/{id}/follow", post(users::toggle_follow))
        .route(
            "/myink",
            get(users::my_ink).put(users::update_profile).delete(users::delete_account),
        )
        .route("/myink/account", put(users::update_account))
        .route("/inspire", get(users::inspire))
        .route("/collabs", post(collabs::create_collab))
        .route("/collabs/{id}", delete(collabs::delete_collab))
        .route("/collabs/{id}/participate", post(collabs::toggle_participate))
        .route("/collabs/{id}/like", post(collabs::toggle_like))
        .layer(from_fn(require_auth));

    // require_auth is the outer layer, so it runs before require_admin
    let admin_routes = Router::new()
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/artists", get(admin::list_artists))
        .route("/admin/artists/{id}/verify", post(admin::toggle_verification))
        .route("/admin/artists/{id}", delete(admin::delete_artist))
        .route("/admin/items", get(admin::list_items))
        .route("/admin/items/{id}", delete(admin::delete_item))
        .route("/admin/comments", get(admin::list_comments))
        .route("/admin/comments/{id}", delete(admin::delete_comment))
        .layer(from_fn(require_admin))
        .layer(from_fn(require_auth));

    let uploads = ServeDir::new(state.storage.dir());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .nest_service("/uploads", uploads)
        .layer(from_fn_with_state(state.clone(), resolve_actor))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_clamps_to_first_page() {
        assert_eq!(page_window(None, 12), (1, 0));
        assert_eq!(page_window(Some(0), 12), (1, 0));
        assert_eq!(page_window(Some(3), 20), (3, 40));
    }
}
