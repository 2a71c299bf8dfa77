use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use ink_db::models::{NewUser, UserRow};
use ink_types::api::{AuthResponse, Claims, SigninRequest, SuccessResponse};
use ink_types::models::{ActorContext, Role};

use crate::error::{ApiError, ApiResult};
use crate::forms::FormData;
use crate::storage::UploadKind;
use crate::{AppState, db_call};

pub const SESSION_COOKIE: &str = "inkconnect.sid";
pub const SESSION_DAYS: i64 = 7;
pub const MAX_BIO_CHARS: usize = 500;

/// POST /auth/signup (multipart) - create an artist account and sign it in.
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> ApiResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let form = FormData::read(multipart, "profileImage").await?;

    let artist_name = form.text("artistName");
    let email = form.text("email").to_lowercase();
    let password = form.text("password");
    let bio = form.text("bio");

    if artist_name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::validation(
            "Please enter Artist Name, Email, and Password.",
        ));
    }
    if bio.chars().count() > MAX_BIO_CHARS {
        return Err(ApiError::validation("Bio cannot exceed 500 characters"));
    }

    let lookup = email.clone();
    if db_call(&state, move |db| db.get_user_by_email(&lookup))
        .await?
        .is_some()
    {
        return Err(ApiError::validation("Email is already in use"));
    }

    let password_hash = hash_password(&password)?;

    let profile_image = match &form.file {
        Some(file) => state.storage.save(UploadKind::Profile, file).await?,
        None => String::new(),
    };

    let new = NewUser {
        email,
        password_hash,
        artist_name,
        bio,
        specialties: form.list("specialties"),
        profile_image,
        role: Role::Artist,
        verified: false,
    };
    let image = new.profile_image.clone();
    let user = match db_call(&state, move |db| db.create_user(&new)).await {
        Ok(user) => user,
        Err(e) => {
            if !image.is_empty() {
                state.storage.delete_file(&image).await;
            }
            return Err(e.or_email_conflict());
        }
    };
    info!("New artist signed up: {} ({})", user.artist_name, user.id);

    let token = open_session(&state, user.id).await?;
    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(token.clone())),
        Json(auth_response(&user, token)),
    ))
}

/// POST /auth/signin
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SigninRequest>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Please enter your email and password."));
    }

    let email = req.email.clone();
    let user = db_call(&state, move |db| db.get_user_by_email(&email)).await?;

    // Same answer for unknown email and wrong password
    let user = user
        .filter(|u| verify_password(&req.password, &u.password))
        .ok_or_else(|| ApiError::Unauthenticated("Invalid email or password".into()))?;

    let token = open_session(&state, user.id).await?;
    info!("User {} signed in", user.id);

    Ok((
        jar.add(session_cookie(token.clone())),
        Json(auth_response(&user, token)),
    ))
}

/// POST /auth/signout - destroy the current session.
pub async fn signout(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<SuccessResponse>)> {
    let sid = actor.session_id;
    db_call(&state, move |db| db.delete_session(sid)).await?;

    Ok((jar.remove(clear_cookie()), Json(SuccessResponse::new("Signed out"))))
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Open a session row and sign a token pointing at it.
pub(crate) async fn open_session(state: &AppState, user_id: Uuid) -> ApiResult<String> {
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    let sid = db_call(state, move |db| db.create_session(user_id, expires_at)).await?;
    create_token(&state.jwt_secret, user_id, sid, expires_at).map_err(ApiError::Internal)
}

fn create_token(
    secret: &str,
    user_id: Uuid,
    session_id: Uuid,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        sid: session_id,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub(crate) fn clear_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

fn auth_response(user: &UserRow, token: String) -> AuthResponse {
    AuthResponse {
        user_id: user.id,
        artist_name: user.artist_name.clone(),
        role: user.role,
        token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn plaintext_hash_never_verifies() {
        assert!(!verify_password("admin123", "admin123"));
    }

    #[test]
    fn token_carries_session_id() {
        let user = Uuid::new_v4();
        let sid = Uuid::new_v4();
        let token = create_token("secret", user, sid, Utc::now() + Duration::days(1)).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, user);
        assert_eq!(data.claims.sid, sid);
    }

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = session_cookie("tok".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
