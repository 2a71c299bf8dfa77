use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::storage::UploadError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    /// Reclassify a store failure caused by a taken email as a validation error.
    pub(crate) fn or_email_conflict(self) -> Self {
        match self {
            ApiError::Internal(e) if ink_db::is_duplicate_email(&e) => {
                ApiError::validation("Email is already in use")
            }
            other => other,
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::NotAnImage => ApiError::Validation(e.to_string()),
            UploadError::TooLarge => ApiError::PayloadTooLarge(e.to_string()),
            UploadError::Io(io) => ApiError::Internal(io.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                // Details stay in the log
                error!("Request failed: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_variants() {
        assert_eq!(ApiError::not_found("Item").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(UploadError::TooLarge).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::from(UploadError::NotAnImage).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = ApiError::Internal(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn taken_email_becomes_validation() {
        use ink_db::Database;
        use ink_db::models::NewUser;
        use ink_types::models::Role;

        let db = Database::open_in_memory().unwrap();
        let new = NewUser {
            email: "mina@ink.test".into(),
            password_hash: "hash".into(),
            artist_name: "Mina".into(),
            bio: String::new(),
            specialties: vec![],
            profile_image: String::new(),
            role: Role::Artist,
            verified: false,
        };
        db.create_user(&new).unwrap();
        let err = ApiError::Internal(db.create_user(&new).unwrap_err()).or_email_conflict();

        assert!(matches!(&err, ApiError::Validation(msg) if msg == "Email is already in use"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let other = ApiError::Internal(anyhow::anyhow!("disk on fire")).or_email_conflict();
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_message() {
        assert_eq!(ApiError::not_found("Collab").to_string(), "Collab not found");
    }
}
