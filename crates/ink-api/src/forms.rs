use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use ink_types::models::normalize_tags;

use crate::error::{ApiError, ApiResult};
use crate::storage::{UploadedFile, validate_image};

/// A multipart form read into memory: text fields by name, plus at most one
/// image from the named file field.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    pub file: Option<UploadedFile>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart, file_field: &str) -> ApiResult<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == file_field && field.file_name().is_some() {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;

                // An empty file part means no file was chosen
                if data.is_empty() {
                    continue;
                }

                let extension = validate_image(&file_name, &content_type, data.len())?;
                form.file = Some(UploadedFile { extension, data });
                continue;
            }

            // `category[]` style names collapse onto `category`
            let name = name.trim_end_matches("[]").to_string();
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.entry(name).or_default().push(value);
        }

        Ok(form)
    }

    /// First value of a text field, trimmed. Missing fields read as empty.
    pub fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// All values of a repeated field as a tag list. A single comma-separated
    /// value is split.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .map(|values| normalize_tags(values))
            .unwrap_or_default()
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the request size limit".into())
    } else {
        ApiError::Validation(format!("Malformed form data: {}", e.body_text()))
    }
}
