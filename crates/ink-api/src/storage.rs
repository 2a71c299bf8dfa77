use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// 5 MB upload limit for images
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Public URL prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads/";

const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];
const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Only image files are allowed (jpeg, jpg, png, gif, webp)")]
    NotAnImage,

    #[error("Image exceeds the 5 MB limit")]
    TooLarge,

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Profile,
    Artwork,
}

impl UploadKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Artwork => "artwork",
        }
    }
}

/// An image received in a multipart form, validated but not yet written.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub extension: String,
    pub data: Bytes,
}

/// Check the name, MIME type and size of an upload. Returns the lowercased
/// extension to store the file under.
pub fn validate_image(file_name: &str, content_type: &str, len: usize) -> Result<String, UploadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or(UploadError::NotAnImage)?;

    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadError::NotAnImage);
    }
    if !IMAGE_MIME_TYPES.contains(&content_type.to_ascii_lowercase().as_str()) {
        return Err(UploadError::NotAnImage);
    }
    if len > MAX_IMAGE_BYTES {
        return Err(UploadError::TooLarge);
    }

    Ok(extension)
}

/// Writes uploaded images to a flat directory served at `/uploads`.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store an image and return its public path, e.g.
    /// `/uploads/artwork-1718000000000-123456789.png`.
    pub async fn save(&self, kind: UploadKind, file: &UploadedFile) -> Result<String, UploadError> {
        let name = format!(
            "{}-{}-{}.{}",
            kind.prefix(),
            chrono::Utc::now().timestamp_millis(),
            rand::random_range(0..1_000_000_000u32),
            file.extension
        );
        fs::write(self.dir.join(&name), &file.data).await?;
        info!("Stored {} ({} bytes)", name, file.data.len());
        Ok(format!("{}{}", PUBLIC_PREFIX, name))
    }

    /// Remove a previously stored file by its public path. Failures are logged
    /// and otherwise ignored.
    pub async fn delete_file(&self, public_path: &str) {
        let Some(name) = stored_name(public_path) else {
            return;
        };

        match fs::remove_file(self.dir.join(name)).await {
            Ok(()) => info!("Deleted upload {}", name),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {} already gone", name);
            }
            Err(e) => warn!("Failed to delete upload {}: {}", name, e),
        }
    }
}

/// File name inside the upload directory for a public path, if it is one of ours.
fn stored_name(public_path: &str) -> Option<&str> {
    let name = public_path.strip_prefix(PUBLIC_PREFIX)?;
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return None;
    }
    Some(name)
}
