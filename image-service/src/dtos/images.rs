use crate::models::NewImage;
use serde::{Deserialize, Serialize};

/// Per-file metadata returned from an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDto {
    pub id: i64,
    pub file_name: String,
    pub download_url: String,
}

impl ImageDto {
    pub fn new(id: i64, file_name: impl Into<String>, api_prefix: &str) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            download_url: download_url(api_prefix, id),
        }
    }
}

/// Route at which an image's payload can be fetched.
pub fn download_url(api_prefix: &str, image_id: i64) -> String {
    format!("{}/images/image/download/{}", api_prefix, image_id)
}

/// Parsed `POST /images/upload` form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub product_id: Option<String>,
    pub files: Vec<NewImage>,
}
