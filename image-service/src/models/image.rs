//! Image model.

use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::FromRow;

/// Largest payload that can be handed out as a single byte array.
pub const MAX_BLOB_LEN: u64 = i32::MAX as u64;

/// A stored product image. `image` is `None` when the row has no payload.
#[derive(Debug, Clone, FromRow)]
pub struct Image {
    pub id: i64,
    pub file_name: String,
    pub file_type: String,
    pub image: Option<Vec<u8>>,
    pub product_id: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Image {
    /// Take the payload out of the record, failing when there is none or it
    /// is too large to return in one piece.
    pub fn into_payload(self) -> Result<Vec<u8>, AppError> {
        let id = self.id;
        let payload = self.image.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Image blob is null for imageId: {}", id))
        })?;
        ensure_blob_len(id, payload.len() as u64)?;
        Ok(payload)
    }
}

/// Reject payload lengths beyond [`MAX_BLOB_LEN`] rather than truncating them.
pub fn ensure_blob_len(image_id: i64, len: u64) -> Result<usize, AppError> {
    if len > MAX_BLOB_LEN {
        return Err(AppError::InvalidArgument(anyhow::anyhow!(
            "Blob size exceeds maximum allowed size for imageId: {}",
            image_id
        )));
    }
    usize::try_from(len).map_err(|_| {
        AppError::InvalidArgument(anyhow::anyhow!(
            "Blob size exceeds maximum allowed size for imageId: {}",
            image_id
        ))
    })
}

/// An uploaded file, ready to be persisted or to replace an existing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub file_name: String,
    pub file_type: String,
    pub data: Vec<u8>,
}

impl NewImage {
    pub fn new(file_name: impl Into<String>, file_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: file_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}
