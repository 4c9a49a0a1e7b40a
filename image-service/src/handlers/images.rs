use crate::dtos::{ImageDto, UploadForm};
use crate::models::NewImage;
use crate::services::metrics::{
    record_image_deleted, record_image_downloaded, record_image_updated, record_images_uploaded,
};
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::PathRejection,
        Multipart, Path, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use service_core::error::AppError;
use service_core::response::ApiResponse;

const UPLOAD_FAILED: &str = "Upload failed!";
const UPDATE_FAILED: &str = "Update failed!";
const DELETE_FAILED: &str = "Delete failed!";
const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

pub async fn upload_images(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;
    let form = read_upload_form(multipart).await?;

    if form.files.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No image provided")));
    }

    let product_id = parse_product_id(form.product_id.as_deref())?;
    let file_count = form.files.len();
    let total_bytes: usize = form.files.iter().map(NewImage::size).sum();

    tracing::info!(
        product_id = product_id,
        file_count = file_count,
        size = total_bytes,
        "Image upload started"
    );

    // Everything past input validation is reported as one generic failure.
    let images: Vec<ImageDto> = state
        .images
        .save_images(product_id, form.files)
        .await
        .map_err(|e| {
            tracing::error!(product_id = product_id, error = %e, "Image upload failed");
            AppError::failed_with(UPLOAD_FAILED, e.to_string())
        })?;

    record_images_uploaded(file_count, total_bytes);
    tracing::info!(
        product_id = product_id,
        file_count = images.len(),
        "Image upload completed successfully"
    );

    Ok(ApiResponse::new("Upload Success", Some(images)).into_response())
}

pub async fn download_image(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let image_id = parse_image_id(path)?;

    let image = state.images.download_image(image_id).await?;

    let content_type = HeaderValue::from_str(&image.file_type).unwrap_or_else(|_| {
        tracing::warn!(
            image_id = image_id,
            file_type = %image.file_type,
            "Stored file type is not a valid header value"
        );
        HeaderValue::from_static(DEFAULT_FILE_TYPE)
    });
    let disposition = attachment_disposition(&image.file_name);
    let payload = image.into_payload()?;

    record_image_downloaded(payload.len());
    tracing::info!(
        image_id = image_id,
        size = payload.len(),
        "Image download completed"
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload,
    )
        .into_response())
}

pub async fn update_image(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let image_id = parse_image_id(path)?;
    let multipart = multipart.map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;
    let file = read_single_file(multipart).await?;

    state
        .images
        .get_image_by_id(image_id)
        .await
        .map_err(|e| not_found_or_failed(e, UPDATE_FAILED))?;

    state
        .images
        .update_image(file, image_id)
        .await
        .map_err(|e| not_found_or_failed(e, UPDATE_FAILED))?;

    record_image_updated();

    Ok(ApiResponse::<()>::message("Updated successfully!").into_response())
}

pub async fn delete_image(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let image_id = parse_image_id(path)?;

    state
        .images
        .get_image_by_id(image_id)
        .await
        .map_err(|e| not_found_or_failed(e, DELETE_FAILED))?;

    state
        .images
        .delete_image_by_id(image_id)
        .await
        .map_err(|e| not_found_or_failed(e, DELETE_FAILED))?;

    record_image_deleted();

    Ok(ApiResponse::<()>::message("Deleted successfully!").into_response())
}

/// Keep not-found as is, collapse every other error into `message`.
fn not_found_or_failed(err: AppError, message: &'static str) -> AppError {
    if err.is_not_found() {
        err
    } else {
        tracing::error!(error = %err, "{}", message);
        AppError::failed(message)
    }
}

fn parse_image_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    path.map(|Path(id)| id).map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Invalid image id: {}", e.body_text()))
    })
}

fn parse_product_id(raw: Option<&str>) -> Result<i64, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Required field 'productId' is missing"))
        })?;

    raw.parse().map_err(|_| {
        AppError::BadRequest(anyhow::anyhow!("Invalid productId: {}", raw))
    })
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("productId") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Failed to read productId", e))?;
                form.product_id = Some(value);
            }
            Some("files") => {
                if let Some(file) = read_file(field).await? {
                    form.files.push(file);
                }
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    Ok(form)
}

async fn read_single_file(mut multipart: Multipart) -> Result<NewImage, AppError> {
    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() == Some("file") {
            if let Some(file) = read_file(field).await? {
                return Ok(file);
            }
        }
    }

    Err(AppError::BadRequest(anyhow::anyhow!("No image provided")))
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, AppError> {
    multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart field", e))
}

/// Body limit overruns become 413, every other parse failure a 400.
fn multipart_error(context: &str, err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(error = %err, "Upload rejected by body size limit");
        return AppError::PayloadTooLarge(anyhow::anyhow!(
            "Upload exceeds the maximum allowed request size"
        ));
    }
    AppError::BadRequest(anyhow::anyhow!("{}: {}", context, err.body_text()))
}

/// Read one file part. A part with neither a file name nor content is what
/// browsers send for an empty file input, and is skipped.
async fn read_file(field: Field<'_>) -> Result<Option<NewImage>, AppError> {
    let file_name = field
        .file_name()
        .filter(|name| !name.is_empty())
        .map(str::to_owned);
    let file_type = field
        .content_type()
        .unwrap_or(DEFAULT_FILE_TYPE)
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| multipart_error("Failed to read file bytes", e))?
        .to_vec();

    if file_name.is_none() && data.is_empty() {
        return Ok(None);
    }

    Ok(Some(NewImage::new(
        file_name.unwrap_or_else(|| "unnamed".to_string()),
        file_type,
        data,
    )))
}

/// `attachment; filename="..."` with quotes and backslashes escaped and
/// control characters dropped.
pub fn attachment_disposition(file_name: &str) -> HeaderValue {
    let mut escaped = String::with_capacity(file_name.len());
    for c in file_name.chars().filter(|c| !c.is_control()) {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", escaped))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
