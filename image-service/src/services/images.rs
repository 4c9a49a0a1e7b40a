//! Image persistence: the `ImageService` seam and its PostgreSQL implementation.

use crate::dtos::ImageDto;
use crate::models::{Image, NewImage};
use crate::services::database::Database;
use async_trait::async_trait;
use service_core::error::AppError;
use tracing::{info, instrument};

const IMAGE_COLUMNS: &str =
    "id, file_name, file_type, image, product_id, created_utc, updated_utc";

pub fn image_not_found(image_id: i64) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No image found with id: {}", image_id))
}

pub fn product_not_found(product_id: i64) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No product found with id: {}", product_id))
}

/// Operations the HTTP handlers delegate to.
///
/// Every lookup by id reports absence as `AppError::NotFound`.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Persist `files` under `product_id`, all or nothing, returning their
    /// metadata in input order.
    async fn save_images(
        &self,
        product_id: i64,
        files: Vec<NewImage>,
    ) -> Result<Vec<ImageDto>, AppError>;

    async fn get_image_by_id(&self, image_id: i64) -> Result<Image, AppError>;

    /// Fetch an image for download. Implementations backed by a database run
    /// this inside a single read transaction.
    async fn download_image(&self, image_id: i64) -> Result<Image, AppError> {
        self.get_image_by_id(image_id).await
    }

    /// Replace the payload, file name and file type of an existing image.
    async fn update_image(&self, file: NewImage, image_id: i64) -> Result<(), AppError>;

    async fn delete_image_by_id(&self, image_id: i64) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// `ImageService` backed by the `images` and `products` tables.
#[derive(Clone)]
pub struct PgImageService {
    db: Database,
    api_prefix: String,
}

impl PgImageService {
    pub fn new(db: Database, api_prefix: impl Into<String>) -> Self {
        Self {
            db,
            api_prefix: api_prefix.into(),
        }
    }
}

#[async_trait]
impl ImageService for PgImageService {
    #[instrument(skip(self, files), fields(product_id = product_id, file_count = files.len()))]
    async fn save_images(
        &self,
        product_id: i64,
        files: Vec<NewImage>,
    ) -> Result<Vec<ImageDto>, AppError> {
        if files.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("No image provided")));
        }

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let product = sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        if product.is_none() {
            return Err(product_not_found(product_id));
        }

        let mut saved = Vec::with_capacity(files.len());
        for file in files {
            let id = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO images (file_name, file_type, image, product_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(&file.file_name)
            .bind(&file.file_type)
            .bind(&file.data)
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to save image: {}", e)))?;

            saved.push(ImageDto::new(id, file.file_name, &self.api_prefix));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit images: {}", e))
        })?;

        info!(saved = saved.len(), "Images saved");

        Ok(saved)
    }

    #[instrument(skip(self))]
    async fn get_image_by_id(&self, image_id: i64) -> Result<Image, AppError> {
        sqlx::query_as::<_, Image>(&format!(
            "SELECT {} FROM images WHERE id = $1",
            IMAGE_COLUMNS
        ))
        .bind(image_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get image: {}", e)))?
        .ok_or_else(|| image_not_found(image_id))
    }

    #[instrument(skip(self))]
    async fn download_image(&self, image_id: i64) -> Result<Image, AppError> {
        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to set transaction mode: {}", e))
            })?;

        let image = sqlx::query_as::<_, Image>(&format!(
            "SELECT {} FROM images WHERE id = $1",
            IMAGE_COLUMNS
        ))
        .bind(image_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get image: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to end transaction: {}", e))
        })?;

        image.ok_or_else(|| image_not_found(image_id))
    }

    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.size()))]
    async fn update_image(&self, file: NewImage, image_id: i64) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET file_name = $1, file_type = $2, image = $3, updated_utc = NOW()
            WHERE id = $4
            "#,
        )
        .bind(&file.file_name)
        .bind(&file.file_type)
        .bind(&file.data)
        .bind(image_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update image: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(image_not_found(image_id));
        }

        info!(image_id = image_id, "Image updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_image_by_id(&self, image_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(image_id)
            .execute(self.db.pool())
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete image: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(image_not_found(image_id));
        }

        info!(image_id = image_id, "Image deleted");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.db.health_check().await
    }
}
