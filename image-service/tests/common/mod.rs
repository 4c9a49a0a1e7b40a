//! Test helpers for image-service integration tests.
//!
//! `TestApp` runs the real router on a random port over an in-memory
//! `ImageService`, so the HTTP contract can be exercised without PostgreSQL.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use image_service::config::{ApiConfig, DatabaseConfig, ImageConfig};
use image_service::dtos::ImageDto;
use image_service::models::{Image, NewImage};
use image_service::services::images::{image_not_found, product_not_found};
use image_service::services::ImageService;
use image_service::startup::Application;
use reqwest::multipart;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const API_PREFIX: &str = "/api/v1";
pub const TEST_PRODUCT_ID: i64 = 1;

#[derive(Default)]
struct Store {
    next_id: i64,
    products: HashSet<i64>,
    images: BTreeMap<i64, Image>,
}

/// `ImageService` kept in memory, with switches for simulating outages.
pub struct InMemoryImageService {
    store: Mutex<Store>,
    api_prefix: String,
    save_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryImageService {
    pub fn new(api_prefix: &str, products: &[i64]) -> Self {
        let store = Store {
            products: products.iter().copied().collect(),
            ..Store::default()
        };
        Self {
            store: Mutex::new(store),
            api_prefix: api_prefix.to_string(),
            save_calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of times `save_images` has been invoked.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store an image row directly, bypassing upload. Returns its id.
    pub fn insert(&self, file_name: &str, file_type: &str, payload: Option<Vec<u8>>) -> i64 {
        let mut store = self.store.lock().unwrap();
        store.next_id += 1;
        let id = store.next_id;
        let now = Utc::now();
        store.images.insert(
            id,
            Image {
                id,
                file_name: file_name.to_string(),
                file_type: file_type.to_string(),
                image: payload,
                product_id: TEST_PRODUCT_ID,
                created_utc: now,
                updated_utc: now,
            },
        );
        id
    }

    pub fn get(&self, image_id: i64) -> Option<Image> {
        self.store.lock().unwrap().images.get(&image_id).cloned()
    }

    pub fn image_count(&self) -> usize {
        self.store.lock().unwrap().images.len()
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "connection refused"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageService for InMemoryImageService {
    async fn save_images(
        &self,
        product_id: i64,
        files: Vec<NewImage>,
    ) -> Result<Vec<ImageDto>, AppError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut store = self.store.lock().unwrap();
        if !store.products.contains(&product_id) {
            return Err(product_not_found(product_id));
        }

        let mut saved = Vec::with_capacity(files.len());
        for file in files {
            store.next_id += 1;
            let id = store.next_id;
            let now = Utc::now();
            saved.push(ImageDto::new(id, file.file_name.clone(), &self.api_prefix));
            store.images.insert(
                id,
                Image {
                    id,
                    file_name: file.file_name,
                    file_type: file.file_type,
                    image: Some(file.data),
                    product_id,
                    created_utc: now,
                    updated_utc: now,
                },
            );
        }
        Ok(saved)
    }

    async fn get_image_by_id(&self, image_id: i64) -> Result<Image, AppError> {
        self.check_available()?;
        self.get(image_id).ok_or_else(|| image_not_found(image_id))
    }

    async fn update_image(&self, file: NewImage, image_id: i64) -> Result<(), AppError> {
        self.check_available()?;
        let mut store = self.store.lock().unwrap();
        let image = store
            .images
            .get_mut(&image_id)
            .ok_or_else(|| image_not_found(image_id))?;
        image.file_name = file.file_name;
        image.file_type = file.file_type;
        image.image = Some(file.data);
        image.updated_utc = Utc::now();
        Ok(())
    }

    async fn delete_image_by_id(&self, image_id: i64) -> Result<(), AppError> {
        self.check_available()?;
        self.store
            .lock()
            .unwrap()
            .images
            .remove(&image_id)
            .map(|_| ())
            .ok_or_else(|| image_not_found(image_id))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.check_available()
    }
}

pub fn test_config(prefix: &str) -> ImageConfig {
    ImageConfig {
        common: CoreConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
        },
        service_name: "image-service-test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://localhost/unused".to_string(),
            max_connections: 1,
            min_connections: 0,
        },
        api: ApiConfig {
            prefix: prefix.to_string(),
            max_upload_bytes: 1024 * 1024,
        },
    }
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub prefix: String,
    pub images: Arc<InMemoryImageService>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        Self::spawn_with_prefix(API_PREFIX).await
    }

    pub async fn spawn_with_prefix(prefix: &str) -> Self {
        let images = Arc::new(InMemoryImageService::new(prefix, &[TEST_PRODUCT_ID]));

        let app = Application::build_with_service(test_config(prefix), images.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            prefix: prefix.to_string(),
            images,
            client,
        }
    }

    /// Absolute URL for a path under the API prefix.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.address, self.prefix, path)
    }

    /// POST a multipart upload. `files` are `(file name, mime type, bytes)`.
    pub async fn upload(
        &self,
        product_id: Option<&str>,
        files: Vec<(&str, &str, Vec<u8>)>,
    ) -> reqwest::Response {
        let mut form = multipart::Form::new();
        if let Some(product_id) = product_id {
            form = form.text("productId", product_id.to_string());
        }
        for (name, mime, data) in files {
            form = form.part("files", file_part(name, mime, data));
        }

        self.client
            .post(self.api_url("/images/upload"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn download(&self, image_id: impl std::fmt::Display) -> reqwest::Response {
        self.client
            .get(self.api_url(&format!("/images/image/download/{}", image_id)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn update(
        &self,
        image_id: impl std::fmt::Display,
        file: Option<(&str, &str, Vec<u8>)>,
    ) -> reqwest::Response {
        let mut form = multipart::Form::new();
        if let Some((name, mime, data)) = file {
            form = form.part("file", file_part(name, mime, data));
        } else {
            form = form.text("note", "no file attached");
        }

        self.client
            .put(self.api_url(&format!("/images/image/{}/update", image_id)))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, image_id: impl std::fmt::Display) -> reqwest::Response {
        self.client
            .delete(self.api_url(&format!("/images/image/{}/delete", image_id)))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

pub fn file_part(name: &str, mime: &str, data: Vec<u8>) -> multipart::Part {
    multipart::Part::bytes(data)
        .file_name(name.to_string())
        .mime_str(mime)
        .unwrap()
}

/// Assert the `{message, data}` envelope and return it.
pub async fn api_body(response: reqwest::Response) -> serde_json::Value {
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert!(
        body["message"].as_str().is_some_and(|m| !m.is_empty()),
        "missing message in {}",
        body
    );
    assert!(body.get("data").is_some(), "missing data in {}", body);
    body
}
