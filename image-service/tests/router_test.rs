mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{test_config, InMemoryImageService};
use image_service::startup::{build_router, AppState};
use service_core::response::ApiResponse;
use std::sync::Arc;
use tower::util::ServiceExt;

fn app_with_root_prefix() -> (axum::Router, Arc<InMemoryImageService>) {
    let images = Arc::new(InMemoryImageService::new("", &[1]));
    let state = AppState {
        config: test_config(""),
        images: images.clone(),
    };
    (build_router(state), images)
}

async fn envelope(response: axum::response::Response) -> ApiResponse {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("body should be an ApiResponse")
}

#[tokio::test]
async fn routes_mount_at_root_without_prefix() {
    let (app, images) = app_with_root_prefix();
    let id = images.insert("shoe.png", "image/png", Some(vec![5; 4]));

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/images/image/{}/delete", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = envelope(response).await;
    assert_eq!(body.message, "Deleted successfully!");
    assert!(images.get(id).is_none());
}

#[tokio::test]
async fn hand_built_multipart_upload_is_accepted() {
    let (app, images) = app_with_root_prefix();

    let boundary = "X-IMAGE-BOUNDARY";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"productId\"\r\n\r\n\
         1\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"tiny.gif\"\r\n\
         Content-Type: image/gif\r\n\r\n\
         GIF89a\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/images/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = envelope(response).await;
    assert_eq!(body.message, "Upload Success");
    let data = body.data.unwrap();
    assert_eq!(data[0]["file_name"], "tiny.gif");
    assert_eq!(data[0]["download_url"], "/images/image/download/1");

    let stored = images.get(1).unwrap();
    assert_eq!(stored.file_type, "image/gif");
    assert_eq!(stored.image, Some(b"GIF89a".to_vec()));
}

#[tokio::test]
async fn prefixed_routes_are_not_served_at_root() {
    let images = Arc::new(InMemoryImageService::new("/api/v1", &[1]));
    let app = build_router(AppState {
        config: test_config("/api/v1"),
        images,
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/images/image/1/delete")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = envelope(response).await;
    assert!(body.message.contains("No route for"));
}
