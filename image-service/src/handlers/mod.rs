pub mod health;
pub mod images;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use images::{delete_image, download_image, update_image, upload_images};
