//! Services module for image-service.

pub mod database;
pub mod images;
pub mod metrics;

pub use database::Database;
pub use images::{ImageService, PgImageService};
pub use metrics::{get_metrics, init_metrics};
