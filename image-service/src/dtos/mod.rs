pub mod images;

pub use images::{download_url, ImageDto, UploadForm};
