pub mod image;

pub use image::{Image, NewImage, MAX_BLOB_LEN};
