pub mod image;
pub mod image_cache;

pub use image::{DecodedImage, ImageFormat};
pub use image_cache::{CacheStats, HttpImageLoader, ImageCache, ImageCacheConfig, ImageLoader};
