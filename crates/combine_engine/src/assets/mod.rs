//! Asset loading
//!
//! Texture decoding and the block-structured map file format.

pub mod image_loader;
pub mod map_loader;

pub use image_loader::ImageData;
pub use map_loader::{MapData, MapError, MapLight, MapObject};

/// Asset loading errors
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    /// The file could not be read or decoded
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),
}
