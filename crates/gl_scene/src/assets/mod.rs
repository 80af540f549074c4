//! Asset loading: OBJ meshes and texture images
//!
//! Asset-folder resolution is left to the caller; every loader takes the final
//! path and reports a missing file as [`AssetError::ResourceNotFound`] carrying
//! the path it tried.

pub mod image_loader;
pub mod obj_loader;

pub use image_loader::ImageData;
pub use obj_loader::ObjLoader;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while reading assets from disk
#[derive(Error, Debug)]
pub enum AssetError {
    /// The file does not exist
    #[error("resource not found: {}", path.display())]
    ResourceNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// The file exists but could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file could not be decoded
    #[error("failed to decode {}: {message}", path.display())]
    Decode {
        /// Path that was attempted
        path: PathBuf,
        /// Decoder message
        message: String,
    },
}

impl AssetError {
    /// Map an IO error for `path`, turning `NotFound` into [`AssetError::ResourceNotFound`]
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::ResourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Fail with [`AssetError::ResourceNotFound`] unless `path` is an existing file
pub fn require_file(path: &Path) -> Result<(), AssetError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AssetError::ResourceNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Read a whole text file
pub fn read_to_string(path: &Path) -> Result<String, AssetError> {
    std::fs::read_to_string(path).map_err(|e| AssetError::from_io(path, e))
}
