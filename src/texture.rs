// src/texture.rs
use std::path::Path;

use crate::error::{Error, Result};

/// Decoded LDR texture, 8 bits per channel RGB, row-major.
#[derive(Debug)]
pub struct Texture {
    /// Load path, used by the scene to de-duplicate re-adds.
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub tex_data: Vec<u8>,
}

impl Texture {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Texture> {
        let path = path.as_ref();
        let reader = image::ImageReader::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image = reader.decode()?.to_rgb8();
        Ok(Texture {
            name: path.to_string_lossy().into_owned(),
            width: image.width() as usize,
            height: image.height() as usize,
            tex_data: image.into_raw(),
        })
    }
}
