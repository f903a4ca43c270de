// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading scene assets.
///
/// Asset failures never abort a scene build: `Scene` logs them and keeps
/// whatever did load, so these only surface from the loader entry points.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OBJ file: {0}")]
    ObjLoad(#[from] tobj::LoadError),

    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("HDR image {path} has zero extent ({width}x{height})")]
    EmptyHdr {
        path: PathBuf,
        width: u32,
        height: u32,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
