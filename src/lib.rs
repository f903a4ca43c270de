// src/lib.rs
pub mod bounds;
pub mod bvh;
pub mod camera;
pub mod error;
pub mod hdr;
pub mod light;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod texture;

pub use bounds::Bounds3D;
pub use bvh::translator::{BvhTranslator, TranslatedNode};
pub use bvh::{BuildOptions, Bvh, BvhNode};
pub use camera::Camera;
pub use error::Error;
pub use hdr::HdrData;
pub use light::{Light, LightKind};
pub use material::Material;
pub use mesh::{Mesh, MeshInstance};
pub use scene::{RenderOptions, Scene};
pub use texture::Texture;
