// src/material.rs
use glam::Vec3;

/// Surface shading parameters, stored by value in the scene's flat material
/// list and referenced by index from instances. Intentionally not
/// de-duplicated: materials are cheap and duplicate content is legitimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub albedo: Vec3,
    pub emission: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub ior: f32,
    pub transmittance: f32,
    pub albedo_tex_id: Option<usize>,
    pub metallic_roughness_tex_id: Option<usize>,
    pub normal_map_tex_id: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            emission: Vec3::ZERO,
            metallic: 0.0,
            roughness: 0.5,
            ior: 1.45,
            transmittance: 0.0,
            albedo_tex_id: None,
            metallic_roughness_tex_id: None,
            normal_map_tex_id: None,
        }
    }
}
