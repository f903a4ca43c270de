// src/light.rs
use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    /// Parallelogram emitter spanned by `u` and `v` from `position`.
    Area,
    /// Sphere emitter of the given `radius` around `position`.
    Sphere,
}

/// Emitter description, stored by value in the scene's flat light list.
#[derive(Clone, Copy, Debug)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub emission: Vec3,
    pub u: Vec3,
    pub v: Vec3,
    pub radius: f32,
    pub area: f32,
}

impl Light {
    pub fn area(position: Vec3, u: Vec3, v: Vec3, emission: Vec3) -> Light {
        Light {
            kind: LightKind::Area,
            position,
            emission,
            u,
            v,
            radius: 0.0,
            area: u.cross(v).length(),
        }
    }

    pub fn sphere(position: Vec3, radius: f32, emission: Vec3) -> Light {
        Light {
            kind: LightKind::Sphere,
            position,
            emission,
            u: Vec3::ZERO,
            v: Vec3::ZERO,
            radius,
            area: 4.0 * std::f32::consts::PI * radius * radius,
        }
    }
}
