// src/camera.rs
use glam::Vec3;

/// Look-at camera. The scene owns at most one; adding another replaces it.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub look_at: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl Camera {
    pub fn new(position: Vec3, look_at: Vec3, fov_degrees: f32) -> Camera {
        let world_up = Vec3::Y;
        let forward = (look_at - position).normalize_or(Vec3::NEG_Z);
        let right = forward.cross(world_up).normalize_or(Vec3::X);
        let up = right.cross(forward);
        Camera {
            position,
            look_at,
            fov: fov_degrees.to_radians(),
            forward,
            right,
            up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn basis_is_orthonormal() {
        let cam = Camera::new(vec3(1.0, 2.0, 3.0), vec3(0.0, 0.0, 0.0), 45.0);
        assert!(cam.forward.dot(cam.right).abs() < 1e-6);
        assert!(cam.forward.dot(cam.up).abs() < 1e-6);
        assert!((cam.forward.length() - 1.0).abs() < 1e-6);
        assert!((cam.fov - 45f32.to_radians()).abs() < 1e-6);
    }
}
