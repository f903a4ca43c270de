// src/bounds.rs
use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
///
/// Starts inverted (min = +inf, max = -inf) so that growing an empty box by
/// any point or box yields that point/box. Once at least one primitive has
/// been added, `min <= max` holds componentwise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds3D {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds3D {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds3D {
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Bounds3D) -> Bounds3D {
        Bounds3D {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Surface area, used as the SAH cost metric.
    pub fn surface_area(&self) -> f32 {
        let d = self.max - self.min;
        if d.x < 0.0 || d.y < 0.0 || d.z < 0.0 {
            0.0
        } else {
            2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Bounds of this box under an affine transform.
    ///
    /// Scales the box extremes along each basis column of the matrix and sums
    /// the componentwise minima/maxima plus the translation. Equivalent to
    /// transforming all 8 corners and enclosing them, without enumerating
    /// the corners.
    pub fn transform(&self, matrix: &Mat4) -> Bounds3D {
        let right = matrix.x_axis.truncate();
        let up = matrix.y_axis.truncate();
        let forward = matrix.z_axis.truncate();
        let translation = matrix.w_axis.truncate();

        let xa = right * self.min.x;
        let xb = right * self.max.x;
        let ya = up * self.min.y;
        let yb = up * self.max.y;
        let za = forward * self.min.z;
        let zb = forward * self.max.z;

        Bounds3D {
            min: xa.min(xb) + ya.min(yb) + za.min(zb) + translation,
            max: xa.max(xb) + ya.max(yb) + za.max(zb) + translation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{vec3, Quat};

    fn corners(b: &Bounds3D) -> [Vec3; 8] {
        let (mn, mx) = (b.min, b.max);
        [
            vec3(mn.x, mn.y, mn.z),
            vec3(mx.x, mn.y, mn.z),
            vec3(mn.x, mx.y, mn.z),
            vec3(mx.x, mx.y, mn.z),
            vec3(mn.x, mn.y, mx.z),
            vec3(mx.x, mn.y, mx.z),
            vec3(mn.x, mx.y, mx.z),
            vec3(mx.x, mx.y, mx.z),
        ]
    }

    fn transform_by_corners(b: &Bounds3D, m: &Mat4) -> Bounds3D {
        let mut out = Bounds3D::empty();
        for c in corners(b) {
            out.grow(m.transform_point3(c));
        }
        out
    }

    #[test]
    fn empty_grows_to_point() {
        let mut b = Bounds3D::empty();
        b.grow(vec3(1.0, -2.0, 3.0));
        assert_eq!(b.min, vec3(1.0, -2.0, 3.0));
        assert_eq!(b.max, vec3(1.0, -2.0, 3.0));
    }

    #[test]
    fn union_is_commutative() {
        let a = Bounds3D::new(vec3(-1.0, 0.0, 0.0), vec3(1.0, 1.0, 1.0));
        let b = Bounds3D::new(vec3(0.0, -2.0, 0.5), vec3(3.0, 0.5, 2.0));
        assert_eq!(a.union(&b), b.union(&a));
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn transform_matches_corner_enumeration() {
        let b = Bounds3D::new(vec3(-1.0, -0.5, 2.0), vec3(1.5, 2.0, 3.0));
        let matrices = [
            Mat4::IDENTITY,
            Mat4::from_translation(vec3(5.0, -3.0, 1.0)),
            Mat4::from_scale(vec3(2.0, 0.5, -1.0)),
            Mat4::from_scale_rotation_translation(
                vec3(1.5, 2.0, 0.75),
                Quat::from_euler(glam::EulerRot::XYZ, 0.4, 1.1, -0.7),
                vec3(-2.0, 4.0, 9.0),
            ),
        ];
        for m in &matrices {
            let fast = b.transform(m);
            let slow = transform_by_corners(&b, m);
            assert!(fast.min.abs_diff_eq(slow.min, 1e-4), "{fast:?} vs {slow:?}");
            assert!(fast.max.abs_diff_eq(slow.max, 1e-4), "{fast:?} vs {slow:?}");
        }
    }

    #[test]
    fn degenerate_box_has_zero_area() {
        assert_eq!(Bounds3D::empty().surface_area(), 0.0);
        let flat = Bounds3D::new(Vec3::ZERO, vec3(1.0, 1.0, 0.0));
        assert_eq!(flat.surface_area(), 2.0);
    }
}
