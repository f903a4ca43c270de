// src/mesh.rs
use std::path::Path;

use glam::{vec3, vec4, Mat4, Vec4};

use crate::bounds::Bounds3D;
use crate::bvh::{BuildOptions, Bvh};
use crate::error::Result;

/// Triangle mesh with interleaved shading attributes and its bottom-level
/// BVH.
///
/// Attribute layout follows the GPU packing: `vertices_uvx` holds position
/// xyz + U, `normals_uvy` holds normal xyz + V, one entry per triangle
/// corner, so triangle `t` owns entries `3t..3t + 3`. The soup is never
/// mutated after `build_bvh`.
pub struct Mesh {
    /// Load path, used by the scene to de-duplicate re-adds.
    pub name: String,
    pub vertices_uvx: Vec<Vec4>,
    pub normals_uvy: Vec<Vec4>,
    bvh: Option<Bvh>,
}

impl Mesh {
    /// Builds a mesh directly from attribute streams, for procedural
    /// geometry. Both streams must hold one entry per triangle corner.
    pub fn from_soup(
        name: impl Into<String>,
        vertices_uvx: Vec<Vec4>,
        normals_uvy: Vec<Vec4>,
    ) -> Mesh {
        debug_assert_eq!(vertices_uvx.len(), normals_uvy.len());
        debug_assert_eq!(vertices_uvx.len() % 3, 0);
        Mesh {
            name: name.into(),
            vertices_uvx,
            normals_uvy,
            bvh: None,
        }
    }

    /// Loads a Wavefront OBJ, triangulated, with every shape merged into one
    /// triangle soup. Missing normals or UVs are zero-filled.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Mesh> {
        let path = path.as_ref();
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )?;

        let mut mesh = Mesh {
            name: path.to_string_lossy().into_owned(),
            vertices_uvx: Vec::new(),
            normals_uvy: Vec::new(),
            bvh: None,
        };

        for model in &models {
            let m = &model.mesh;
            for &idx in &m.indices {
                let i = idx as usize;
                let px = m.positions[i * 3];
                let py = m.positions[i * 3 + 1];
                let pz = m.positions[i * 3 + 2];
                let nx = m.normals.get(i * 3).copied().unwrap_or(0.0);
                let ny = m.normals.get(i * 3 + 1).copied().unwrap_or(0.0);
                let nz = m.normals.get(i * 3 + 2).copied().unwrap_or(0.0);
                let u = m.texcoords.get(i * 2).copied().unwrap_or(0.0);
                let v = m.texcoords.get(i * 2 + 1).copied().unwrap_or(0.0);
                mesh.vertices_uvx.push(vec4(px, py, pz, u));
                mesh.normals_uvy.push(vec4(nx, ny, nz, v));
            }
        }

        Ok(mesh)
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices_uvx.len() / 3
    }

    /// Builds the bottom-level BVH over this mesh's triangles. A second call
    /// is a no-op; a mesh with zero triangles yields a degenerate tree.
    pub fn build_bvh(&mut self) {
        if self.bvh.is_some() {
            return;
        }
        let tri_bounds: Vec<Bounds3D> = (0..self.triangle_count())
            .map(|t| self.triangle_bounds(t))
            .collect();
        self.bvh = Some(Bvh::build(&tri_bounds, &BuildOptions::default()));
    }

    pub fn bvh(&self) -> Option<&Bvh> {
        self.bvh.as_ref()
    }

    fn triangle_bounds(&self, tri: usize) -> Bounds3D {
        let v0 = self.vertices_uvx[tri * 3].truncate();
        let v1 = self.vertices_uvx[tri * 3 + 1].truncate();
        let v2 = self.vertices_uvx[tri * 3 + 2].truncate();

        let min = v0.min(v1).min(v2);
        let max = v0.max(v1).max(v2);

        // Pad axes where the triangle is flat so the box keeps volume.
        let size = max - min;
        let eps = 1e-5;
        let pad = vec3(
            if size.x < eps { eps } else { 0.0 },
            if size.y < eps { eps } else { 0.0 },
            if size.z < eps { eps } else { 0.0 },
        );

        Bounds3D::new(min - pad * 0.5, max + pad * 0.5)
    }
}

/// A placement of a shared mesh in the world. Holds indices, never
/// references, so instances stay trivially copyable and cycle-free.
#[derive(Clone, Debug)]
pub struct MeshInstance {
    pub name: String,
    pub mesh_id: usize,
    pub material_id: usize,
    pub transform: Mat4,
}

impl MeshInstance {
    pub fn new(name: impl Into<String>, mesh_id: usize, material_id: usize, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            mesh_id,
            material_id,
            transform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const TWO_TRI_OBJ: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
v 0.0 0.0 1.0
vt 0.0 0.0
vn 0.0 0.0 1.0
f 1/1/1 2/1/1 3/1/1
f 1/1/1 2/1/1 4/1/1
";

    pub(crate) fn write_obj(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".obj")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_expanded_triangle_soup() {
        let file = write_obj(TWO_TRI_OBJ);
        let mesh = Mesh::load_from_file(file.path()).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertices_uvx.len(), 6);
        assert_eq!(mesh.normals_uvy.len(), 6);
        // First corner of the first triangle is the origin with U = 0.
        assert_eq!(mesh.vertices_uvx[0], vec4(0.0, 0.0, 0.0, 0.0));
        assert_eq!(mesh.normals_uvy[0].truncate(), vec3(0.0, 0.0, 1.0));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Mesh::load_from_file("does/not/exist.obj").is_err());
    }

    #[test]
    fn bvh_bounds_cover_all_triangles() {
        let file = write_obj(TWO_TRI_OBJ);
        let mut mesh = Mesh::load_from_file(file.path()).unwrap();
        mesh.build_bvh();
        let bounds = mesh.bvh().unwrap().bounds();
        assert!(bounds.min.cmple(vec3(0.0, 0.0, 0.0)).all());
        assert!(bounds.max.cmpge(vec3(1.0, 1.0, 1.0)).all());
    }

    #[test]
    fn empty_mesh_builds_degenerate_bvh() {
        let mut mesh = Mesh::from_soup("empty", Vec::new(), Vec::new());
        mesh.build_bvh();
        let bvh = mesh.bvh().unwrap();
        assert_eq!(bvh.node_count(), 1);
        assert_eq!(bvh.num_indices(), 0);
    }
}
