// src/scene.rs
use std::path::Path;

use glam::{IVec3, Mat4, Vec4};
use log::{error, info, warn};
use rayon::prelude::*;

use crate::bounds::Bounds3D;
use crate::bvh::translator::BvhTranslator;
use crate::bvh::{BuildOptions, Bvh};
use crate::camera::Camera;
use crate::hdr::HdrData;
use crate::light::Light;
use crate::material::Material;
use crate::mesh::{Mesh, MeshInstance};
use crate::texture::Texture;

/// Vertex indices are packed as `(column << 12) | row` of their position in
/// the square triangle-data texture, so the data texture side must fit its
/// row count in 12 bits.
pub const MAX_TRI_DATA_TEX_WIDTH: usize = 1 << 12;

const TLAS_BUILD_OPTIONS: BuildOptions = BuildOptions {
    num_bins: 16,
    max_leaf_prims: 1,
};

/// Packs a flat vertex index into the (column, row) texture-fetch encoding.
/// Precondition: `tex_width <= 4096` (see [`MAX_TRI_DATA_TEX_WIDTH`]).
pub fn pack_vertex_index(index: i32, tex_width: i32) -> i32 {
    ((index % tex_width) << 12) | (index / tex_width)
}

/// Inverse of [`pack_vertex_index`].
pub fn unpack_vertex_index(packed: i32, tex_width: i32) -> i32 {
    (packed & 0xFFF) * tex_width + (packed >> 12)
}

/// Flags the render pipeline reads off the scene.
#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    pub use_env_map: bool,
    pub env_map_intensity: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            use_env_map: false,
            env_map_intensity: 1.0,
        }
    }
}

/// The renderable world and its GPU-uploadable form.
///
/// Assets are registered through the `add_*` operations, then
/// [`Scene::create_acceleration_structures`] compiles everything into the
/// packed buffers and the flattened two-level BVH. When only instance
/// transforms change, [`Scene::rebuild_instances_data`] refreshes the
/// top-level tree and the transform array without repacking geometry or
/// textures.
#[derive(Default)]
pub struct Scene {
    pub render_options: RenderOptions,
    // Owned asset collections. Instances and materials reference meshes and
    // textures by index only.
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub mesh_instances: Vec<MeshInstance>,
    pub lights: Vec<Light>,
    pub textures: Vec<Texture>,
    pub hdr_data: Option<HdrData>,
    pub camera: Option<Camera>,
    // Packed buffers, rebuilt by create_acceleration_structures and always
    // consistent with the asset lists after a full pass.
    pub vert_indices: Vec<IVec3>,
    pub vertices_uvx: Vec<Vec4>,
    pub normals_uvy: Vec<Vec4>,
    pub transforms: Vec<Mat4>,
    pub indices_tex_width: usize,
    pub tri_data_tex_width: usize,
    pub texture_maps_array: Vec<u8>,
    pub tex_width: usize,
    pub tex_height: usize,
    pub bvh_translator: BvhTranslator,
    pub scene_bounds: Bounds3D,
    /// Set by `rebuild_instances_data`; the GPU consumer clears it after
    /// re-uploading transforms and the top-level nodes.
    pub instances_modified: bool,
    scene_bvh: Option<Bvh>,
}

impl Scene {
    pub fn new() -> Scene {
        Scene::default()
    }

    pub fn scene_bvh(&self) -> Option<&Bvh> {
        self.scene_bvh.as_ref()
    }

    /// Replaces any existing camera.
    pub fn add_camera(&mut self, position: glam::Vec3, look_at: glam::Vec3, fov_degrees: f32) {
        self.camera = Some(Camera::new(position, look_at, fov_degrees));
    }

    /// Loads a mesh, de-duplicated by path. Returns the index of the
    /// existing or newly loaded mesh, or `None` when the load fails (the
    /// scene is left unchanged).
    pub fn add_mesh(&mut self, path: impl AsRef<Path>) -> Option<usize> {
        let key = path.as_ref().to_string_lossy().into_owned();
        if let Some(id) = self.meshes.iter().position(|m| m.name == key) {
            return Some(id);
        }
        match Mesh::load_from_file(path.as_ref()) {
            Ok(mesh) => {
                info!("mesh {} loaded ({} triangles)", key, mesh.triangle_count());
                self.meshes.push(mesh);
                Some(self.meshes.len() - 1)
            }
            Err(err) => {
                error!("unable to load mesh {key}: {err}");
                None
            }
        }
    }

    /// Loads a texture, de-duplicated by path. Same contract as
    /// [`Scene::add_mesh`].
    pub fn add_texture(&mut self, path: impl AsRef<Path>) -> Option<usize> {
        let key = path.as_ref().to_string_lossy().into_owned();
        if let Some(id) = self.textures.iter().position(|t| t.name == key) {
            return Some(id);
        }
        match Texture::load_from_file(path.as_ref()) {
            Ok(texture) => {
                info!("texture {} loaded ({}x{})", key, texture.width, texture.height);
                self.textures.push(texture);
                Some(self.textures.len() - 1)
            }
            Err(err) => {
                error!("unable to load texture {key}: {err}");
                None
            }
        }
    }

    /// Always appends; materials are value types and duplicates are allowed.
    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_mesh_instance(&mut self, instance: MeshInstance) -> usize {
        debug_assert!(
            instance.mesh_id < self.meshes.len(),
            "instance {:?} references mesh {} of {}",
            instance.name,
            instance.mesh_id,
            self.meshes.len()
        );
        self.mesh_instances.push(instance);
        self.mesh_instances.len() - 1
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    /// Replaces the environment map. The previous map is released before the
    /// load is attempted, so a failed load leaves the scene with no
    /// environment; `use_env_map` is only touched on success.
    pub fn add_hdr(&mut self, path: impl AsRef<Path>) {
        self.hdr_data = None;
        match HdrData::load(path.as_ref()) {
            Ok(hdr) => {
                self.hdr_data = Some(hdr);
                self.render_options.use_env_map = true;
            }
            Err(err) => error!("unable to load HDR {}: {err}", path.as_ref().display()),
        }
    }

    /// Full build: bottom-level BVHs, top-level BVH, flattening, and the
    /// packed GPU buffers. Stages run in order with a join between them.
    pub fn create_acceleration_structures(&mut self) {
        self.create_blas();

        info!("building scene BVH over {} instances", self.mesh_instances.len());
        let tlas = self.build_tlas();
        self.bvh_translator
            .process(&tlas, &self.meshes, &self.mesh_instances);
        self.scene_bounds = tlas.bounds();
        self.scene_bvh = Some(tlas);

        self.pack_geometry();
        self.pack_transforms();
        self.pack_textures();
    }

    /// Cheap path when only instance transforms (or membership) changed:
    /// rebuilds the top-level tree, patches the flattened array, and
    /// refreshes the transform buffer. Geometry and texture packing are left
    /// untouched.
    pub fn rebuild_instances_data(&mut self) {
        let tlas = self.build_tlas();
        if tlas.node_count() == self.bvh_translator.top_level_count() {
            self.bvh_translator.update_tlas(&tlas, &self.mesh_instances);
        } else {
            // Instance membership changed: the top-level region has a new
            // size, so the whole array is re-laid out. Still no geometry or
            // texture repacking.
            self.bvh_translator
                .process(&tlas, &self.meshes, &self.mesh_instances);
        }
        self.scene_bounds = tlas.bounds();
        self.scene_bvh = Some(tlas);

        self.pack_transforms();
        self.instances_modified = true;
    }

    /// Builds every missing bottom-level BVH. Meshes are independent, so the
    /// builds fan out across the rayon pool and join here.
    fn create_blas(&mut self) {
        self.meshes.par_iter_mut().for_each(|mesh| {
            if mesh.bvh().is_none() {
                info!("building BVH for {}", mesh.name);
                mesh.build_bvh();
            }
        });
    }

    /// Top-level BVH over per-instance world-space bounds, one leaf per
    /// instance. Every referenced mesh must have its BVH built.
    fn build_tlas(&self) -> Bvh {
        let bounds: Vec<Bounds3D> = self
            .mesh_instances
            .iter()
            .map(|instance| {
                debug_assert!(self.meshes[instance.mesh_id].bvh().is_some());
                self.meshes[instance.mesh_id]
                    .bvh()
                    .map_or_else(Bounds3D::empty, |bvh| {
                        bvh.bounds().transform(&instance.transform)
                    })
            })
            .collect();
        Bvh::build(&bounds, &TLAS_BUILD_OPTIONS)
    }

    /// Concatenates every mesh's attribute streams, re-bases triangle
    /// indices through each mesh BVH's permutation, and pads everything out
    /// to square texture sizes with the (column, row) index encoding.
    fn pack_geometry(&mut self) {
        self.vert_indices.clear();
        self.vertices_uvx.clear();
        self.normals_uvy.clear();

        let mut vertices_cnt: usize = 0;
        for mesh in &self.meshes {
            // Indices come from the BVH permutation, not mesh order.
            if let Some(bvh) = mesh.bvh() {
                for &tri in bvh.indices() {
                    let base = (tri as usize * 3 + vertices_cnt) as i32;
                    self.vert_indices.push(IVec3::new(base, base + 1, base + 2));
                }
            }
            self.vertices_uvx.extend_from_slice(&mesh.vertices_uvx);
            self.normals_uvy.extend_from_slice(&mesh.normals_uvy);
            vertices_cnt += mesh.vertices_uvx.len();
        }

        self.indices_tex_width = (self.vert_indices.len() as f64).sqrt() as usize + 1;
        self.tri_data_tex_width = (self.vertices_uvx.len() as f64).sqrt() as usize + 1;
        if self.tri_data_tex_width > MAX_TRI_DATA_TEX_WIDTH {
            warn!(
                "triangle data texture width {} exceeds the {}-wide index encoding",
                self.tri_data_tex_width, MAX_TRI_DATA_TEX_WIDTH
            );
        }

        self.vert_indices
            .resize(self.indices_tex_width * self.indices_tex_width, IVec3::ZERO);
        let tri_data_len = self.tri_data_tex_width * self.tri_data_tex_width;
        self.vertices_uvx.resize(tri_data_len, Vec4::ZERO);
        self.normals_uvy.resize(tri_data_len, Vec4::ZERO);

        let width = self.tri_data_tex_width as i32;
        for index in &mut self.vert_indices {
            *index = IVec3::new(
                pack_vertex_index(index.x, width),
                pack_vertex_index(index.y, width),
                pack_vertex_index(index.z, width),
            );
        }
    }

    fn pack_transforms(&mut self) {
        self.transforms.clear();
        self.transforms
            .extend(self.mesh_instances.iter().map(|instance| instance.transform));
    }

    /// Concatenates all texel data into one array. Textures are expected to
    /// share one size; deviations are logged and fetched inconsistently by
    /// the GPU, not rejected here.
    fn pack_textures(&mut self) {
        self.texture_maps_array.clear();
        for (i, texture) in self.textures.iter().enumerate() {
            if i > 0 && (texture.width != self.tex_width || texture.height != self.tex_height) {
                warn!(
                    "texture {} is {}x{}, previous textures are {}x{}",
                    texture.name, texture.width, texture.height, self.tex_width, self.tex_height
                );
            }
            self.tex_width = texture.width;
            self.tex_height = texture.height;
            self.texture_maps_array.extend_from_slice(&texture.tex_data);
        }
    }
}
