// src/bvh/translator.rs
use bytemuck::{Pod, Zeroable};

use crate::bvh::Bvh;
use crate::mesh::{Mesh, MeshInstance};

/// Flattened two-level BVH node, 48 bytes, uploadable as-is.
///
/// Field meaning switches on `leaf`:
/// - `leaf == 0`: inner node, `left`/`right` are child offsets in this array;
/// - `leaf == 1`: bottom-level leaf, `left` is the first slot in the global
///   permuted triangle list and `right` the triangle count;
/// - `leaf < 0`: top-level leaf for instance `-leaf - 1`, `left` is the
///   offset of that instance's bottom-level root and `right` its material
///   index. Traversal applies the instance transform when crossing it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TranslatedNode {
    pub bbox_min: [f32; 3],
    pub left: i32,
    pub bbox_max: [f32; 3],
    pub right: i32,
    pub leaf: i32,
    pub _pad: [i32; 3],
}

/// Merges the top-level tree and every mesh's bottom-level tree into one
/// node array with a single address space.
///
/// Layout: top-level nodes first (root at offset 0), then each mesh's
/// bottom-level tree in mesh order. Because a top-level tree over N
/// instances always has 2N-1 nodes, the top-level region has a fixed size
/// for a fixed instance count, which is what allows `update_tlas` to patch
/// it in place without touching bottom-level offsets.
#[derive(Default)]
pub struct BvhTranslator {
    pub nodes: Vec<TranslatedNode>,
    top_level_count: usize,
    blas_root_offsets: Vec<usize>,
}

impl BvhTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the top-level region (`nodes[0..top_level_count]`).
    pub fn top_level_count(&self) -> usize {
        self.top_level_count
    }

    /// Offset of each mesh's bottom-level root in `nodes`.
    pub fn blas_root_offsets(&self) -> &[usize] {
        &self.blas_root_offsets
    }

    /// Full rebuild over all meshes and instances. Every mesh is expected to
    /// have its bottom-level BVH built.
    pub fn process(&mut self, tlas: &Bvh, meshes: &[Mesh], instances: &[MeshInstance]) {
        self.nodes.clear();
        self.top_level_count = tlas.node_count();

        self.blas_root_offsets.clear();
        let mut offset = self.top_level_count;
        for mesh in meshes {
            self.blas_root_offsets.push(offset);
            offset += mesh.bvh().map_or(1, Bvh::node_count);
        }

        emit_tlas(&mut self.nodes, &self.blas_root_offsets, tlas, 0, instances);
        debug_assert_eq!(self.nodes.len(), self.top_level_count);

        let mut tri_offset = 0usize;
        for mesh in meshes {
            match mesh.bvh() {
                Some(bvh) => {
                    emit_blas(&mut self.nodes, bvh, 0, tri_offset);
                    tri_offset += bvh.num_indices();
                }
                None => {
                    debug_assert!(false, "mesh {:?} has no BVH at translation time", mesh.name);
                    self.nodes.push(TranslatedNode::zeroed());
                }
            }
        }
        debug_assert_eq!(self.nodes.len(), offset);
    }

    /// Rewrites only the top-level region and its instance references.
    /// Valid only while the instance count (and therefore the top-level node
    /// count) is unchanged since the last `process`; bottom-level subtrees
    /// are left untouched.
    pub fn update_tlas(&mut self, tlas: &Bvh, instances: &[MeshInstance]) {
        assert_eq!(
            tlas.node_count(),
            self.top_level_count,
            "instance count changed since the last full translation"
        );
        let mut top = Vec::with_capacity(self.top_level_count);
        emit_tlas(&mut top, &self.blas_root_offsets, tlas, 0, instances);
        self.nodes[..self.top_level_count].copy_from_slice(&top);
    }
}

/// Appends the subtree rooted at `node_idx` in prefix order and returns the
/// offset the root landed at.
fn emit_tlas(
    out: &mut Vec<TranslatedNode>,
    blas_root_offsets: &[usize],
    tlas: &Bvh,
    node_idx: usize,
    instances: &[MeshInstance],
) -> i32 {
    let node = tlas.nodes()[node_idx];
    let slot = out.len();
    out.push(TranslatedNode {
        bbox_min: node.bounds.min.into(),
        bbox_max: node.bounds.max.into(),
        ..TranslatedNode::zeroed()
    });

    if node.is_leaf() {
        debug_assert_eq!(node.prim_count, 1, "top-level leaves hold one instance");
        let instance_idx = tlas.indices()[node.left_first as usize] as usize;
        let instance = &instances[instance_idx];
        out[slot].left = blas_root_offsets[instance.mesh_id] as i32;
        out[slot].right = instance.material_id as i32;
        out[slot].leaf = -(instance_idx as i32) - 1;
    } else if tlas.node_count() > 1 {
        let left = emit_tlas(out, blas_root_offsets, tlas, node.left_first as usize, instances);
        let right = emit_tlas(
            out,
            blas_root_offsets,
            tlas,
            node.left_first as usize + 1,
            instances,
        );
        out[slot].left = left;
        out[slot].right = right;
    }
    // A zero-instance tree keeps its single node as-is: inverted bounds,
    // never entered by traversal.

    slot as i32
}

fn emit_blas(out: &mut Vec<TranslatedNode>, bvh: &Bvh, node_idx: usize, tri_offset: usize) -> i32 {
    let node = bvh.nodes()[node_idx];
    let slot = out.len();
    out.push(TranslatedNode {
        bbox_min: node.bounds.min.into(),
        bbox_max: node.bounds.max.into(),
        ..TranslatedNode::zeroed()
    });

    if node.is_leaf() {
        out[slot].left = (tri_offset + node.left_first as usize) as i32;
        out[slot].right = node.prim_count as i32;
        out[slot].leaf = 1;
    } else if bvh.node_count() > 1 {
        let left = emit_blas(out, bvh, node.left_first as usize, tri_offset);
        let right = emit_blas(out, bvh, node.left_first as usize + 1, tri_offset);
        out[slot].left = left;
        out[slot].right = right;
    }

    slot as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds3D;
    use crate::bvh::BuildOptions;
    use glam::{vec4, Mat4, Vec3};

    fn quad_mesh(name: &str) -> Mesh {
        // Two triangles spanning the unit square in the XY plane.
        let vertices = vec![
            vec4(0.0, 0.0, 0.0, 0.0),
            vec4(1.0, 0.0, 0.0, 1.0),
            vec4(1.0, 1.0, 0.0, 1.0),
            vec4(0.0, 0.0, 0.0, 0.0),
            vec4(1.0, 1.0, 0.0, 1.0),
            vec4(0.0, 1.0, 0.0, 0.0),
        ];
        let normals = vec![vec4(0.0, 0.0, 1.0, 0.0); 6];
        let mut mesh = Mesh::from_soup(name, vertices, normals);
        mesh.build_bvh();
        mesh
    }

    fn two_instances() -> Vec<MeshInstance> {
        vec![
            MeshInstance::new("a", 0, 0, Mat4::IDENTITY),
            MeshInstance::new("b", 0, 3, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))),
        ]
    }

    fn build_tlas(meshes: &[Mesh], instances: &[MeshInstance]) -> Bvh {
        let bounds: Vec<Bounds3D> = instances
            .iter()
            .map(|inst| {
                meshes[inst.mesh_id]
                    .bvh()
                    .unwrap()
                    .bounds()
                    .transform(&inst.transform)
            })
            .collect();
        Bvh::build(
            &bounds,
            &BuildOptions {
                num_bins: 16,
                max_leaf_prims: 1,
            },
        )
    }

    #[test]
    fn process_lays_out_tlas_then_blas() {
        let meshes = vec![quad_mesh("quad")];
        let instances = two_instances();
        let tlas = build_tlas(&meshes, &instances);

        let mut translator = BvhTranslator::new();
        translator.process(&tlas, &meshes, &instances);

        let blas_len = meshes[0].bvh().unwrap().node_count();
        assert_eq!(translator.top_level_count(), 3); // 2 instances -> 2N-1
        assert_eq!(translator.nodes.len(), 3 + blas_len);
        assert_eq!(translator.blas_root_offsets(), &[3]);

        // Root is inner and its children stay inside the top-level region.
        let root = translator.nodes[0];
        assert_eq!(root.leaf, 0);
        assert!((root.left as usize) < 3 && (root.right as usize) < 3);

        // Both top-level leaves jump to the shared mesh's root and carry the
        // instance encoding.
        let mut seen_instances = Vec::new();
        for node in &translator.nodes[..3] {
            if node.leaf < 0 {
                assert_eq!(node.left, 3);
                seen_instances.push(-node.leaf - 1);
            }
        }
        seen_instances.sort_unstable();
        assert_eq!(seen_instances, vec![0, 1]);
    }

    #[test]
    fn blas_leaves_carry_global_triangle_slots() {
        let meshes = vec![quad_mesh("a"), quad_mesh("b")];
        let instances = vec![
            MeshInstance::new("a", 0, 0, Mat4::IDENTITY),
            MeshInstance::new("b", 1, 1, Mat4::IDENTITY),
        ];
        let tlas = build_tlas(&meshes, &instances);

        let mut translator = BvhTranslator::new();
        translator.process(&tlas, &meshes, &instances);

        // The second mesh's leaves must be offset by the first mesh's
        // triangle count (2).
        let second_base = translator.blas_root_offsets()[1];
        let mut slots: Vec<i32> = translator.nodes[second_base..]
            .iter()
            .filter(|n| n.leaf == 1)
            .flat_map(|n| (n.left..n.left + n.right).collect::<Vec<_>>())
            .collect();
        slots.sort_unstable();
        assert_eq!(slots, vec![2, 3]);
    }

    #[test]
    fn update_tlas_leaves_blas_region_untouched() {
        let meshes = vec![quad_mesh("quad")];
        let mut instances = two_instances();
        let tlas = build_tlas(&meshes, &instances);

        let mut translator = BvhTranslator::new();
        translator.process(&tlas, &meshes, &instances);
        let blas_before: Vec<u8> =
            bytemuck::cast_slice(&translator.nodes[translator.top_level_count()..]).to_vec();

        // Move one instance and patch.
        instances[1].transform = Mat4::from_translation(Vec3::new(0.0, 9.0, 0.0));
        let tlas = build_tlas(&meshes, &instances);
        translator.update_tlas(&tlas, &instances);

        let blas_after: Vec<u8> =
            bytemuck::cast_slice(&translator.nodes[translator.top_level_count()..]).to_vec();
        assert_eq!(blas_before, blas_after);

        // The patched top level reflects the new placement.
        let root = translator.nodes[0];
        assert!(root.bbox_max[1] >= 10.0 - 1e-4);
    }

    #[test]
    #[should_panic(expected = "instance count changed")]
    fn update_tlas_rejects_instance_count_change() {
        let meshes = vec![quad_mesh("quad")];
        let mut instances = two_instances();
        let tlas = build_tlas(&meshes, &instances);

        let mut translator = BvhTranslator::new();
        translator.process(&tlas, &meshes, &instances);

        instances.push(MeshInstance::new("c", 0, 0, Mat4::IDENTITY));
        let tlas = build_tlas(&meshes, &instances);
        translator.update_tlas(&tlas, &instances);
    }

    #[test]
    fn zero_instances_translate_without_panic() {
        let meshes = vec![quad_mesh("quad")];
        let instances: Vec<MeshInstance> = Vec::new();
        let tlas = build_tlas(&meshes, &instances);

        let mut translator = BvhTranslator::new();
        translator.process(&tlas, &meshes, &instances);
        assert_eq!(translator.top_level_count(), 1);
        assert_eq!(translator.nodes[0].leaf, 0);
    }
}
