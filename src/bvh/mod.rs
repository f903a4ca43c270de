// src/bvh/mod.rs
pub mod translator;

use crate::bounds::Bounds3D;
use glam::Vec3;

/// Parameters of a BVH build. The same builder serves both levels: meshes
/// build over per-triangle bounds, the scene builds over per-instance world
/// bounds with `max_leaf_prims = 1`.
#[derive(Clone, Copy, Debug)]
pub struct BuildOptions {
    pub num_bins: usize,
    pub max_leaf_prims: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            num_bins: 16,
            max_leaf_prims: 4,
        }
    }
}

/// Binary BVH node.
///
/// `prim_count > 0` marks a leaf whose primitives occupy
/// `indices[left_first..left_first + prim_count]` of the permutation.
/// For inner nodes `left_first` is the index of the left child and the right
/// child sits at `left_first + 1`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BvhNode {
    pub bounds: Bounds3D,
    pub left_first: u32,
    pub prim_count: u32,
}

impl BvhNode {
    pub fn is_leaf(&self) -> bool {
        self.prim_count > 0
    }
}

/// Binary BVH over a set of primitive bounds, built with binned SAH.
///
/// The build permutes primitives; `indices()` maps traversal order back to
/// the caller's primitive order. Consumers must index through this
/// permutation, never through the original order.
pub struct Bvh {
    nodes: Vec<BvhNode>,
    indices: Vec<u32>,
}

impl Bvh {
    pub fn build(prim_bounds: &[Bounds3D], options: &BuildOptions) -> Self {
        let mut builder = Builder {
            nodes: Vec::with_capacity(2 * prim_bounds.len().max(1)),
            indices: (0..prim_bounds.len() as u32).collect(),
            prim_bounds,
            centers: prim_bounds.iter().map(Bounds3D::center).collect(),
            options: *options,
        };
        builder.build();
        Self {
            nodes: builder.nodes,
            indices: builder.indices,
        }
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Bounds of the whole primitive set.
    pub fn bounds(&self) -> Bounds3D {
        self.nodes[0].bounds
    }

    /// Primitive permutation in traversal order.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }
}

#[derive(Clone, Copy, Default)]
struct Bin {
    bounds: Bounds3D,
    count: u32,
}

struct Builder<'a> {
    nodes: Vec<BvhNode>,
    indices: Vec<u32>,
    prim_bounds: &'a [Bounds3D],
    centers: Vec<Vec3>,
    options: BuildOptions,
}

impl Builder<'_> {
    fn build(&mut self) {
        let root = BvhNode {
            left_first: 0,
            prim_count: self.indices.len() as u32,
            ..Default::default()
        };
        self.nodes.push(root);
        self.update_node_bounds(0);
        if self.indices.is_empty() {
            // Zero primitives: keep the single empty node. Its inverted
            // bounds never intersect a ray, so traversal cannot descend.
            self.nodes[0].prim_count = 0;
            return;
        }
        self.subdivide(0);
    }

    fn update_node_bounds(&mut self, node_idx: usize) {
        let node = self.nodes[node_idx];
        let mut bounds = Bounds3D::empty();
        for i in 0..node.prim_count {
            let prim = self.indices[(node.left_first + i) as usize] as usize;
            bounds = bounds.union(&self.prim_bounds[prim]);
        }
        self.nodes[node_idx].bounds = bounds;
    }

    fn subdivide(&mut self, node_idx: usize) {
        let node = self.nodes[node_idx];
        let first = node.left_first as usize;
        let count = node.prim_count as usize;
        if count <= self.options.max_leaf_prims {
            return;
        }

        let mid = self
            .find_binned_split(&node)
            .map(|(axis, split_bin, scale, split_min)| {
                self.partition(first, count, axis, split_bin, scale, split_min)
            })
            .filter(|&mid| mid != first && mid != first + count)
            .unwrap_or_else(|| {
                // Degenerate SAH split (coincident centroids or an empty
                // side): median split on the largest axis so subdivision
                // always makes progress.
                self.median_split(&node)
            });

        let left_child = self.nodes.len();
        self.nodes.push(BvhNode {
            left_first: first as u32,
            prim_count: (mid - first) as u32,
            ..Default::default()
        });
        self.nodes.push(BvhNode {
            left_first: mid as u32,
            prim_count: (first + count - mid) as u32,
            ..Default::default()
        });
        self.nodes[node_idx].left_first = left_child as u32;
        self.nodes[node_idx].prim_count = 0;

        self.update_node_bounds(left_child);
        self.update_node_bounds(left_child + 1);
        self.subdivide(left_child);
        self.subdivide(left_child + 1);
    }

    /// Binned SAH sweep over the node's largest axis. Returns the axis, the
    /// last bin of the left side, and the bin mapping, or `None` when every
    /// candidate plane leaves one side empty.
    fn find_binned_split(&self, node: &BvhNode) -> Option<(usize, usize, f32, f32)> {
        let extent = node.bounds.extent();
        let axis = largest_axis(extent);
        let split_len = extent[axis];
        let split_min = node.bounds.min[axis];
        if split_len < 1e-6 {
            return None;
        }

        let num_bins = self.options.num_bins;
        let mut bins = vec![Bin::default(); num_bins];
        let first = node.left_first as usize;
        let count = node.prim_count as usize;
        let scale = num_bins as f32 / split_len;

        for i in 0..count {
            let prim = self.indices[first + i] as usize;
            let bin = bin_index(self.centers[prim][axis], split_min, scale, num_bins);
            bins[bin].count += 1;
            bins[bin].bounds = bins[bin].bounds.union(&self.prim_bounds[prim]);
        }

        // Prefix/suffix sweeps accumulate area and count on each side of
        // every candidate split plane.
        let mut left_area = vec![0.0f32; num_bins];
        let mut left_count = vec![0u32; num_bins];
        let mut right_area = vec![0.0f32; num_bins];
        let mut right_count = vec![0u32; num_bins];

        let mut running = Bounds3D::empty();
        let mut sum = 0;
        for i in 0..num_bins {
            sum += bins[i].count;
            running = running.union(&bins[i].bounds);
            left_area[i] = running.surface_area();
            left_count[i] = sum;
        }
        running = Bounds3D::empty();
        sum = 0;
        for i in (0..num_bins).rev() {
            sum += bins[i].count;
            running = running.union(&bins[i].bounds);
            right_area[i] = running.surface_area();
            right_count[i] = sum;
        }

        let mut best_cost = f32::INFINITY;
        let mut best_split = None;
        for i in 0..num_bins - 1 {
            if left_count[i] == 0 || right_count[i + 1] == 0 {
                continue;
            }
            let cost = left_area[i] * left_count[i] as f32
                + right_area[i + 1] * right_count[i + 1] as f32;
            if cost < best_cost {
                best_cost = cost;
                best_split = Some(i);
            }
        }

        best_split.map(|bin| (axis, bin, scale, split_min))
    }

    /// Two-pointer partition of the permutation slice around the split bin.
    fn partition(
        &mut self,
        first: usize,
        count: usize,
        axis: usize,
        split_bin: usize,
        scale: f32,
        split_min: f32,
    ) -> usize {
        let num_bins = self.options.num_bins;
        let mut lo = first;
        let mut hi = first + count;
        while lo < hi {
            let prim = self.indices[lo] as usize;
            let bin = bin_index(self.centers[prim][axis], split_min, scale, num_bins);
            if bin <= split_bin {
                lo += 1;
            } else {
                hi -= 1;
                self.indices.swap(lo, hi);
            }
        }
        lo
    }

    fn median_split(&mut self, node: &BvhNode) -> usize {
        let first = node.left_first as usize;
        let count = node.prim_count as usize;
        let axis = largest_axis(node.bounds.extent());
        let centers = &self.centers;
        self.indices[first..first + count].sort_by(|&a, &b| {
            centers[a as usize][axis]
                .partial_cmp(&centers[b as usize][axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        first + count / 2
    }
}

fn largest_axis(extent: Vec3) -> usize {
    if extent.y > extent.x {
        if extent.z > extent.y {
            2
        } else {
            1
        }
    } else if extent.z > extent.x {
        2
    } else {
        0
    }
}

fn bin_index(center: f32, split_min: f32, scale: f32, num_bins: usize) -> usize {
    (((center - split_min) * scale) as usize).min(num_bins - 1)
}
