// src/hdr.rs
use std::path::Path;

use glam::{vec2, Vec2};
use log::info;

use crate::error::{Error, Result};

/// Floating-point environment map with precomputed marginal/conditional
/// sampling tables for environment importance sampling.
///
/// Both tables store `(warped coordinate, pdf)` per entry: `marginal_dist[i]`
/// answers "which row does the cdf reach at (i+1)/height", so the shader
/// samples by a single fetch instead of a binary search. `conditional_dist`
/// does the same per row for columns.
#[derive(Debug)]
pub struct HdrData {
    pub width: usize,
    pub height: usize,
    /// RGB triplets, `width * height * 3` floats.
    pub pixels: Vec<f32>,
    pub marginal_dist: Vec<Vec2>,
    pub conditional_dist: Vec<Vec2>,
}

impl HdrData {
    /// Decodes a Radiance HDR (or any float-decodable) image and builds the
    /// sampling distributions.
    pub fn load(path: impl AsRef<Path>) -> Result<HdrData> {
        let path = path.as_ref();
        let reader = image::ImageReader::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image = reader.decode()?.to_rgb32f();
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width == 0 || height == 0 {
            return Err(Error::EmptyHdr {
                path: path.to_path_buf(),
                width: width as u32,
                height: height as u32,
            });
        }

        let mut hdr = HdrData {
            width,
            height,
            pixels: image.into_raw(),
            marginal_dist: Vec::new(),
            conditional_dist: Vec::new(),
        };
        hdr.build_distributions();
        info!("HDR environment loaded: {}x{}", width, height);
        Ok(hdr)
    }

    pub(crate) fn build_distributions(&mut self) {
        let (width, height) = (self.width, self.height);
        let mut pdf_2d = vec![0.0f32; width * height];
        let mut cdf_2d = vec![0.0f32; width * height];
        let mut pdf_1d = vec![0.0f32; height];
        let mut cdf_1d = vec![0.0f32; height];

        // Per-row luminance pdf/cdf (conditional), then per-row sums roll up
        // into the marginal over rows.
        let mut col_weight_sum = 0.0f32;
        for j in 0..height {
            let mut row_weight_sum = 0.0f32;
            for i in 0..width {
                let p = (j * width + i) * 3;
                let weight = luminance(self.pixels[p], self.pixels[p + 1], self.pixels[p + 2]);
                row_weight_sum += weight;
                pdf_2d[j * width + i] = weight;
                cdf_2d[j * width + i] = row_weight_sum;
            }
            if row_weight_sum > 0.0 {
                for i in 0..width {
                    pdf_2d[j * width + i] /= row_weight_sum;
                    cdf_2d[j * width + i] /= row_weight_sum;
                }
            }
            col_weight_sum += row_weight_sum;
            pdf_1d[j] = row_weight_sum;
            cdf_1d[j] = col_weight_sum;
        }
        if col_weight_sum > 0.0 {
            for j in 0..height {
                pdf_1d[j] /= col_weight_sum;
                cdf_1d[j] /= col_weight_sum;
            }
        }

        // Invert both cdfs so lookups become single fetches.
        self.marginal_dist = (0..height)
            .map(|i| {
                let target = (i + 1) as f32 / height as f32;
                let row = lower_bound(&cdf_1d, target);
                vec2(row as f32 / height as f32, pdf_1d[i])
            })
            .collect();

        self.conditional_dist = Vec::with_capacity(width * height);
        for j in 0..height {
            let row_cdf = &cdf_2d[j * width..(j + 1) * width];
            for i in 0..width {
                let target = (i + 1) as f32 / width as f32;
                let col = lower_bound(row_cdf, target);
                self.conditional_dist
                    .push(vec2(col as f32 / width as f32, pdf_2d[j * width + i]));
            }
        }
    }
}

fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.212_671 * r + 0.715_160 * g + 0.072_169 * b
}

fn lower_bound(cdf: &[f32], target: f32) -> usize {
    cdf.partition_point(|&c| c < target).min(cdf.len() - 1)
}
