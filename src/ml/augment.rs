//! Random affine augmentation of normalized training images
//!
//! Rotation, zoom, shift and shear around the image center, sampled
//! bilinearly with edge clamping (nearest fill). Never flips.

use rand::Rng;

use crate::preprocess::{CHANNELS, IMAGE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentConfig {
    /// Max rotation in degrees (either direction)
    pub rotation_deg: f32,
    /// Zoom factors are drawn from `[1 - zoom, 1 + zoom]` per axis
    pub zoom: f32,
    /// Max horizontal shift as a fraction of the width
    pub width_shift: f32,
    /// Max vertical shift as a fraction of the height
    pub height_shift: f32,
    /// Max shear angle in degrees
    pub shear_deg: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            rotation_deg: 10.0,
            zoom: 0.15,
            width_shift: 0.1,
            height_shift: 0.1,
            shear_deg: 0.15,
        }
    }
}

impl AugmentConfig {
    /// Config that leaves images untouched
    pub fn identity() -> Self {
        Self {
            rotation_deg: 0.0,
            zoom: 0.0,
            width_shift: 0.0,
            height_shift: 0.0,
            shear_deg: 0.0,
        }
    }
}

/// Transform parameters drawn for one image
#[derive(Debug, Clone, Copy, PartialEq)]
struct Affine {
    theta: f32,
    shear: f32,
    zoom_x: f32,
    zoom_y: f32,
    shift_x: f32,
    shift_y: f32,
}

impl Affine {
    fn sample<R: Rng>(config: &AugmentConfig, rng: &mut R) -> Self {
        let size = IMAGE_SIZE as f32;
        Self {
            theta: symmetric(rng, config.rotation_deg).to_radians(),
            shear: symmetric(rng, config.shear_deg).to_radians(),
            zoom_x: 1.0 + symmetric(rng, config.zoom),
            zoom_y: 1.0 + symmetric(rng, config.zoom),
            shift_x: symmetric(rng, config.width_shift) * size,
            shift_y: symmetric(rng, config.height_shift) * size,
        }
    }

    /// Inverse of the 2x2 linear part (rotation * shear * zoom)
    fn inverse_linear(&self) -> [[f32; 2]; 2] {
        let (sin_t, cos_t) = self.theta.sin_cos();
        let (sin_s, cos_s) = self.shear.sin_cos();
        let rotation = [[cos_t, -sin_t], [sin_t, cos_t]];
        let shear = [[1.0, -sin_s], [0.0, cos_s]];
        let zoom = [[self.zoom_x, 0.0], [0.0, self.zoom_y]];
        let m = mul(mul(rotation, shear), zoom);

        let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
        [
            [m[1][1] / det, -m[0][1] / det],
            [-m[1][0] / det, m[0][0] / det],
        ]
    }
}

fn symmetric<R: Rng>(rng: &mut R, range: f32) -> f32 {
    if range > 0.0 {
        rng.gen_range(-range..=range)
    } else {
        0.0
    }
}

fn mul(a: [[f32; 2]; 2], b: [[f32; 2]; 2]) -> [[f32; 2]; 2] {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

/// Apply one random affine transform to a normalized HWC image.
pub fn augment<R: Rng>(pixels: &[f32], config: &AugmentConfig, rng: &mut R) -> Vec<f32> {
    let affine = Affine::sample(config, rng);
    warp(pixels, &affine)
}

fn warp(pixels: &[f32], affine: &Affine) -> Vec<f32> {
    let inv = affine.inverse_linear();
    let center = (IMAGE_SIZE as f32 - 1.0) / 2.0;
    let mut out = vec![0.0; pixels.len()];

    for y in 0..IMAGE_SIZE {
        for x in 0..IMAGE_SIZE {
            let dx = x as f32 - center - affine.shift_x;
            let dy = y as f32 - center - affine.shift_y;
            let src_x = inv[0][0] * dx + inv[0][1] * dy + center;
            let src_y = inv[1][0] * dx + inv[1][1] * dy + center;

            let base = (y * IMAGE_SIZE + x) * CHANNELS;
            for c in 0..CHANNELS {
                out[base + c] = bilinear(pixels, src_x, src_y, c);
            }
        }
    }

    out
}

fn bilinear(pixels: &[f32], x: f32, y: f32, c: usize) -> f32 {
    let max = (IMAGE_SIZE - 1) as f32;
    let x = x.clamp(0.0, max);
    let y = y.clamp(0.0, max);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(IMAGE_SIZE - 1);
    let y1 = (y0 + 1).min(IMAGE_SIZE - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let at = |px: usize, py: usize| pixels[(py * IMAGE_SIZE + px) * CHANNELS + c];
    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    (top * (1.0 - fy) + bottom * fy).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::TENSOR_LEN;
    use rand::SeedableRng;

    fn pattern() -> Vec<f32> {
        (0..TENSOR_LEN).map(|i| (i % 17) as f32 / 16.0).collect()
    }

    #[test]
    fn test_identity_keeps_pixels() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let input = pattern();
        let output = augment(&input, &AugmentConfig::identity(), &mut rng);
        for (a, b) in input.iter().zip(&output) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_shape_and_range_preserved() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let input = pattern();
        for _ in 0..20 {
            let output = augment(&input, &AugmentConfig::default(), &mut rng);
            assert_eq!(output.len(), TENSOR_LEN);
            assert!(output.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_uniform_image_stays_uniform() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let input = vec![0.25; TENSOR_LEN];
        let output = augment(&input, &AugmentConfig::default(), &mut rng);
        assert!(output.iter().all(|v| (v - 0.25).abs() < 1e-5));
    }

    #[test]
    fn test_shift_moves_content() {
        let mut input = vec![0.0; TENSOR_LEN];
        // bright pixel at the center row, column 10
        input[(15 * IMAGE_SIZE + 10) * CHANNELS] = 1.0;
        let affine = Affine {
            theta: 0.0,
            shear: 0.0,
            zoom_x: 1.0,
            zoom_y: 1.0,
            shift_x: 3.0,
            shift_y: 0.0,
        };
        let output = warp(&input, &affine);
        assert!((output[(15 * IMAGE_SIZE + 13) * CHANNELS] - 1.0).abs() < 1e-5);
        assert!(output[(15 * IMAGE_SIZE + 10) * CHANNELS].abs() < 1e-5);
    }
}
