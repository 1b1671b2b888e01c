// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

use crate::errors::{EngineError, Result};
use crate::visual::color::Color;

/// Samples per grating cycle. 2^9 keeps quantization of the luminance ramp
/// well below what an 8-bit display can resolve.
const GRATING_SAMPLES: u32 = 512;
/// Side length of synthesized noise fields.
const NOISE_SIZE: u32 = 128;
/// Box-blur radius for the low-pass noise variant.
const LOW_PASS_RADIUS: i32 = 2;

/// Texture kinds the synthesizer understands.
///
/// Parametrized kinds bake a ramp between the two reference colors into the
/// pixel buffer; `Image` and `TextAtlas` carry externally supplied pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureKind {
    /// A single solid color.
    Flat,
    /// Sinusoidal luminance grating along the u axis, one cycle per unit.
    /// Phase is chosen so u = 0 samples rgba1 and u = 0.5 samples rgba0.
    Sine,
    /// Hard-thresholded sine: a square-wave grating with the same phase.
    SquareSine,
    /// Alternating grid of the two reference colors.
    Checkerboard { cells: u32 },
    /// White noise with uniformly distributed luminance.
    UniformNoise { seed: u64 },
    /// White noise with Gaussian-distributed luminance.
    GaussianNoise { seed: u64 },
    /// Uniform noise passed through a box low-pass filter.
    LowPassNoise { seed: u64 },
    /// First derivative of a Gaussian.
    G1,
    /// Second derivative of a Gaussian.
    G2,
    /// Third derivative of a Gaussian.
    G3,
    /// Externally loaded image; reference colors are not applied.
    Image,
    /// Glyph atlas built by the text layout module.
    TextAtlas,
}

/// A 2D RGBA (f32) pixel buffer plus the synthesis parameters it was built
/// from, so that recoloring can regenerate it in place.
#[derive(Debug, Clone)]
pub struct Texture {
    kind: TextureKind,
    width: u32,
    height: u32,
    mip_levels: u32,
    rgba0: Color,
    rgba1: Color,
    pixels: Vec<f32>,
    revision: u64,
}

impl Texture {
    /// A single-color texture.
    pub fn flat(rgba: Color) -> Texture {
        let mut pixels = Vec::new();
        let (width, height) = synthesize(TextureKind::Flat, rgba, rgba, &mut pixels);
        Texture {
            kind: TextureKind::Flat,
            width,
            height,
            mip_levels: mip_count(width, height),
            rgba0: rgba,
            rgba1: rgba,
            pixels,
            revision: 0,
        }
    }

    /// A parametrized texture with the default black-to-white color pair.
    pub fn parametric(kind: TextureKind) -> Result<Texture> {
        Texture::new(kind, Color::BLACK, Color::WHITE)
    }

    /// A parametrized texture ramping between `rgba0` and `rgba1`.
    pub fn new(kind: TextureKind, rgba0: Color, rgba1: Color) -> Result<Texture> {
        match kind {
            TextureKind::Image | TextureKind::TextAtlas => {
                return Err(EngineError::invalid(format!(
                    "{kind:?} textures need a pixel source, not a color pair"
                )))
            }
            TextureKind::Checkerboard { cells } => {
                if cells == 0 || cells > 4096 {
                    return Err(EngineError::invalid(format!(
                        "checkerboard cell count must be in 1..=4096, got {cells}"
                    )));
                }
            }
            _ => {}
        }
        let mut pixels = Vec::new();
        let (width, height) = synthesize(kind, rgba0, rgba1, &mut pixels);
        Ok(Texture {
            kind,
            width,
            height,
            mip_levels: mip_count(width, height),
            rgba0,
            rgba1,
            pixels,
            revision: 0,
        })
    }

    /// Loads an image file as a single-mip texture.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Texture> {
        Texture::load_image(path, false)
    }

    /// Loads an image file and requests a full mip chain.
    pub fn from_file_with_mips(path: impl AsRef<Path>) -> Result<Texture> {
        Texture::load_image(path, true)
    }

    fn load_image(path: impl AsRef<Path>, mips: bool) -> Result<Texture> {
        let image = image::open(path.as_ref())?.to_rgba32f();
        let (width, height) = image.dimensions();
        let pixels = image.into_raw();
        Ok(Texture {
            kind: TextureKind::Image,
            width,
            height,
            mip_levels: if mips { mip_count(width, height) } else { 1 },
            rgba0: Color::TRANSPARENT,
            rgba1: Color::TRANSPARENT,
            pixels,
            revision: 0,
        })
    }

    /// Wraps an externally supplied RGBA f32 pixel buffer.
    pub fn from_pixels(pixels: Vec<f32>, width: u32, height: u32) -> Result<Texture> {
        if width == 0 || height == 0 || pixels.len() != (4 * width * height) as usize {
            return Err(EngineError::invalid(format!(
                "pixel buffer of {} floats does not match {width}x{height} RGBA",
                pixels.len()
            )));
        }
        Ok(Texture {
            kind: TextureKind::Image,
            width,
            height,
            mip_levels: 1,
            rgba0: Color::TRANSPARENT,
            rgba1: Color::TRANSPARENT,
            pixels,
            revision: 0,
        })
    }

    /// Internal constructor for glyph atlases; `tint` is the text color the
    /// shader applies to the coverage values.
    pub(crate) fn text_atlas(pixels: Vec<f32>, width: u32, height: u32, tint: Color) -> Texture {
        debug_assert_eq!(pixels.len(), (4 * width * height) as usize);
        Texture {
            kind: TextureKind::TextAtlas,
            width,
            height,
            mip_levels: mip_count(width, height),
            rgba0: tint,
            rgba1: tint,
            pixels,
            revision: 0,
        }
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn rgba0(&self) -> Color {
        self.rgba0
    }

    pub fn rgba1(&self) -> Color {
        self.rgba1
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Bumped whenever the pixel buffer changes, so renderers know to
    /// re-upload.
    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    /// Recolors the texture with a single color (both references set to
    /// `rgba`).
    pub fn set_color(&mut self, rgba: Color) {
        self.set_colors(rgba, rgba);
    }

    /// Recolors the texture in place. For parametrized kinds the pixel
    /// buffer is re-synthesized, byte-identical to construction from scratch
    /// with the same parameters; dimensions are unchanged so no reallocation
    /// happens. For image kinds only the reference colors are updated.
    pub fn set_colors(&mut self, rgba0: Color, rgba1: Color) {
        self.rgba0 = rgba0;
        self.rgba1 = rgba1;
        match self.kind {
            TextureKind::Image | TextureKind::TextAtlas => {}
            kind => {
                let (w, h) = synthesize(kind, rgba0, rgba1, &mut self.pixels);
                debug_assert_eq!((w, h), (self.width, self.height));
            }
        }
        self.revision += 1;
    }

    /// Nearest-neighbor sample at normalized texture coordinates, for tests
    /// and photometric calibration.
    pub fn sample(&self, u: f32, v: f32) -> Color {
        let x = ((u.rem_euclid(1.0)) * self.width as f32) as u32 % self.width;
        let y = ((v.rem_euclid(1.0)) * self.height as f32) as u32 % self.height;
        let i = 4 * (y * self.width + x) as usize;
        Color::rgba(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        )
    }

    /// Quantized RGBA8 mip chain for GPU upload, level 0 first. Levels are
    /// box-filtered halvings of the previous level.
    pub(crate) fn mip_chain_rgba8(&self) -> Vec<(u32, u32, Vec<u8>)> {
        let mut chain = Vec::with_capacity(self.mip_levels as usize);
        let level0: Vec<u8> = self
            .pixels
            .iter()
            .map(|&c| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8)
            .collect();
        chain.push((self.width, self.height, level0));
        for _ in 1..self.mip_levels {
            let &(pw, ph, ref prev) = chain.last().unwrap();
            let w = (pw / 2).max(1);
            let h = (ph / 2).max(1);
            let mut level = vec![0u8; (4 * w * h) as usize];
            for y in 0..h {
                for x in 0..w {
                    for c in 0..4 {
                        let mut sum = 0u32;
                        for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                            let sx = (2 * x + dx).min(pw - 1);
                            let sy = (2 * y + dy).min(ph - 1);
                            sum += prev[(4 * (sy * pw + sx) + c) as usize] as u32;
                        }
                        level[(4 * (y * w + x) + c) as usize] = (sum / 4) as u8;
                    }
                }
            }
            chain.push((w, h, level));
        }
        chain
    }
}

/// Mip count for a buffer: floor(log2(max(w, h))) + 1.
fn mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Fills `pixels` for the given parametrized kind, reusing the allocation
/// when the target size is unchanged. Returns the buffer dimensions.
fn synthesize(kind: TextureKind, rgba0: Color, rgba1: Color, pixels: &mut Vec<f32>) -> (u32, u32) {
    match kind {
        TextureKind::Flat => fill_ramp(pixels, 1, 1, |_, _| 1.0, rgba0, rgba1),
        TextureKind::Sine => fill_ramp(
            pixels,
            GRATING_SAMPLES,
            1,
            |u, _| 0.5 + 0.5 * (2.0 * std::f32::consts::PI * u).cos(),
            rgba0,
            rgba1,
        ),
        TextureKind::SquareSine => fill_ramp(
            pixels,
            GRATING_SAMPLES,
            1,
            |u, _| {
                if (2.0 * std::f32::consts::PI * u).cos() >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            },
            rgba0,
            rgba1,
        ),
        TextureKind::Checkerboard { cells } => fill_ramp(
            pixels,
            cells,
            cells,
            |u, v| {
                let x = (u * cells as f32) as u32;
                let y = (v * cells as f32) as u32;
                ((x + y) % 2) as f32
            },
            rgba0,
            rgba1,
        ),
        TextureKind::UniformNoise { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let field: Vec<f32> = (0..NOISE_SIZE * NOISE_SIZE)
                .map(|_| rng.gen::<f32>())
                .collect();
            fill_field(pixels, NOISE_SIZE, NOISE_SIZE, &field, rgba0, rgba1)
        }
        TextureKind::GaussianNoise { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let field: Vec<f32> = (0..NOISE_SIZE * NOISE_SIZE)
                .map(|_| (0.5 + 0.2 * gaussian(&mut rng)).clamp(0.0, 1.0))
                .collect();
            fill_field(pixels, NOISE_SIZE, NOISE_SIZE, &field, rgba0, rgba1)
        }
        TextureKind::LowPassNoise { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let field: Vec<f32> = (0..NOISE_SIZE * NOISE_SIZE)
                .map(|_| rng.gen::<f32>())
                .collect();
            let field = box_blur(&field, NOISE_SIZE, LOW_PASS_RADIUS);
            fill_field(pixels, NOISE_SIZE, NOISE_SIZE, &field, rgba0, rgba1)
        }
        TextureKind::G1 => fill_ramp(pixels, GRATING_SAMPLES, 1, g1_level, rgba0, rgba1),
        TextureKind::G2 => fill_ramp(pixels, GRATING_SAMPLES, 1, g2_level, rgba0, rgba1),
        TextureKind::G3 => fill_ramp(pixels, GRATING_SAMPLES, 1, g3_level, rgba0, rgba1),
        TextureKind::Image | TextureKind::TextAtlas => {
            unreachable!("pixel-source kinds are never synthesized")
        }
    }
}

/// Writes `lerp(rgba0, rgba1, level(u, v))` for every pixel of a w x h
/// buffer.
fn fill_ramp(
    pixels: &mut Vec<f32>,
    width: u32,
    height: u32,
    level: impl Fn(f32, f32) -> f32,
    rgba0: Color,
    rgba1: Color,
) -> (u32, u32) {
    pixels.resize((4 * width * height) as usize, 0.0);
    for y in 0..height {
        for x in 0..width {
            let u = x as f32 / width as f32;
            let v = y as f32 / height as f32;
            let c = rgba0.lerp(rgba1, level(u, v));
            let i = 4 * (y * width + x) as usize;
            pixels[i..i + 4].copy_from_slice(&c.to_array());
        }
    }
    (width, height)
}

fn fill_field(
    pixels: &mut Vec<f32>,
    width: u32,
    height: u32,
    field: &[f32],
    rgba0: Color,
    rgba1: Color,
) -> (u32, u32) {
    pixels.resize((4 * width * height) as usize, 0.0);
    for (i, &t) in field.iter().enumerate() {
        let c = rgba0.lerp(rgba1, t);
        pixels[4 * i..4 * i + 4].copy_from_slice(&c.to_array());
    }
    (width, height)
}

/// Standard normal deviate via the Box-Muller transform.
fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

/// Separable box blur over a square field with wrapping edges.
fn box_blur(field: &[f32], size: u32, radius: i32) -> Vec<f32> {
    let n = size as i32;
    let norm = (2 * radius + 1) as f32;
    let mut horizontal = vec![0.0f32; field.len()];
    for y in 0..n {
        for x in 0..n {
            let mut sum = 0.0;
            for d in -radius..=radius {
                sum += field[(y * n + (x + d).rem_euclid(n)) as usize];
            }
            horizontal[(y * n + x) as usize] = sum / norm;
        }
    }
    let mut out = vec![0.0f32; field.len()];
    for y in 0..n {
        for x in 0..n {
            let mut sum = 0.0;
            for d in -radius..=radius {
                sum += horizontal[((y + d).rem_euclid(n) * n + x) as usize];
            }
            out[(y * n + x) as usize] = sum / norm;
        }
    }
    out
}

fn phi(x: f32) -> f32 {
    (-x * x / 2.0).exp()
}

fn g1_level(u: f32, _v: f32) -> f32 {
    let scale = 2.0 * (-0.5f32).exp();
    let x = 8.0 * u - 4.0;
    0.5 - x * phi(x) / scale
}

fn g2_level(u: f32, _v: f32) -> f32 {
    let scale = 2.0 * phi(3.0f32.sqrt()) + 1.0;
    let x = 8.0 * u - 4.0;
    (1.0 + (x * x - 1.0) * phi(x)) / scale
}

fn g3_level(u: f32, _v: f32) -> f32 {
    let xmin = (3.0f32 - 6.0f32.sqrt()).sqrt();
    let scale = 2.0 * (3.0 * xmin - xmin.powi(3)) * phi(xmin);
    let x = 8.0 * u - 4.0;
    0.5 + (3.0 * x - x.powi(3)) * phi(x) / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const PARAMETRIC_KINDS: [TextureKind; 10] = [
        TextureKind::Flat,
        TextureKind::Sine,
        TextureKind::SquareSine,
        TextureKind::Checkerboard { cells: 8 },
        TextureKind::UniformNoise { seed: 7 },
        TextureKind::GaussianNoise { seed: 7 },
        TextureKind::LowPassNoise { seed: 7 },
        TextureKind::G1,
        TextureKind::G2,
        TextureKind::G3,
    ];

    #[test]
    fn recoloring_matches_reconstruction() {
        for kind in PARAMETRIC_KINDS {
            let mut recolored = Texture::new(kind, Color::BLACK, Color::WHITE).unwrap();
            recolored.set_colors(Color::RED, Color::BLUE);
            let fresh = Texture::new(kind, Color::RED, Color::BLUE).unwrap();
            assert_eq!(recolored.pixels(), fresh.pixels(), "{kind:?} differs");
            assert_eq!(recolored.width(), fresh.width());
            assert_eq!(recolored.height(), fresh.height());
        }
    }

    #[test]
    fn sine_extremes_at_zero_and_half() {
        let texture = Texture::new(TextureKind::Sine, Color::BLACK, Color::WHITE).unwrap();
        let white = texture.sample(0.0, 0.0);
        let black = texture.sample(0.5, 0.0);
        assert_abs_diff_eq!(white.r, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(black.r, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn square_sine_is_binary() {
        let texture = Texture::new(TextureKind::SquareSine, Color::BLACK, Color::WHITE).unwrap();
        for x in 0..GRATING_SAMPLES {
            let c = texture.sample(x as f32 / GRATING_SAMPLES as f32, 0.0);
            assert!(c.r == 0.0 || c.r == 1.0);
        }
    }

    #[test]
    fn noise_is_reproducible_per_seed() {
        for kind in [
            TextureKind::UniformNoise { seed: 42 },
            TextureKind::GaussianNoise { seed: 42 },
            TextureKind::LowPassNoise { seed: 42 },
        ] {
            let a = Texture::new(kind, Color::BLACK, Color::WHITE).unwrap();
            let b = Texture::new(kind, Color::BLACK, Color::WHITE).unwrap();
            assert_eq!(a.pixels(), b.pixels());
        }
        let a = Texture::new(TextureKind::UniformNoise { seed: 1 }, Color::BLACK, Color::WHITE)
            .unwrap();
        let b = Texture::new(TextureKind::UniformNoise { seed: 2 }, Color::BLACK, Color::WHITE)
            .unwrap();
        assert_ne!(a.pixels(), b.pixels());
    }

    #[test]
    fn noise_variants_have_distinct_profiles() {
        let sample_levels = |kind| {
            let t = Texture::new(kind, Color::BLACK, Color::WHITE).unwrap();
            t.pixels().chunks(4).map(|p| p[0]).collect::<Vec<f32>>()
        };
        let uniform = sample_levels(TextureKind::UniformNoise { seed: 5 });
        let gaussian = sample_levels(TextureKind::GaussianNoise { seed: 5 });
        let low_pass = sample_levels(TextureKind::LowPassNoise { seed: 5 });

        let variance = |v: &[f32]| {
            let mean = v.iter().sum::<f32>() / v.len() as f32;
            v.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / v.len() as f32
        };
        // uniform on [0,1) has variance 1/12; the filtered field is much
        // smoother and the gaussian sits in between
        assert!(variance(&low_pass) < variance(&gaussian));
        assert!(variance(&gaussian) < variance(&uniform) + 0.01);
        assert_abs_diff_eq!(variance(&uniform), 1.0 / 12.0, epsilon = 0.01);
    }

    #[test]
    fn checkerboard_alternates() {
        let texture =
            Texture::new(TextureKind::Checkerboard { cells: 4 }, Color::BLACK, Color::WHITE)
                .unwrap();
        assert_eq!(texture.width(), 4);
        assert_eq!(texture.sample(0.0, 0.0), Color::BLACK);
        assert_eq!(texture.sample(0.3, 0.0), Color::WHITE);
        assert_eq!(texture.sample(0.3, 0.3), Color::BLACK);
    }

    #[test]
    fn mip_count_follows_log2() {
        assert_eq!(mip_count(1, 1), 1);
        assert_eq!(mip_count(2, 1), 2);
        assert_eq!(mip_count(512, 1), 10);
        assert_eq!(mip_count(128, 128), 8);
        assert_eq!(mip_count(1024, 512), 11);
    }

    #[test]
    fn mip_chain_has_declared_levels() {
        let texture = Texture::new(TextureKind::Checkerboard { cells: 8 }, Color::BLACK, Color::WHITE)
            .unwrap();
        let chain = texture.mip_chain_rgba8();
        assert_eq!(chain.len(), texture.mip_levels() as usize);
        assert_eq!(chain.first().unwrap().0, 8);
        assert_eq!(chain.last().unwrap().0, 1);
        // the coarsest level of an even checkerboard averages to mid-gray
        let (_, _, coarsest) = chain.last().unwrap();
        assert!((coarsest[0] as i32 - 127).abs() <= 1);
    }

    #[test]
    fn pixel_source_kinds_reject_color_construction() {
        assert!(matches!(
            Texture::parametric(TextureKind::Image),
            Err(EngineError::InvalidParameter(_))
        ));
        assert!(matches!(
            Texture::new(TextureKind::TextAtlas, Color::BLACK, Color::WHITE),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn missing_image_is_a_resource_error() {
        assert!(matches!(
            Texture::from_file("/nonexistent/stimulus.png"),
            Err(EngineError::ResourceLoad(_))
        ));
    }

    #[test]
    fn external_pixel_buffer_is_validated() {
        assert!(Texture::from_pixels(vec![0.0; 16], 2, 2).is_ok());
        assert!(matches!(
            Texture::from_pixels(vec![0.0; 12], 2, 2),
            Err(EngineError::InvalidParameter(_))
        ));
    }
}
