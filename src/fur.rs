//! Shell-based fur.
//!
//! The base surface is cloned once and drawn N more times, each copy pushed
//! a little further along its normals and made a little more transparent.
//! The functions here are the CPU reference of `ui/fur.wgsl`.

use glam::{Vec2, Vec3};
use image::GenericImageView;
use std::path::Path;
use std::sync::Arc;

use crate::color::{srgb_to_linear, Rgb};
use crate::error::{AssetError, FurError};
use crate::mesh::{PrimitiveData, SurfaceMesh};

/// Side length of the generated fallback pattern.
pub const PROCEDURAL_PATTERN_SIZE: u32 = 256;

/// Shader parameters shared by every shell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FurParams {
    /// Distance the outermost shell sits from the surface
    pub extrude: f32,
    /// Pattern UV repeat
    pub tile: f32,
    pub wind: Vec2,
    pub strength: f32,
    pub tint: Rgb,
    /// How far the white base color moves toward `tint`
    pub tint_mix: f32,
    /// Fragments below this alpha are discarded
    pub alpha_cutoff: f32,
    /// Opacity the base surface is given once shells exist
    pub base_opacity: f32,
}

impl Default for FurParams {
    fn default() -> Self {
        Self {
            extrude: 0.02,
            tile: 4.0,
            wind: Vec2::new(0.4, 0.2),
            strength: 0.006,
            tint: Rgb::from_hex(0xffd54f),
            tint_mix: 0.65,
            alpha_cutoff: 0.02,
            base_opacity: 0.95,
        }
    }
}

/// RGBA8 fur pattern, stored as sRGB like any color texture.
#[derive(Debug, Clone, PartialEq)]
pub struct FurPattern {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// True when the pattern was generated rather than loaded
    pub procedural: bool,
}

impl FurPattern {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| AssetError::TextureLoad(format!("{}: {}", path.display(), e)))?;
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(AssetError::TextureLoad(format!(
                "{}: empty image",
                path.display()
            )));
        }

        Ok(Self {
            width,
            height,
            pixels: img.to_rgba8().into_raw(),
            procedural: false,
        })
    }

    /// Deterministic strand noise: sparse bright strands over a dim underlayer.
    pub fn procedural(size: u32) -> Self {
        let size = size.max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let n = hash2(x, y);
                let strand = if n > 0.55 { 0.55 + (n - 0.55) } else { n * 0.3 };
                let v = (strand.clamp(0.0, 1.0) * 255.0).round() as u8;
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Self {
            width: size,
            height: size,
            pixels,
            procedural: true,
        }
    }

    /// Load `path`, or fall back to the procedural pattern with a warning.
    pub fn load_or_procedural<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(pattern) => {
                tracing::info!(
                    "Loaded fur pattern {} ({}x{})",
                    path.as_ref().display(),
                    pattern.width,
                    pattern.height
                );
                pattern
            }
            Err(e) => {
                tracing::warn!("{}; using procedural fur pattern", e);
                Self::procedural(PROCEDURAL_PATTERN_SIZE)
            }
        }
    }

    /// Nearest-texel lookup with repeat wrapping, returned in linear space.
    ///
    /// Alpha is not color data and is returned as stored.
    pub fn sample(&self, uv: Vec2) -> [f32; 4] {
        let wrap = |v: f32| v - v.floor();
        let x = ((wrap(uv.x) * self.width as f32) as u32).min(self.width - 1);
        let y = ((wrap(uv.y) * self.height as f32) as u32).min(self.height - 1);
        let i = ((y * self.width + x) * 4) as usize;
        let p = &self.pixels[i..i + 4];
        [
            srgb_to_linear(p[0] as f32 / 255.0),
            srgb_to_linear(p[1] as f32 / 255.0),
            srgb_to_linear(p[2] as f32 / 255.0),
            p[3] as f32 / 255.0,
        ]
    }
}

fn hash2(x: u32, y: u32) -> f32 {
    let mut h = x.wrapping_mul(0x27d4_eb2d) ^ y.wrapping_mul(0x1656_67b1);
    h ^= h >> 15;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    (h & 0x00ff_ffff) as f32 / 0x0100_0000 as f32
}

/// One shell layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shell {
    /// 1-based layer index
    pub layer: u32,
    pub fraction: f32,
    pub offset: f32,
    pub alpha_factor: f32,
    pub sway_scale: f32,
}

impl Shell {
    pub fn new(layer: u32, total: u32, extrude: f32) -> Self {
        let fraction = layer as f32 / total as f32;
        Self {
            layer,
            fraction,
            offset: fraction * extrude,
            alpha_factor: 1.0 - fraction * 0.85,
            sway_scale: 0.3 + fraction,
        }
    }

    /// Vertex position after normal extrusion and wind sway at `time`.
    pub fn displaced_position(&self, position: Vec3, normal: Vec3, time: f32, params: &FurParams) -> Vec3 {
        let pos = position + normal.normalize_or_zero() * self.offset;
        let sway = (time * 1.3 + pos.x * 5.0 + pos.y * 4.5).sin() * 0.2
            + (time * 0.9 + pos.z * 5.5).cos() * 0.2;
        pos + params.wind.extend(0.0) * sway * params.strength * self.sway_scale
    }
}

/// Shell geometry, pattern and per-layer parameters for one base surface.
#[derive(Debug, Clone)]
pub struct FurShells {
    /// Clone of the base surface with recomputed normals
    pub geometry: SurfaceMesh,
    pub pattern: Arc<FurPattern>,
    pub shells: Vec<Shell>,
    pub params: FurParams,
    time: f32,
}

impl FurShells {
    pub fn shell_count(&self) -> u32 {
        self.shells.len() as u32
    }

    /// Shared time uniform.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// Alpha of a fragment on `shell` given a linear pattern texel, or
    /// `None` when the fragment is discarded.
    pub fn fragment_alpha(&self, shell: &Shell, texel: [f32; 4]) -> Option<f32> {
        let alpha = texel[3] * smoothstep(0.05, 1.0, texel[0]) * shell.alpha_factor;
        (alpha >= self.params.alpha_cutoff).then_some(alpha)
    }

    pub fn fragment_color(&self, texel: [f32; 4]) -> Rgb {
        Rgb::WHITE
            .lerp(self.params.tint, self.params.tint_mix)
            .scaled(0.7 + texel[0] * 0.6)
    }

    /// Pattern texel at a surface UV, with tiling applied.
    pub fn sample_pattern(&self, uv: Vec2) -> [f32; 4] {
        self.pattern.sample(uv * self.params.tile)
    }
}

/// Build `shell_count` shells over `base`.
///
/// The base primitive becomes transparent at `params.base_opacity`.
pub fn generate_shells(
    base: &mut PrimitiveData,
    pattern: Arc<FurPattern>,
    shell_count: u32,
    params: &FurParams,
) -> Result<FurShells, FurError> {
    if shell_count == 0 {
        return Err(FurError::InvalidShellCount(shell_count));
    }
    if base.surface.positions.is_empty() {
        return Err(FurError::EmptySurface);
    }

    let mut geometry = base.surface.clone();
    geometry.compute_vertex_normals();
    if geometry.uvs.len() != geometry.positions.len() {
        geometry.uvs = vec![[0.0; 2]; geometry.positions.len()];
    }

    let shells = (1..=shell_count)
        .map(|layer| Shell::new(layer, shell_count, params.extrude))
        .collect();

    base.material.transparent = true;
    base.material.opacity = params.base_opacity;

    tracing::debug!(
        "Generated {} fur shells over {} vertices",
        shell_count,
        geometry.vertex_count()
    );

    Ok(FurShells {
        geometry,
        pattern,
        shells,
        params: *params,
        time: 0.0,
    })
}

/// Hermite smoothstep, as in GLSL/WGSL.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
