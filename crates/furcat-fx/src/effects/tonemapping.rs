use bytemuck::{Pod, Zeroable};

use crate::effect::PostProcessEffect;
use crate::fullscreen;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct TonemapParams {
    params: [f32; 4], // exposure, _pad, _pad, _pad
}

// Column-major, as in tonemapping.wgsl
const ACES_INPUT: [[f32; 3]; 3] = [
    [0.59719, 0.07600, 0.02840],
    [0.35458, 0.90834, 0.13383],
    [0.04823, 0.01566, 0.83777],
];
const ACES_OUTPUT: [[f32; 3]; 3] = [
    [1.60475, -0.10208, -0.00327],
    [-0.53108, 1.10813, -0.07276],
    [-0.07367, -0.00605, 1.07602],
];

fn mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (col, &s) in m.iter().zip(v.iter()) {
        for (o, &c) in out.iter_mut().zip(col.iter()) {
            *o += c * s;
        }
    }
    out
}

fn rrt_odt_fit(v: f32) -> f32 {
    let a = v * (v + 0.0245786) - 0.000090537;
    let b = v * (0.983729 * v + 0.4329510) + 0.238081;
    a / b
}

/// ACES filmic curve on a linear color, matching the shader.
pub fn aces_filmic(color: [f32; 3], exposure: f32) -> [f32; 3] {
    let scaled = color.map(|c| c * exposure / 0.6);
    let fitted = mul(&ACES_INPUT, scaled).map(rrt_odt_fit);
    mul(&ACES_OUTPUT, fitted).map(|c| c.clamp(0.0, 1.0))
}

/// Linear to sRGB transfer, matching the shader.
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// ACES tonemap with exposure, then sRGB encode. Always the last pass.
pub struct Tonemapping {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    pub exposure: f32,
    pub enabled: bool,
}

impl Tonemapping {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = fullscreen::shader_module(
            device,
            "fx_tonemap_shader",
            include_str!("../../shaders/tonemapping.wgsl"),
        );

        let size = std::mem::size_of::<TonemapParams>() as u64;
        let bind_group_layout =
            fullscreen::texture_uniform_bind_group_layout(device, "fx_tonemap_bgl", size, 0);

        let pipeline = fullscreen::fullscreen_pipeline(
            device,
            "fx_tonemap_pipeline",
            &shader,
            "fs_tonemap",
            format,
            &bind_group_layout,
        );

        Self {
            pipeline,
            bind_group_layout,
            sampler: fullscreen::linear_sampler(device),
            uniform_buffer: fullscreen::uniform_buffer(device, "fx_tonemap_ub", size),
            exposure: 1.0,
            enabled: true,
        }
    }
}

impl PostProcessEffect for Tonemapping {
    fn set_params(&mut self, queue: &wgpu::Queue) {
        let params = TonemapParams {
            params: [self.exposure, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&params));
    }

    fn resize(&mut self, _device: &wgpu::Device, _width: u32, _height: u32) {}

    fn apply(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
    ) {
        let bind_group = fullscreen::texture_uniform_bind_group(
            device,
            "fx_tonemap_bg",
            &self.bind_group_layout,
            input,
            &self.sampler,
            &self.uniform_buffer,
            &[],
        );
        fullscreen::fullscreen_pass(encoder, output, &self.pipeline, &bind_group, "fx_tonemap_pass");
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Tonemapping"
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aces_black_stays_black() {
        let out = aces_filmic([0.0; 3], 1.0);
        assert!(out.iter().all(|c| c.abs() < 1e-3));
    }

    #[test]
    fn test_aces_is_monotonic_and_bounded() {
        let mut prev = 0.0;
        for i in 1..=50 {
            let v = i as f32 * 0.2;
            let out = aces_filmic([v; 3], 1.0)[1];
            assert!(out >= prev);
            assert!(out <= 1.0);
            prev = out;
        }
        assert!(aces_filmic([100.0; 3], 1.0)[0] > 0.99);
    }

    #[test]
    fn test_exposure_brightens() {
        let normal = aces_filmic([0.3; 3], 1.0)[0];
        let horror = aces_filmic([0.3; 3], 1.2)[0];
        assert!(horror > normal);
    }

    #[test]
    fn test_srgb_encode_endpoints() {
        assert_eq!(linear_to_srgb(0.0), 0.0);
        assert!((linear_to_srgb(1.0) - 1.0).abs() < 1e-6);
        assert!(linear_to_srgb(0.18) > 0.18);
    }
}
