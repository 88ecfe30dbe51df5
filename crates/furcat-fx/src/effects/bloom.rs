use bytemuck::{Pod, Zeroable};

use crate::effect::PostProcessEffect;
use crate::fullscreen;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BloomParams {
    params: [f32; 4],
}

const PARAMS_SIZE: u64 = std::mem::size_of::<BloomParams>() as u64;

/// Width of the luminance ramp above the threshold.
pub const SMOOTH_WIDTH: f32 = 0.01;

/// Half-resolution extent used for the blur targets.
pub fn half_extent(size: u32) -> u32 {
    (size / 2).max(1)
}

/// Blur tap spacing, in half-res texels, for a bloom radius in [0, 1].
pub fn blur_spread(radius: f32) -> f32 {
    1.0 + radius.clamp(0.0, 1.0) * 2.0
}

/// Bright-pass, separable blur at half resolution, additive combine.
pub struct Bloom {
    threshold_pipeline: wgpu::RenderPipeline,
    threshold_bgl: wgpu::BindGroupLayout,
    threshold_ub: wgpu::Buffer,
    // Shared by the horizontal and vertical passes
    blur_pipeline: wgpu::RenderPipeline,
    blur_bgl: wgpu::BindGroupLayout,
    blur_ub_h: wgpu::Buffer,
    blur_ub_v: wgpu::Buffer,
    combine_pipeline: wgpu::RenderPipeline,
    combine_bgl: wgpu::BindGroupLayout,
    combine_ub: wgpu::Buffer,
    half_a: wgpu::Texture,
    half_b: wgpu::Texture,
    half_width: u32,
    half_height: u32,
    sampler: wgpu::Sampler,
    format: wgpu::TextureFormat,
    /// Luminance above which pixels bloom
    pub threshold: f32,
    /// 0..1, widens the blur
    pub radius: f32,
    pub strength: f32,
    pub enabled: bool,
}

impl Bloom {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let sampler = fullscreen::linear_sampler(device);

        let threshold_shader = fullscreen::shader_module(
            device,
            "fx_bloom_threshold_shader",
            include_str!("../../shaders/bloom_threshold.wgsl"),
        );
        let threshold_bgl = fullscreen::texture_uniform_bind_group_layout(
            device,
            "fx_bloom_threshold_bgl",
            PARAMS_SIZE,
            0,
        );
        let threshold_pipeline = fullscreen::fullscreen_pipeline(
            device,
            "fx_bloom_threshold_pipeline",
            &threshold_shader,
            "fs_bloom_threshold",
            format,
            &threshold_bgl,
        );

        let blur_shader = fullscreen::shader_module(
            device,
            "fx_bloom_blur_shader",
            include_str!("../../shaders/bloom_blur.wgsl"),
        );
        let blur_bgl =
            fullscreen::texture_uniform_bind_group_layout(device, "fx_bloom_blur_bgl", PARAMS_SIZE, 0);
        let blur_pipeline = fullscreen::fullscreen_pipeline(
            device,
            "fx_bloom_blur_pipeline",
            &blur_shader,
            "fs_bloom_blur",
            format,
            &blur_bgl,
        );

        // Combine reads the scene (0) and the blurred bright pass (3)
        let combine_shader = fullscreen::shader_module(
            device,
            "fx_bloom_combine_shader",
            include_str!("../../shaders/bloom_combine.wgsl"),
        );
        let combine_bgl = fullscreen::texture_uniform_bind_group_layout(
            device,
            "fx_bloom_combine_bgl",
            PARAMS_SIZE,
            1,
        );
        let combine_pipeline = fullscreen::fullscreen_pipeline(
            device,
            "fx_bloom_combine_pipeline",
            &combine_shader,
            "fs_bloom_combine",
            format,
            &combine_bgl,
        );

        let half_width = half_extent(width);
        let half_height = half_extent(height);

        Self {
            threshold_pipeline,
            threshold_bgl,
            threshold_ub: fullscreen::uniform_buffer(device, "fx_bloom_threshold_ub", PARAMS_SIZE),
            blur_pipeline,
            blur_bgl,
            blur_ub_h: fullscreen::uniform_buffer(device, "fx_bloom_blur_h_ub", PARAMS_SIZE),
            blur_ub_v: fullscreen::uniform_buffer(device, "fx_bloom_blur_v_ub", PARAMS_SIZE),
            combine_pipeline,
            combine_bgl,
            combine_ub: fullscreen::uniform_buffer(device, "fx_bloom_combine_ub", PARAMS_SIZE),
            half_a: create_half_texture(device, half_width, half_height, format, "fx_bloom_half_a"),
            half_b: create_half_texture(device, half_width, half_height, format, "fx_bloom_half_b"),
            half_width,
            half_height,
            sampler,
            format,
            threshold: 0.85,
            radius: 0.8,
            strength: 0.0,
            enabled: false,
        }
    }
}

fn create_half_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

impl PostProcessEffect for Bloom {
    fn set_params(&mut self, queue: &wgpu::Queue) {
        let threshold = BloomParams {
            params: [self.threshold, SMOOTH_WIDTH, 0.0, 0.0],
        };
        queue.write_buffer(&self.threshold_ub, 0, bytemuck::bytes_of(&threshold));

        let spread = blur_spread(self.radius);
        let horizontal = BloomParams {
            params: [spread / self.half_width as f32, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.blur_ub_h, 0, bytemuck::bytes_of(&horizontal));
        let vertical = BloomParams {
            params: [0.0, spread / self.half_height as f32, 0.0, 0.0],
        };
        queue.write_buffer(&self.blur_ub_v, 0, bytemuck::bytes_of(&vertical));

        let combine = BloomParams {
            params: [self.strength, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.combine_ub, 0, bytemuck::bytes_of(&combine));
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.half_width = half_extent(width);
        self.half_height = half_extent(height);
        self.half_a = create_half_texture(
            device,
            self.half_width,
            self.half_height,
            self.format,
            "fx_bloom_half_a",
        );
        self.half_b = create_half_texture(
            device,
            self.half_width,
            self.half_height,
            self.format,
            "fx_bloom_half_b",
        );
    }

    fn apply(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
    ) {
        let view_a = self.half_a.create_view(&Default::default());
        let view_b = self.half_b.create_view(&Default::default());

        // input -> half_a
        let bg = fullscreen::texture_uniform_bind_group(
            device,
            "fx_bloom_threshold_bg",
            &self.threshold_bgl,
            input,
            &self.sampler,
            &self.threshold_ub,
            &[],
        );
        fullscreen::fullscreen_pass(encoder, &view_a, &self.threshold_pipeline, &bg, "fx_bloom_threshold_pass");

        // half_a -> half_b
        let bg = fullscreen::texture_uniform_bind_group(
            device,
            "fx_bloom_blur_h_bg",
            &self.blur_bgl,
            &view_a,
            &self.sampler,
            &self.blur_ub_h,
            &[],
        );
        fullscreen::fullscreen_pass(encoder, &view_b, &self.blur_pipeline, &bg, "fx_bloom_blur_h_pass");

        // half_b -> half_a
        let bg = fullscreen::texture_uniform_bind_group(
            device,
            "fx_bloom_blur_v_bg",
            &self.blur_bgl,
            &view_b,
            &self.sampler,
            &self.blur_ub_v,
            &[],
        );
        fullscreen::fullscreen_pass(encoder, &view_a, &self.blur_pipeline, &bg, "fx_bloom_blur_v_pass");

        // input + half_a -> output
        let bg = fullscreen::texture_uniform_bind_group(
            device,
            "fx_bloom_combine_bg",
            &self.combine_bgl,
            input,
            &self.sampler,
            &self.combine_ub,
            &[&view_a],
        );
        fullscreen::fullscreen_pass(encoder, output, &self.combine_pipeline, &bg, "fx_bloom_combine_pass");
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Bloom"
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_extent_never_zero() {
        assert_eq!(half_extent(1280), 640);
        assert_eq!(half_extent(1), 1);
        assert_eq!(half_extent(0), 1);
    }

    #[test]
    fn test_blur_spread_grows_with_radius() {
        assert_eq!(blur_spread(0.0), 1.0);
        assert!((blur_spread(0.8) - 2.6).abs() < 1e-6);
        assert_eq!(blur_spread(5.0), blur_spread(1.0));
    }
}
