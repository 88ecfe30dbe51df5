use bytemuck::{Pod, Zeroable};

use crate::effect::PostProcessEffect;
use crate::fullscreen;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FilmGrainParams {
    params: [f32; 4], // noise, scanlines, scanline count, time
}

/// Noise plus horizontal scanlines, blended by `noise_intensity`.
pub struct FilmGrain {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    pub noise_intensity: f32,
    pub scanline_intensity: f32,
    pub scanline_count: f32,
    pub time: f32,
    pub enabled: bool,
}

impl FilmGrain {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = fullscreen::shader_module(
            device,
            "fx_film_grain_shader",
            include_str!("../../shaders/film_grain.wgsl"),
        );

        let size = std::mem::size_of::<FilmGrainParams>() as u64;
        let bind_group_layout =
            fullscreen::texture_uniform_bind_group_layout(device, "fx_film_grain_bgl", size, 0);

        let pipeline = fullscreen::fullscreen_pipeline(
            device,
            "fx_film_grain_pipeline",
            &shader,
            "fs_film_grain",
            format,
            &bind_group_layout,
        );

        Self {
            pipeline,
            bind_group_layout,
            sampler: fullscreen::linear_sampler(device),
            uniform_buffer: fullscreen::uniform_buffer(device, "fx_film_grain_ub", size),
            noise_intensity: 0.15,
            scanline_intensity: 0.2,
            scanline_count: 648.0,
            time: 0.0,
            enabled: false,
        }
    }
}

impl PostProcessEffect for FilmGrain {
    fn set_params(&mut self, queue: &wgpu::Queue) {
        let params = FilmGrainParams {
            params: [
                self.noise_intensity,
                self.scanline_intensity,
                self.scanline_count,
                self.time,
            ],
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
            "fx_film_grain_bg",
            &self.bind_group_layout,
            input,
            &self.sampler,
            &self.uniform_buffer,
            &[],
        );
        fullscreen::fullscreen_pass(
            encoder,
            output,
            &self.pipeline,
            &bind_group,
            "fx_film_grain_pass",
        );
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Film Grain"
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
