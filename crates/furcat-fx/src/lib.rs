//! Post-processing for furcat: bloom, film grain and ACES tonemapping over an
//! HDR scene texture.

pub mod effect;
pub mod effects;
pub mod fullscreen;

use effect::PostProcessEffect;
use effects::{Bloom, FilmGrain, Tonemapping};

/// HDR texture format used internally by the post-processing chain.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Format of the chain's final output. Values are already sRGB-encoded.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Values the application pushes into the chain before each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FxSettings {
    /// Bloom is skipped entirely at 0
    pub bloom_strength: f32,
    pub film_enabled: bool,
    pub exposure: f32,
    /// Seconds, drives the grain noise
    pub time: f32,
}

impl Default for FxSettings {
    fn default() -> Self {
        Self {
            bloom_strength: 0.0,
            film_enabled: false,
            exposure: 1.0,
            time: 0.0,
        }
    }
}

/// Where one enabled pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    Ping,
    Pong,
    Output,
}

/// Targets for `enabled` consecutive passes: ping-pong, the last one to the output.
pub fn plan_targets(enabled: usize) -> Vec<PassTarget> {
    (0..enabled)
        .map(|i| {
            if i + 1 == enabled {
                PassTarget::Output
            } else if i % 2 == 0 {
                PassTarget::Ping
            } else {
                PassTarget::Pong
            }
        })
        .collect()
}

/// Manages a sequence of post-processing effects with ping-pong textures.
pub struct PostProcessChain {
    effects: Vec<Box<dyn PostProcessEffect>>,
    ping: wgpu::Texture,
    pong: wgpu::Texture,
    width: u32,
    height: u32,
}

impl PostProcessChain {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let ping = create_pp_texture(device, width, height, "fx_ping");
        let pong = create_pp_texture(device, width, height, "fx_pong");

        Self {
            effects: Vec::new(),
            ping,
            pong,
            width,
            height,
        }
    }

    /// Bloom, then film grain, then tonemapping into `OUTPUT_FORMAT`.
    pub fn standard(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let mut chain = Self::new(device, width, height);
        chain.push(Box::new(Bloom::new(device, HDR_FORMAT, width, height)));
        chain.push(Box::new(FilmGrain::new(device, HDR_FORMAT)));
        chain.push(Box::new(Tonemapping::new(device, OUTPUT_FORMAT)));
        chain
    }

    pub fn push(&mut self, effect: Box<dyn PostProcessEffect>) {
        self.effects.push(effect);
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.ping = create_pp_texture(device, width, height, "fx_ping");
        self.pong = create_pp_texture(device, width, height, "fx_pong");
        for effect in &mut self.effects {
            effect.resize(device, width, height);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// First effect of type `T`, if the chain holds one.
    pub fn effect_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.effects
            .iter_mut()
            .find_map(|e| e.as_any_mut().downcast_mut::<T>())
    }

    /// Apply per-frame settings to the effects that understand them.
    pub fn configure(&mut self, settings: &FxSettings) {
        if let Some(bloom) = self.effect_mut::<Bloom>() {
            bloom.strength = settings.bloom_strength;
            bloom.enabled = settings.bloom_strength > 0.0;
        }
        if let Some(grain) = self.effect_mut::<FilmGrain>() {
            grain.enabled = settings.film_enabled;
            grain.time = settings.time;
        }
        if let Some(tonemap) = self.effect_mut::<Tonemapping>() {
            tonemap.exposure = settings.exposure;
        }
    }

    pub fn set_params(&mut self, queue: &wgpu::Queue) {
        for effect in &mut self.effects {
            effect.set_params(queue);
        }
    }

    /// Run all enabled effects. Reads from `scene_view`, writes final result to `output_view`.
    pub fn run(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        scene_view: &wgpu::TextureView,
        output_view: &wgpu::TextureView,
    ) {
        let enabled: Vec<&dyn PostProcessEffect> = self
            .effects
            .iter()
            .filter(|e| e.enabled())
            .map(|e| e.as_ref())
            .collect();

        let ping_view = self.ping.create_view(&Default::default());
        let pong_view = self.pong.create_view(&Default::default());

        let mut input = scene_view;
        for (effect, target) in enabled.iter().zip(plan_targets(enabled.len())) {
            let output = match target {
                PassTarget::Ping => &ping_view,
                PassTarget::Pong => &pong_view,
                PassTarget::Output => output_view,
            };
            effect.apply(device, encoder, input, output);
            input = output;
        }
    }

    /// Names of the effects that will run, in order.
    pub fn enabled_names(&self) -> Vec<&str> {
        self.effects
            .iter()
            .filter(|e| e.enabled())
            .map(|e| e.name())
            .collect()
    }
}

fn create_pp_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    label: &str,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HDR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_single_pass_writes_output() {
        assert_eq!(plan_targets(1), vec![PassTarget::Output]);
        assert!(plan_targets(0).is_empty());
    }

    #[test]
    fn test_plan_alternates_ping_pong() {
        assert_eq!(
            plan_targets(3),
            vec![PassTarget::Ping, PassTarget::Pong, PassTarget::Output]
        );
        assert_eq!(
            plan_targets(4),
            vec![
                PassTarget::Ping,
                PassTarget::Pong,
                PassTarget::Ping,
                PassTarget::Output
            ]
        );
    }

    #[test]
    fn test_default_settings_are_neutral() {
        let s = FxSettings::default();
        assert_eq!(s.bloom_strength, 0.0);
        assert!(!s.film_enabled);
        assert_eq!(s.exposure, 1.0);
    }
}
