//! egui-wgpu `CallbackTrait` implementation for the cat viewport.
//!
//! `prepare()` sizes the offscreen targets to the viewport in physical pixels
//! and renders the scene plus post chain; `paint()` blits the result into the
//! egui render pass.

#![cfg(feature = "native-ui")]

use eframe::egui;
use eframe::egui_wgpu;
use eframe::wgpu;
use std::sync::Arc;

use super::renderer::CatRenderer;

/// Paint callback that draws the cat into its egui rect.
pub struct CatViewportCallback {
    pub renderer: Arc<CatRenderer>,
    /// Viewport size in egui points
    pub size: egui::Vec2,
}

impl CatViewportCallback {
    pub fn new(renderer: Arc<CatRenderer>, size: egui::Vec2) -> Self {
        Self { renderer, size }
    }
}

/// Physical pixel size of a viewport, at least 1x1 and at most `max_dim` per side.
pub fn viewport_pixels(size: egui::Vec2, pixels_per_point: f32, max_dim: u32) -> [u32; 2] {
    let to_px = |points: f32| ((points * pixels_per_point).round().max(1.0) as u32).min(max_dim);
    [to_px(size.x), to_px(size.y)]
}

impl egui_wgpu::CallbackTrait for CatViewportCallback {
    fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        _egui_encoder: &mut wgpu::CommandEncoder,
        _callback_resources: &mut egui_wgpu::CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        let [width, height] = viewport_pixels(
            self.size,
            screen_descriptor.pixels_per_point,
            device.limits().max_texture_dimension_2d,
        );
        self.renderer.resize(device, width, height);
        self.renderer.render_offscreen(device, queue);
        Vec::new()
    }

    fn paint(
        &self,
        _info: egui::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        _callback_resources: &egui_wgpu::CallbackResources,
    ) {
        self.renderer.blit(render_pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_pixels_scale_with_dpi() {
        let size = egui::vec2(400.0, 300.0);
        assert_eq!(viewport_pixels(size, 1.0, 8192), [400, 300]);
        assert_eq!(viewport_pixels(size, 2.0, 8192), [800, 600]);
        assert_eq!(viewport_pixels(size, 1.25, 8192), [500, 375]);
    }

    #[test]
    fn test_viewport_pixels_never_empty() {
        assert_eq!(viewport_pixels(egui::vec2(0.0, -5.0), 2.0, 8192), [1, 1]);
    }

    #[test]
    fn test_viewport_pixels_clamped_to_device_limit() {
        assert_eq!(viewport_pixels(egui::vec2(5000.0, 100.0), 2.0, 8192), [8192, 200]);
    }
}
