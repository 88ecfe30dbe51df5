use std::any::Any;

/// A single post-processing effect that reads one texture and writes another.
pub trait PostProcessEffect: Send + Sync {
    /// Upload uniform data for the next `apply`.
    fn set_params(&mut self, queue: &wgpu::Queue);

    /// Recreate internal textures after a viewport resize.
    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32);

    /// Encode the effect's passes: read `input`, write `output`.
    fn apply(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
    );

    fn enabled(&self) -> bool;

    /// Display name for the status panel.
    fn name(&self) -> &str;

    /// Downcast support so the chain can configure concrete effects.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
