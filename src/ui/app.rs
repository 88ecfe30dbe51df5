//! Main egui application with the cat viewport.

use std::sync::Arc;

use eframe::egui;

use crate::avatar::PresentationMode;
use crate::clock::FrameClock;
use crate::config::WindowConfig;
use crate::scene::CatScene;

use super::renderer::{CatRenderer, RendererSink};
use super::viewport::CatViewportCallback;

/// The native egui application window.
pub struct FurcatApp {
    scene: CatScene,
    clock: FrameClock,
    /// GPU renderer (created from wgpu render state)
    renderer: Option<Arc<CatRenderer>>,
    /// Why the renderer is missing, shown in the side panel
    load_error: Option<String>,
}

impl FurcatApp {
    pub fn new(cc: &eframe::CreationContext<'_>, scene: CatScene) -> Self {
        let mut app = Self {
            scene,
            clock: FrameClock::wall(),
            renderer: None,
            load_error: None,
        };
        app.init_renderer(cc);
        app
    }

    fn init_renderer(&mut self, cc: &eframe::CreationContext<'_>) {
        let Some(render_state) = cc.wgpu_render_state.as_ref() else {
            let err = crate::error::RenderError::NoRenderState;
            tracing::error!("{}", err);
            self.load_error = Some(err.to_string());
            return;
        };

        let renderer = CatRenderer::new(
            &render_state.device,
            &render_state.queue,
            render_state.target_format,
            self.scene.model(),
            self.scene.fur(),
            800,
            600,
        );
        self.renderer = Some(Arc::new(renderer));
    }

    /// Launch the native UI window. Blocks until the window is closed.
    pub fn run(scene: CatScene, window: &WindowConfig) -> eframe::Result {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_title(window.title.clone())
                .with_inner_size([window.width as f32, window.height as f32]),
            ..Default::default()
        };

        eframe::run_native(
            crate::NAME,
            options,
            Box::new(move |cc| Ok(Box::new(Self::new(cc, scene)))),
        )
    }

    /// Trigger expressions for freshly pressed keys.
    fn handle_keys(&mut self, ctx: &egui::Context) {
        let keys: Vec<egui::Key> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key,
                        pressed: true,
                        repeat: false,
                        ..
                    } => Some(*key),
                    _ => None,
                })
                .collect()
        });

        for key in keys {
            self.scene.handle_key(key.name());
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("furcat");
        ui.separator();

        if ui.button(self.scene.presentation().label()).clicked() {
            self.scene.toggle_horror();
        }

        ui.separator();
        ui.label("Expressions");

        let buttons: Vec<(String, String)> = self
            .scene
            .driver()
            .table()
            .iter()
            .map(|def| (def.name.clone(), def.key.clone()))
            .collect();
        for (name, key) in buttons {
            if ui.button(format!("{} ({})", name, key)).clicked() {
                self.scene.trigger_expression(&name);
            }
        }

        ui.separator();
        self.status(ui);
    }

    fn status(&self, ui: &mut egui::Ui) {
        let mode = match self.scene.presentation().mode() {
            PresentationMode::Normal => "normal",
            PresentationMode::Horror => "horror",
        };
        ui.label(format!("Mode: {}", mode));

        let active = self.scene.driver().active_channels();
        if active.is_empty() {
            ui.label("Active: none");
        }
        for channel in active {
            ui.label(format!("{}: {:.2}", channel, self.scene.channel_weight(&channel)));
        }

        match self.scene.fur() {
            Some(fur) => ui.label(format!("Fur shells: {}", fur.shell_count())),
            None => ui.label("Fur: off"),
        };

        if self.scene.model().is_placeholder {
            ui.colored_label(egui::Color32::YELLOW, "Placeholder body");
        }

        if let Some(renderer) = &self.renderer {
            let effects = renderer.active_effects();
            ui.label(format!("Post: {}", effects.join(" > ")));
        }

        if let Some(ref err) = self.load_error {
            ui.separator();
            ui.colored_label(egui::Color32::RED, err);
        }
    }
}

impl eframe::App for FurcatApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        egui::SidePanel::left("controls").show(ctx, |ui| {
            self.controls(ui);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::default())
            .show(ctx, |ui| {
                let available_size = ui.available_size();
                let (rect, response) =
                    ui.allocate_exact_size(available_size, egui::Sense::click_and_drag());

                if response.dragged() {
                    let delta = response.drag_delta();
                    self.scene.camera_mut().rotate(delta.x, delta.y);
                }
                if response.hovered() {
                    let scroll = ui.input(|i| i.smooth_scroll_delta.y);
                    if scroll != 0.0 {
                        self.scene.camera_mut().zoom(scroll);
                    }
                }

                let Some(renderer) = &self.renderer else {
                    ui.centered_and_justified(|ui| ui.label("Renderer unavailable"));
                    return;
                };

                ui.painter().add(eframe::egui_wgpu::Callback::new_paint_callback(
                    rect,
                    CatViewportCallback::new(renderer.clone(), rect.size()),
                ));
            });

        // Advance the scene and hand the frame to the renderer
        let time = self.clock.tick();
        self.scene.tick(time);
        if let (Some(renderer), Some(render_state)) = (&self.renderer, frame.wgpu_render_state()) {
            let mut sink = RendererSink::new(renderer, &render_state.queue);
            if let Err(e) = self.scene.frame(&mut sink) {
                tracing::warn!("Frame failed: {}", e);
            }
        }

        // Repaint continuously for animation
        ctx.request_repaint();
    }
}
