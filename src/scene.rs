//! The cat scene and its per-frame update.
//!
//! `CatScene` owns every piece of mutable state. Input handlers and the frame
//! loop borrow it; drawing is delegated to a [`FrameSink`].

use glam::Mat4;
use std::collections::HashMap;

use crate::animation::{AnimationMixer, Pose};
use crate::assets::{EnvironmentLight, SceneAssets};
use crate::avatar::{ExpressionDriver, Presentation, PresentationBundle, PresentationMode, TailSwish};
use crate::camera::OrbitCamera;
use crate::clock::FrameTime;
use crate::config::Config;
use crate::error::Result;
use crate::fur::{generate_shells, FurShells};
use crate::model::CatModel;
use crate::skinning::{compute_world_transforms, mesh_world_transform};

/// Idle camera bob: `sin(t * BOB_RATE) * BOB_AMPLITUDE` per frame.
pub const BOB_RATE: f32 = 0.5;
pub const BOB_AMPLITUDE: f32 = 0.01;
/// Horror camera jitter roll: `sin(t * JITTER_RATE) * JITTER_ROLL`.
pub const JITTER_RATE: f32 = 13.0;
pub const JITTER_ROLL: f32 = 0.004;

/// Everything a sink needs to draw one frame.
pub struct FrameView<'a> {
    pub model: &'a CatModel,
    pub pose: &'a Pose,
    /// World transforms for `pose`
    pub world: &'a [Mat4],
    pub fur: Option<&'a FurShells>,
    /// Placement of the fur shell geometry
    pub fur_transform: Mat4,
    pub camera: &'a OrbitCamera,
    pub bundle: &'a PresentationBundle,
    pub environment: Option<&'a EnvironmentLight>,
    pub elapsed: f32,
}

/// Draws composed frames.
pub trait FrameSink {
    fn draw(&mut self, frame: &FrameView<'_>) -> Result<()>;
}

/// Sink that draws nothing and keeps a few statistics.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSink {
    pub frames: u64,
    pub last_elapsed: f32,
    pub last_roll: f32,
    /// Highest weight seen per morph channel, across all meshes
    pub peak_weights: HashMap<String, f32>,
}

impl FrameSink for HeadlessSink {
    fn draw(&mut self, frame: &FrameView<'_>) -> Result<()> {
        self.frames += 1;
        self.last_elapsed = frame.elapsed;
        self.last_roll = frame.camera.roll;

        for mesh in &frame.model.meshes {
            for (name, &w) in mesh.channels.names().iter().zip(mesh.channels.influences()) {
                let peak = self.peak_weights.entry(name.clone()).or_insert(0.0);
                *peak = peak.max(w);
            }
        }
        Ok(())
    }
}

/// The cat, its fur, expressions, presentation and camera.
pub struct CatScene {
    model: CatModel,
    pose: Pose,
    mixer: AnimationMixer,
    driver: ExpressionDriver,
    tail_swish: Option<TailSwish>,
    presentation: Presentation,
    camera: OrbitCamera,
    fur: Option<FurShells>,
    /// (mesh, primitive) the fur grows on
    fur_anchor: Option<(usize, usize)>,
    environment: Option<EnvironmentLight>,
    elapsed: f32,
}

impl CatScene {
    pub fn new(assets: SceneAssets, config: &Config) -> Result<Self> {
        let SceneAssets {
            mut model,
            pattern,
            environment,
        } = assets;

        let params = config.fur.params()?;
        let table = config.expression_table()?;

        let fur_anchor = model.base_mesh.and_then(|mesh_idx| {
            model.meshes[mesh_idx]
                .primitives
                .iter()
                .position(|p| p.is_drawable())
                .map(|prim_idx| (mesh_idx, prim_idx))
        });
        let fur = match fur_anchor {
            Some((mesh_idx, prim_idx)) => Some(generate_shells(
                &mut model.meshes[mesh_idx].primitives[prim_idx],
                pattern,
                config.fur.shell_count,
                &params,
            )?),
            None => {
                tracing::warn!("No base surface for fur");
                None
            }
        };

        if model.eyes_mesh.is_none() {
            tracing::debug!("No eyes mesh; horror eye glow disabled");
        }
        if model.tail_joint.is_none() {
            tracing::debug!("No tail joint; tail swish disabled");
        }

        let mixer = AnimationMixer::new(model.idle_clip().cloned());
        let pose = Pose::rest(&model.nodes);

        let mut scene = Self {
            model,
            pose,
            mixer,
            driver: ExpressionDriver::new(table),
            tail_swish: None,
            presentation: Presentation::default(),
            camera: OrbitCamera::from_config(&config.camera),
            fur,
            fur_anchor,
            environment,
            elapsed: 0.0,
        };
        scene.set_mode(config.appearance.mode);
        Ok(scene)
    }

    /// Advance all state by one frame.
    pub fn tick(&mut self, time: FrameTime) {
        let t = time.elapsed;
        self.elapsed = t;

        self.mixer.update(time.delta);
        self.mixer.apply(&self.model.nodes, &mut self.pose);

        self.driver.update(t, &mut self.model.meshes);
        if let Some(swish) = self.tail_swish {
            let (rotation, done) = swish.sample(t);
            self.pose.set_rotation(swish.joint, rotation);
            if done {
                self.tail_swish = None;
            }
        }

        self.camera.update();

        if let Some(fur) = &mut self.fur {
            fur.set_time(t);
        }

        self.camera.position.y += (t * BOB_RATE).sin() * BOB_AMPLITUDE;
        self.camera.roll = if self.presentation.is_horror() {
            (t * JITTER_RATE).sin() * JITTER_ROLL
        } else {
            0.0
        };
    }

    /// Hand the current state to `sink`.
    pub fn frame(&self, sink: &mut dyn FrameSink) -> Result<()> {
        let world = compute_world_transforms(&self.model, &self.pose);
        let fur_transform = self.fur_transform(&world);

        sink.draw(&FrameView {
            model: &self.model,
            pose: &self.pose,
            world: &world,
            fur: self.fur.as_ref(),
            fur_transform,
            camera: &self.camera,
            bundle: self.presentation.bundle(),
            environment: self.environment.as_ref(),
            elapsed: self.elapsed,
        })
    }

    /// Tick, then draw.
    pub fn run_frame(&mut self, time: FrameTime, sink: &mut dyn FrameSink) -> Result<()> {
        self.tick(time);
        self.frame(sink)
    }

    /// Shells follow the base mesh: its node transform when unskinned, the
    /// parent of the skinned node otherwise.
    fn fur_transform(&self, world: &[Mat4]) -> Mat4 {
        let Some((mesh_idx, _)) = self.fur_anchor else {
            return self.model.root_transform;
        };
        if !self.model.mesh_skin.contains_key(&mesh_idx) {
            return mesh_world_transform(&self.model, mesh_idx, world);
        }
        self.model.meshes[mesh_idx]
            .node
            .and_then(|node| self.model.nodes[node].parent)
            .and_then(|parent| world.get(parent).copied())
            .unwrap_or(self.model.root_transform)
    }

    /// Trigger the expression bound to `key`. Unmapped keys do nothing.
    pub fn handle_key(&mut self, key: &str) -> Option<String> {
        let name = self.driver.table().for_key(key)?.name.clone();
        self.trigger_expression(&name).then_some(name)
    }

    /// Start an expression envelope and, when the cat has a tail, a swish.
    pub fn trigger_expression(&mut self, name: &str) -> bool {
        if !self.driver.trigger(name, self.elapsed) {
            return false;
        }

        if let Some(joint) = self.model.tail_joint {
            match &mut self.tail_swish {
                Some(swish) => swish.restart(self.elapsed),
                None => {
                    let base = self.pose.rotation(joint).unwrap_or_default();
                    self.tail_swish = Some(TailSwish::new(joint, base, self.elapsed));
                }
            }
        }
        true
    }

    pub fn set_mode(&mut self, mode: PresentationMode) {
        self.presentation.set_mode(mode);
        self.apply_eye_glow();
    }

    pub fn set_horror(&mut self, on: bool) {
        self.set_mode(PresentationMode::from_horror(on));
    }

    pub fn toggle_horror(&mut self) -> PresentationMode {
        let mode = self.presentation.toggle();
        self.apply_eye_glow();
        mode
    }

    fn apply_eye_glow(&mut self) {
        let bundle = *self.presentation.bundle();
        let Some(eyes) = self.model.eyes_mesh else {
            return;
        };
        for prim in &mut self.model.meshes[eyes].primitives {
            prim.material.emissive = bundle.eye_emissive;
            prim.material.emissive_intensity = bundle.eye_emissive_intensity;
        }
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn model(&self) -> &CatModel {
        &self.model
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn fur(&self) -> Option<&FurShells> {
        self.fur.as_ref()
    }

    pub fn driver(&self) -> &ExpressionDriver {
        &self.driver
    }

    /// Current weight of `channel`, the largest across meshes that expose it.
    pub fn channel_weight(&self, channel: &str) -> f32 {
        self.model
            .meshes
            .iter()
            .filter_map(|mesh| mesh.channels.weight(channel))
            .fold(0.0, f32::max)
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_swishing(&self) -> bool {
        self.tail_swish.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::MorphChannels;
    use crate::clock::FrameClock;
    use crate::fur::FurPattern;
    use crate::mesh::{PrimitiveData, SurfaceMaterial, SurfaceMesh};
    use crate::model::{MeshData, ModelStyle, NodeData, Transform};
    use glam::Quat;
    use std::sync::Arc;

    fn assets(model: CatModel) -> SceneAssets {
        SceneAssets {
            model,
            pattern: Arc::new(FurPattern::procedural(8)),
            environment: None,
        }
    }

    fn placeholder_scene() -> CatScene {
        let model = CatModel::placeholder(&ModelStyle::default());
        CatScene::new(assets(model), &Config::default()).unwrap()
    }

    /// Unskinned sphere named "eyes" with a laugh morph, plus a rotated tail node.
    fn tailed_scene() -> CatScene {
        let surface = SurfaceMesh::sphere(0.3, 8, 6);
        let n = surface.vertex_count();
        let mesh = MeshData {
            name: "eyes".into(),
            node: Some(0),
            primitives: vec![PrimitiveData::from_surface(surface, SurfaceMaterial::default())],
            morph_deltas: vec![vec![vec![glam::Vec3::Y * 0.01; n]]],
            channels: MorphChannels::new(vec!["laugh".into()]),
        };
        let tail_rest = Quat::from_rotation_x(0.4);
        let mut model = CatModel::placeholder(&ModelStyle::default());
        model.meshes = vec![mesh];
        model.nodes = vec![
            NodeData::new("body", None, Transform::IDENTITY),
            NodeData::new(
                "tail",
                Some(0),
                Transform {
                    rotation: tail_rest,
                    ..Transform::IDENTITY
                },
            ),
        ];
        model.eyes_mesh = Some(0);
        model.tail_joint = Some(1);
        model.is_placeholder = false;

        CatScene::new(assets(model), &Config::default()).unwrap()
    }

    #[test]
    fn test_placeholder_scene_has_fur() {
        let scene = placeholder_scene();
        let fur = scene.fur().unwrap();
        assert_eq!(fur.shell_count(), 18);
        let base = &scene.model().meshes[0].primitives[0].material;
        assert!(base.transparent);
        assert_eq!(base.opacity, 0.95);
    }

    #[test]
    fn test_roll_is_zero_outside_horror() {
        let mut scene = placeholder_scene();
        let mut clock = FrameClock::fixed(1.0 / 60.0);
        for _ in 0..30 {
            scene.tick(clock.tick());
            assert_eq!(scene.camera().roll, 0.0);
        }

        scene.set_horror(true);
        scene.tick(FrameTime {
            delta: 1.0 / 60.0,
            elapsed: 0.1,
        });
        assert!((scene.camera().roll - (1.3f32).sin() * 0.004).abs() < 1e-7);

        scene.set_horror(false);
        scene.tick(clock.tick());
        assert_eq!(scene.camera().roll, 0.0);
    }

    #[test]
    fn test_fur_follows_unskinned_mesh_node() {
        let surface = SurfaceMesh::sphere(0.3, 8, 6);
        let mesh = MeshData {
            name: "body".into(),
            node: Some(0),
            primitives: vec![PrimitiveData::from_surface(surface, SurfaceMaterial::default())],
            morph_deltas: vec![Vec::new()],
            channels: MorphChannels::empty(),
        };
        let mut model = CatModel::placeholder(&ModelStyle::default());
        model.meshes = vec![mesh];
        model.nodes = vec![NodeData::new(
            "body",
            None,
            Transform {
                translation: glam::Vec3::new(0.0, 0.5, 0.0),
                ..Transform::IDENTITY
            },
        )];
        model.is_placeholder = false;
        let scene = CatScene::new(assets(model), &Config::default()).unwrap();

        let world = compute_world_transforms(scene.model(), scene.pose());
        let fur = scene.fur_transform(&world);
        assert_eq!(fur, mesh_world_transform(scene.model(), 0, &world));

        // Shell vertices land where the drawn body is
        let drawn = crate::skinning::deform_model(scene.model(), &world);
        let base = &scene.model().meshes[0].primitives[0].surface.positions;
        for (local, placed) in base.iter().zip(&drawn[0][0].positions) {
            assert!((fur.transform_point3(*local) - *placed).length() < 1e-5);
        }
        let origin = fur.transform_point3(glam::Vec3::ZERO);
        assert!((origin.y - (0.35 + 0.5)).abs() < 1e-5);
    }

    #[test]
    fn test_camera_bob_applied() {
        let mut scene = placeholder_scene();
        let before = scene.camera().position.y;
        let t = std::f32::consts::PI;
        scene.tick(FrameTime { delta: 0.0, elapsed: t });
        let after = scene.camera().position.y;
        // sin(pi * 0.5) = 1
        assert!((after - before - 0.01).abs() < 1e-5);
    }

    #[test]
    fn test_shell_time_updated() {
        let mut scene = placeholder_scene();
        scene.tick(FrameTime {
            delta: 0.016,
            elapsed: 2.5,
        });
        assert_eq!(scene.fur().unwrap().time(), 2.5);
    }

    #[test]
    fn test_unmapped_key_ignored() {
        let mut scene = placeholder_scene();
        assert_eq!(scene.handle_key("z"), None);
        assert!(scene.driver().active_channels().is_empty());
        assert_eq!(scene.handle_key("q").as_deref(), Some("laugh"));
    }

    #[test]
    fn test_tail_swish_restored_after_duration() {
        let mut scene = tailed_scene();
        let mut clock = FrameClock::fixed(0.05);
        scene.tick(clock.tick());
        let rest = scene.pose().rotation(1).unwrap();

        assert!(scene.trigger_expression("laugh"));
        assert!(scene.is_swishing());

        scene.tick(clock.tick());
        scene.tick(clock.tick());
        assert!(scene.pose().rotation(1).unwrap().angle_between(rest) > 1e-3);

        // 0.6 s swish at 0.05 s steps
        for _ in 0..12 {
            scene.tick(clock.tick());
        }
        assert!(!scene.is_swishing());
        assert_eq!(scene.pose().rotation(1).unwrap(), rest);
    }

    #[test]
    fn test_expression_drives_morph_and_sink() {
        let mut scene = tailed_scene();
        let mut clock = FrameClock::fixed(0.1);
        let mut sink = HeadlessSink::default();

        scene.run_frame(clock.tick(), &mut sink).unwrap();
        scene.handle_key("Q");
        for _ in 0..10 {
            scene.run_frame(clock.tick(), &mut sink).unwrap();
        }

        assert_eq!(sink.frames, 11);
        assert!(sink.peak_weights["laugh"] > 0.9);
        assert_eq!(scene.model().meshes[0].channels.weight("laugh"), Some(0.0));
    }

    #[test]
    fn test_channel_weight_reports_live_envelope() {
        let mut scene = tailed_scene();
        scene.tick(FrameTime { delta: 0.0, elapsed: 1.0 });
        assert!(scene.trigger_expression("laugh"));
        scene.tick(FrameTime { delta: 0.4, elapsed: 1.4 });
        assert!((scene.channel_weight("laugh") - 1.0).abs() < 1e-4);
        assert_eq!(scene.channel_weight("sleepy"), 0.0);
    }

    #[test]
    fn test_horror_lights_eyes() {
        let mut scene = tailed_scene();
        scene.toggle_horror();
        let m = scene.model().meshes[0].primitives[0].material;
        assert_eq!(m.emissive_intensity, 2.0);
        assert_eq!(scene.presentation().label(), "Horror: ON");

        scene.toggle_horror();
        let m = scene.model().meshes[0].primitives[0].material;
        assert_eq!(m.emissive_intensity, 0.0);
    }

    #[test]
    fn test_start_mode_from_config() {
        let mut config = Config::default();
        config.appearance.mode = PresentationMode::Horror;
        let model = CatModel::placeholder(&ModelStyle::default());
        let scene = CatScene::new(assets(model), &config).unwrap();
        assert!(scene.presentation().is_horror());
    }
}
