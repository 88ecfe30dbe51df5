//! Keyframe clips and a single-clip looping mixer.
//!
//! The mixer rebuilds the pose from rest every frame and overlays the clip's
//! sampled channels, so anything written into the pose afterwards (the tail
//! swish) only lasts for that frame.

use glam::{Mat4, Quat, Vec3};

use crate::model::{NodeData, Transform};

/// Keyframe interpolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

/// Keyframe values for one animated property.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

impl ChannelValues {
    fn len(&self) -> usize {
        match self {
            Self::Translation(v) | Self::Scale(v) => v.len(),
            Self::Rotation(v) => v.len(),
        }
    }
}

/// One node property driven over time.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationChannel {
    pub node: usize,
    pub times: Vec<f32>,
    pub values: ChannelValues,
    pub interpolation: Interpolation,
}

impl AnimationChannel {
    /// Keyframe pair and blend factor for time `t`.
    fn locate(&self, t: f32) -> Option<(usize, usize, f32)> {
        let count = self.times.len().min(self.values.len());
        if count == 0 {
            return None;
        }
        let times = &self.times[..count];

        if t <= times[0] {
            return Some((0, 0, 0.0));
        }
        if t >= times[count - 1] {
            return Some((count - 1, count - 1, 0.0));
        }

        let next = times.partition_point(|&k| k <= t);
        let prev = next - 1;
        let span = times[next] - times[prev];
        let f = if span > 0.0 { (t - times[prev]) / span } else { 0.0 };

        match self.interpolation {
            Interpolation::Step => Some((prev, prev, 0.0)),
            Interpolation::Linear => Some((prev, next, f)),
        }
    }

    /// Write the sampled value at `t` into `target`.
    pub fn sample_into(&self, t: f32, target: &mut Transform) {
        let Some((a, b, f)) = self.locate(t) else {
            return;
        };
        match &self.values {
            ChannelValues::Translation(v) => target.translation = v[a].lerp(v[b], f),
            ChannelValues::Rotation(v) => target.rotation = v[a].slerp(v[b], f).normalize(),
            ChannelValues::Scale(v) => target.scale = v[a].lerp(v[b], f),
        }
    }
}

/// A named set of channels.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<AnimationChannel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<AnimationChannel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.times.last().copied())
            .fold(0.0f32, f32::max);
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }

    /// Index of the clip to loop: the first whose name contains "idle", else the first.
    pub fn select_idle(clips: &[AnimationClip]) -> Option<usize> {
        if clips.is_empty() {
            return None;
        }
        clips
            .iter()
            .position(|c| c.name.to_lowercase().contains("idle"))
            .or(Some(0))
    }
}

/// Per-node local transforms for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub locals: Vec<Transform>,
}

impl Pose {
    pub fn rest(nodes: &[NodeData]) -> Self {
        Self {
            locals: nodes.iter().map(|n| n.rest).collect(),
        }
    }

    /// Reset every node to its rest transform.
    pub fn reset(&mut self, nodes: &[NodeData]) {
        self.locals.clear();
        self.locals.extend(nodes.iter().map(|n| n.rest));
    }

    pub fn rotation(&self, node: usize) -> Option<Quat> {
        self.locals.get(node).map(|t| t.rotation)
    }

    pub fn set_rotation(&mut self, node: usize, rotation: Quat) {
        if let Some(t) = self.locals.get_mut(node) {
            t.rotation = rotation;
        }
    }

    pub fn local_matrix(&self, node: usize) -> Mat4 {
        self.locals
            .get(node)
            .map(Transform::to_mat4)
            .unwrap_or(Mat4::IDENTITY)
    }
}

/// Loops one clip over the rest pose.
#[derive(Debug, Clone, Default)]
pub struct AnimationMixer {
    clip: Option<AnimationClip>,
    time: f32,
}

impl AnimationMixer {
    pub fn new(clip: Option<AnimationClip>) -> Self {
        if let Some(clip) = &clip {
            tracing::info!("Playing animation '{}' ({:.2}s)", clip.name, clip.duration);
        }
        Self { clip, time: 0.0 }
    }

    pub fn clip(&self) -> Option<&AnimationClip> {
        self.clip.as_ref()
    }

    /// Local clip time in seconds, wrapped to the clip duration.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn update(&mut self, delta: f32) {
        let Some(clip) = &self.clip else {
            return;
        };
        self.time += delta.max(0.0);
        if clip.duration > 0.0 {
            self.time %= clip.duration;
        } else {
            self.time = 0.0;
        }
    }

    /// Rebuild `pose` from rest and apply the clip at the current time.
    pub fn apply(&self, nodes: &[NodeData], pose: &mut Pose) {
        pose.reset(nodes);
        let Some(clip) = &self.clip else {
            return;
        };
        for channel in &clip.channels {
            if let Some(local) = pose.locals.get_mut(channel.node) {
                channel.sample_into(self.time, local);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<NodeData> {
        vec![
            NodeData::new("root", None, Transform::IDENTITY),
            NodeData::new("tail", Some(0), Transform::IDENTITY),
        ]
    }

    fn spin_clip(interpolation: Interpolation) -> AnimationClip {
        AnimationClip::new(
            "Idle",
            vec![AnimationChannel {
                node: 1,
                times: vec![0.0, 2.0],
                values: ChannelValues::Rotation(vec![
                    Quat::IDENTITY,
                    Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
                ]),
                interpolation,
            }],
        )
    }

    #[test]
    fn test_clip_duration() {
        assert_eq!(spin_clip(Interpolation::Linear).duration, 2.0);
        assert_eq!(AnimationClip::new("empty", Vec::new()).duration, 0.0);
    }

    #[test]
    fn test_select_idle() {
        let clips = vec![
            AnimationClip::new("Walk", Vec::new()),
            AnimationClip::new("Cat_IDLE_01", Vec::new()),
            AnimationClip::new("idle2", Vec::new()),
        ];
        assert_eq!(AnimationClip::select_idle(&clips), Some(1));
        assert_eq!(AnimationClip::select_idle(&clips[..1]), Some(0));
        assert_eq!(AnimationClip::select_idle(&[]), None);
    }

    #[test]
    fn test_linear_rotation_midpoint() {
        let nodes = nodes();
        let mut mixer = AnimationMixer::new(Some(spin_clip(Interpolation::Linear)));
        let mut pose = Pose::rest(&nodes);

        mixer.update(1.0);
        mixer.apply(&nodes, &mut pose);

        let expected = Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);
        assert!(pose.rotation(1).unwrap().angle_between(expected) < 1e-4);
        assert_eq!(pose.rotation(0), Some(Quat::IDENTITY));
    }

    #[test]
    fn test_step_holds_previous_key() {
        let nodes = nodes();
        let mut mixer = AnimationMixer::new(Some(spin_clip(Interpolation::Step)));
        let mut pose = Pose::rest(&nodes);

        mixer.update(1.9);
        mixer.apply(&nodes, &mut pose);
        assert!(pose.rotation(1).unwrap().angle_between(Quat::IDENTITY) < 1e-6);
    }

    #[test]
    fn test_mixer_loops() {
        let mut mixer = AnimationMixer::new(Some(spin_clip(Interpolation::Linear)));
        mixer.update(1.5);
        mixer.update(1.0);
        assert!((mixer.time() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_apply_rebuilds_from_rest() {
        let nodes = nodes();
        let mixer = AnimationMixer::new(None);
        let mut pose = Pose::rest(&nodes);
        pose.set_rotation(1, Quat::from_rotation_x(1.0));

        mixer.apply(&nodes, &mut pose);
        assert_eq!(pose, Pose::rest(&nodes));
    }

    #[test]
    fn test_channel_for_missing_node_is_ignored() {
        let nodes = nodes();
        let mut clip = spin_clip(Interpolation::Linear);
        clip.channels[0].node = 7;
        let mixer = AnimationMixer::new(Some(clip));
        let mut pose = Pose::rest(&nodes);
        mixer.apply(&nodes, &mut pose);
        assert_eq!(pose, Pose::rest(&nodes));
    }
}
