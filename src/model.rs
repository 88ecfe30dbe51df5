//! glTF cat model loader using the `gltf` crate.
//!
//! Extracts meshes, per-mesh morph dictionaries and position deltas, the node
//! hierarchy, skins, and animation clips. Falls back to a procedural sphere
//! when the file cannot be used.

use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::animation::{AnimationChannel, AnimationClip, ChannelValues, Interpolation};
use crate::avatar::morph::{MorphChannels, MorphTarget};
use crate::color::Rgb;
use crate::error::AssetError;
use crate::mesh::{PrimitiveData, SurfaceMaterial, SurfaceMesh};

/// Local translation, rotation and scale of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One scene graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub name: String,
    pub parent: Option<usize>,
    pub rest: Transform,
}

impl NodeData {
    pub fn new(name: impl Into<String>, parent: Option<usize>, rest: Transform) -> Self {
        Self {
            name: name.into(),
            parent,
            rest,
        }
    }
}

pub struct SkinData {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// All geometry data for one mesh (potentially multiple primitives).
pub struct MeshData {
    /// Node name if the mesh is instanced by a named node, else the mesh name
    pub name: String,
    /// First node that instances this mesh
    pub node: Option<usize>,
    pub primitives: Vec<PrimitiveData>,
    /// morph_deltas[prim_idx][target_idx] = per-vertex position deltas
    pub morph_deltas: Vec<Vec<Vec<Vec3>>>,
    pub channels: MorphChannels,
}

impl MorphTarget for MeshData {
    fn morph_index(&self, name: &str) -> Option<usize> {
        self.channels.morph_index(name)
    }

    fn set_morph_weight(&mut self, index: usize, weight: f32) {
        self.channels.set_morph_weight(index, weight);
    }
}

/// Look of the cat that overrides whatever the file specifies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelStyle {
    pub coat_color: Rgb,
    pub roughness: f32,
    pub metalness: f32,
    /// Uniform scale of the loaded model
    pub scale: f32,
    pub placeholder_radius: f32,
    pub placeholder_segments: u32,
    /// Height of the placeholder's centre above the ground
    pub placeholder_height: f32,
}

impl Default for ModelStyle {
    fn default() -> Self {
        Self {
            coat_color: Rgb::from_hex(0xffe066),
            roughness: 0.6,
            metalness: 0.0,
            scale: 0.8,
            placeholder_radius: 0.35,
            placeholder_segments: 48,
            placeholder_height: 0.35,
        }
    }
}

impl ModelStyle {
    fn material(&self) -> SurfaceMaterial {
        SurfaceMaterial::coat(self.coat_color, self.roughness, self.metalness)
    }
}

/// A loaded cat ready for CPU skinning and GPU rendering.
pub struct CatModel {
    pub meshes: Vec<MeshData>,
    pub nodes: Vec<NodeData>,
    pub skins: Vec<SkinData>,
    /// Which skin each mesh uses: mesh_index → skin_index
    pub mesh_skin: HashMap<usize, usize>,
    pub animations: Vec<AnimationClip>,
    /// First mesh with drawable geometry; the fur grows on it
    pub base_mesh: Option<usize>,
    pub eyes_mesh: Option<usize>,
    pub tail_joint: Option<usize>,
    /// Applied above every root node
    pub root_transform: Mat4,
    pub is_placeholder: bool,
    pub source: Option<PathBuf>,
}

impl CatModel {
    /// Load a glTF/GLB file and extract all data needed for rendering.
    pub fn load<P: AsRef<Path>>(path: P, style: &ModelStyle) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let (document, buffers, _images) = gltf::import(path)
            .map_err(|e| AssetError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        let buf = &buffers;

        // Nodes with parent links and rest transforms
        let node_count = document.nodes().count();
        let mut parents = vec![None; node_count];
        for node in document.nodes() {
            for child in node.children() {
                parents[child.index()] = Some(node.index());
            }
        }
        let nodes: Vec<NodeData> = document
            .nodes()
            .map(|node| {
                let (t, r, s) = node.transform().decomposed();
                NodeData::new(
                    node.name().unwrap_or_default(),
                    parents[node.index()],
                    Transform {
                        translation: Vec3::from(t),
                        rotation: Quat::from_array(r),
                        scale: Vec3::from(s),
                    },
                )
            })
            .collect();

        // Skins
        let mut skins = Vec::new();
        for skin in document.skins() {
            let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            let reader = skin.reader(|buffer| Some(&buf[buffer.index()]));
            let ibms: Vec<Mat4> = reader
                .read_inverse_bind_matrices()
                .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
                .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);

            skins.push(SkinData {
                joints,
                inverse_bind_matrices: ibms,
            });
        }

        // Map mesh → skin and mesh → first instancing node
        let mut mesh_skin = HashMap::new();
        let mut mesh_node: HashMap<usize, usize> = HashMap::new();
        for node in document.nodes() {
            if let Some(mesh) = node.mesh() {
                mesh_node.entry(mesh.index()).or_insert(node.index());
                if let Some(skin) = node.skin() {
                    mesh_skin.insert(mesh.index(), skin.index());
                }
            }
        }

        let material = style.material();
        let mut meshes = Vec::new();

        for mesh in document.meshes() {
            let node = mesh_node.get(&mesh.index()).copied();
            let name = node
                .map(|n| nodes[n].name.as_str())
                .filter(|n| !n.is_empty())
                .or(mesh.name())
                .map(String::from)
                .unwrap_or_else(|| format!("mesh_{}", mesh.index()));

            let mut primitives = Vec::new();
            let mut prim_morph_deltas = Vec::new();
            let mut target_count = 0;

            for prim in mesh.primitives() {
                let reader = prim.reader(|buffer| Some(&buf[buffer.index()]));

                let positions: Vec<Vec3> = reader
                    .read_positions()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .unwrap_or_default();

                let normals: Vec<Vec3> = reader
                    .read_normals()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .unwrap_or_default();

                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|iter| iter.into_u32().collect())
                    .unwrap_or_default();

                let uvs: Vec<[f32; 2]> = reader
                    .read_tex_coords(0)
                    .map(|iter| iter.into_f32().collect())
                    .unwrap_or_default();

                let joints: Vec<[u16; 4]> = reader
                    .read_joints(0)
                    .map(|iter| iter.into_u16().collect())
                    .unwrap_or_else(|| vec![[0; 4]; positions.len()]);

                let weights: Vec<[f32; 4]> = reader
                    .read_weights(0)
                    .map(|iter| iter.into_f32().collect())
                    .unwrap_or_else(|| vec![[1.0, 0.0, 0.0, 0.0]; positions.len()]);

                let mut surface = SurfaceMesh {
                    positions,
                    normals,
                    uvs,
                    indices,
                };
                surface.ensure_attributes();

                let deltas = read_morph_deltas_for_primitive(&prim, buf);
                target_count = target_count.max(deltas.len());
                prim_morph_deltas.push(deltas);

                primitives.push(PrimitiveData {
                    surface,
                    joints,
                    weights,
                    material,
                });
            }

            let mut names = parse_morph_target_names(&mesh);
            if names.is_empty() && target_count > 0 {
                names = (0..target_count).map(|i| i.to_string()).collect();
            }

            meshes.push(MeshData {
                name,
                node,
                primitives,
                morph_deltas: prim_morph_deltas,
                channels: MorphChannels::new(names),
            });
        }

        let animations: Vec<AnimationClip> = document
            .animations()
            .map(|anim| read_animation(&anim, buf))
            .collect();

        let base_mesh = meshes
            .iter()
            .position(|m| m.primitives.iter().any(PrimitiveData::is_drawable));
        let Some(base_idx) = base_mesh else {
            return Err(AssetError::NoGeometry);
        };

        let eyes_mesh = meshes.iter().rposition(|m| matches_hint(&m.name, "eye"));
        let tail_joint = skins
            .iter()
            .flat_map(|s| s.joints.iter().copied())
            .filter(|&j| matches_hint(&nodes[j].name, "tail"))
            .last();

        tracing::info!(
            "Loaded cat model {}: {} meshes, {} nodes, {} clips",
            path.display(),
            meshes.len(),
            nodes.len(),
            animations.len()
        );
        tracing::debug!(
            "Base mesh '{}', eyes {:?}, tail joint {:?}",
            meshes[base_idx].name,
            eyes_mesh.map(|i| meshes[i].name.as_str()),
            tail_joint.map(|j| nodes[j].name.as_str())
        );
        for mesh in meshes.iter().filter(|m| !m.channels.is_empty()) {
            tracing::debug!("Mesh '{}' morphs: {:?}", mesh.name, mesh.channels.names());
        }

        Ok(Self {
            meshes,
            nodes,
            skins,
            mesh_skin,
            animations,
            base_mesh,
            eyes_mesh,
            tail_joint,
            root_transform: Mat4::from_scale(Vec3::splat(style.scale)),
            is_placeholder: false,
            source: Some(path.to_path_buf()),
        })
    }

    /// A plain coat-colored sphere standing in for the cat.
    pub fn placeholder(style: &ModelStyle) -> Self {
        let surface = SurfaceMesh::sphere(
            style.placeholder_radius,
            style.placeholder_segments,
            style.placeholder_segments,
        );
        let mesh = MeshData {
            name: "placeholder".to_string(),
            node: None,
            primitives: vec![PrimitiveData::from_surface(surface, style.material())],
            morph_deltas: vec![Vec::new()],
            channels: MorphChannels::empty(),
        };

        Self {
            meshes: vec![mesh],
            nodes: Vec::new(),
            skins: Vec::new(),
            mesh_skin: HashMap::new(),
            animations: Vec::new(),
            base_mesh: Some(0),
            eyes_mesh: None,
            tail_joint: None,
            root_transform: Mat4::from_translation(Vec3::new(0.0, style.placeholder_height, 0.0)),
            is_placeholder: true,
            source: None,
        }
    }

    /// Load `path`, substituting the placeholder on any failure.
    pub fn load_or_placeholder<P: AsRef<Path>>(path: P, style: &ModelStyle) -> Self {
        match Self::load(&path, style) {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!("{}; using placeholder body", e);
                Self::placeholder(style)
            }
        }
    }

    /// The looping clip: first "idle" clip, else the first clip.
    pub fn idle_clip(&self) -> Option<&AnimationClip> {
        AnimationClip::select_idle(&self.animations).map(|i| &self.animations[i])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Case-insensitive substring match on an object name.
fn matches_hint(name: &str, hint: &str) -> bool {
    name.to_lowercase().contains(hint)
}

/// Parse morph target names from mesh extras JSON, stripping any shared prefix.
fn parse_morph_target_names(mesh: &gltf::Mesh) -> Vec<String> {
    if let Some(extras) = mesh.extras().as_ref() {
        if let Ok(val) = serde_json::from_str::<serde_json::Value>(extras.get()) {
            if let Some(names) = val.get("targetNames").and_then(|v| v.as_array()) {
                let raw: Vec<String> = names
                    .iter()
                    .filter_map(|n| n.as_str().map(String::from))
                    .collect();
                return strip_morph_prefixes(raw);
            }
        }
    }
    Vec::new()
}

/// Strip a shared dot-delimited prefix from morph target names.
///
/// Exporters often store names as `"Cat_Face.smile"`. The prefix is only
/// stripped when all names share the same `<something>.` prefix.
fn strip_morph_prefixes(names: Vec<String>) -> Vec<String> {
    if names.len() < 2 {
        return names;
    }

    let first_dot = match names[0].find('.') {
        Some(pos) => pos,
        None => return names,
    };
    let prefix_len = first_dot + 1;

    let prefix = &names[0][..prefix_len];
    if !names.iter().all(|n| n.starts_with(prefix)) {
        return names;
    }

    names
        .into_iter()
        .map(|n| n[prefix_len..].to_string())
        .collect()
}

/// Read morph target position deltas for a primitive.
fn read_morph_deltas_for_primitive(
    prim: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Vec<Vec<Vec3>> {
    let reader = prim.reader(|buffer| Some(&buffers[buffer.index()]));

    reader
        .read_morph_targets()
        .map(|(positions, _normals, _tangents)| match positions {
            Some(iter) => iter.map(Vec3::from).collect(),
            None => Vec::new(),
        })
        .collect()
}

/// Read translation, rotation and scale channels. Morph weight channels are skipped.
fn read_animation(anim: &gltf::Animation, buffers: &[gltf::buffer::Data]) -> AnimationClip {
    use gltf::animation::util::ReadOutputs;

    let mut channels = Vec::new();
    for channel in anim.channels() {
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();

        let (interpolation, cubic) = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => (Interpolation::Step, false),
            gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
            gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
        };

        let values = match reader.read_outputs() {
            Some(ReadOutputs::Translations(iter)) => {
                ChannelValues::Translation(keyframe_values(iter.map(Vec3::from), cubic))
            }
            Some(ReadOutputs::Rotations(rotations)) => ChannelValues::Rotation(keyframe_values(
                rotations.into_f32().map(Quat::from_array),
                cubic,
            )),
            Some(ReadOutputs::Scales(iter)) => {
                ChannelValues::Scale(keyframe_values(iter.map(Vec3::from), cubic))
            }
            Some(ReadOutputs::MorphTargetWeights(_)) | None => continue,
        };

        channels.push(AnimationChannel {
            node: channel.target().node().index(),
            times,
            values,
            interpolation,
        });
    }

    let name = anim
        .name()
        .map(String::from)
        .unwrap_or_else(|| format!("animation_{}", anim.index()));
    AnimationClip::new(name, channels)
}

/// Cubic spline outputs are stored as (in-tangent, value, out-tangent) triples;
/// keep only the values and interpolate them linearly.
fn keyframe_values<T>(iter: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if cubic {
        iter.skip(1).step_by(3).collect()
    } else {
        iter.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Writes a one-triangle glTF with a "smile" morph, an eye-named node,
    /// a tail joint and an idle clip rotating the tail.
    fn write_minimal_gltf(dir: &Path) -> PathBuf {
        let mut bin: Vec<u8> = Vec::new();
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]);
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0.0f32, 1.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        let s = std::f32::consts::FRAC_1_SQRT_2;
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, s, s] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(bin.len(), 120);
        std::fs::write(dir.join("cat.bin"), &bin).unwrap();

        let json = r#"{
  "asset": {"version": "2.0"},
  "scene": 0,
  "scenes": [{"nodes": [0, 1]}],
  "nodes": [
    {"name": "CatEyes", "mesh": 0, "skin": 0},
    {"name": "Tail_01"}
  ],
  "skins": [{"joints": [1]}],
  "meshes": [{
    "name": "body",
    "primitives": [{"attributes": {"POSITION": 1}, "indices": 0, "targets": [{"POSITION": 2}]}],
    "extras": {"targetNames": ["smile"]}
  }],
  "animations": [{
    "name": "Idle_Loop",
    "channels": [{"sampler": 0, "target": {"node": 1, "path": "rotation"}}],
    "samplers": [{"input": 3, "output": 4, "interpolation": "LINEAR"}]
  }],
  "buffers": [{"uri": "cat.bin", "byteLength": 120}],
  "bufferViews": [
    {"buffer": 0, "byteOffset": 0, "byteLength": 6},
    {"buffer": 0, "byteOffset": 8, "byteLength": 36},
    {"buffer": 0, "byteOffset": 44, "byteLength": 36},
    {"buffer": 0, "byteOffset": 80, "byteLength": 8},
    {"buffer": 0, "byteOffset": 88, "byteLength": 32}
  ],
  "accessors": [
    {"bufferView": 0, "componentType": 5123, "count": 3, "type": "SCALAR"},
    {"bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0]},
    {"bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 1], "max": [0, 0, 1]},
    {"bufferView": 3, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0], "max": [1]},
    {"bufferView": 4, "componentType": 5126, "count": 2, "type": "VEC4"}
  ]
}"#;
        let path = dir.join("cat.gltf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(json.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_gltf() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_minimal_gltf(dir.path());

        let model = CatModel::load(&path, &ModelStyle::default()).unwrap();
        assert!(!model.is_placeholder);
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.nodes.len(), 2);

        let mesh = &model.meshes[0];
        assert_eq!(mesh.name, "CatEyes");
        assert_eq!(mesh.channels.names(), &["smile".to_string()]);
        assert_eq!(mesh.morph_index("smile"), Some(0));
        assert_eq!(mesh.morph_deltas[0][0], vec![Vec3::Z; 3]);
        assert_eq!(mesh.primitives[0].surface.indices, vec![0, 1, 2]);
        // Normals were missing and got recomputed
        assert!((mesh.primitives[0].surface.normals[0] - Vec3::Z).length() < 1e-6);

        assert_eq!(model.base_mesh, Some(0));
        assert_eq!(model.eyes_mesh, Some(0));
        assert_eq!(model.tail_joint, Some(1));
        assert_eq!(model.mesh_skin.get(&0), Some(&0));

        let idle = model.idle_clip().unwrap();
        assert_eq!(idle.name, "Idle_Loop");
        assert_eq!(idle.duration, 1.0);
    }

    #[test]
    fn test_coat_color_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_minimal_gltf(dir.path());
        let style = ModelStyle::default();

        let model = CatModel::load(&path, &style).unwrap();
        let material = model.meshes[0].primitives[0].material;
        assert_eq!(material.base_color, Rgb::from_hex(0xffe066));
        assert_eq!(material.roughness, 0.6);
        assert_eq!(material.metalness, 0.0);
        assert_eq!(model.root_transform, Mat4::from_scale(Vec3::splat(0.8)));
    }

    #[test]
    fn test_missing_model_uses_placeholder() {
        let model = CatModel::load_or_placeholder("no/such/cat.glb", &ModelStyle::default());
        assert!(model.is_placeholder);
        assert_eq!(model.base_mesh, Some(0));
        assert!(model.eyes_mesh.is_none());
        assert!(model.tail_joint.is_none());
        assert!(model.meshes[0].channels.is_empty());
        assert_eq!(
            model.root_transform.w_axis.truncate(),
            Vec3::new(0.0, 0.35, 0.0)
        );
    }

    #[test]
    fn test_corrupt_model_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.glb");
        std::fs::write(&path, b"definitely not a glb").unwrap();

        assert!(CatModel::load(&path, &ModelStyle::default()).is_err());
        let model = CatModel::load_or_placeholder(&path, &ModelStyle::default());
        assert!(model.is_placeholder);
    }

    #[test]
    fn test_placeholder_sphere() {
        let model = CatModel::placeholder(&ModelStyle::default());
        let surface = &model.meshes[0].primitives[0].surface;
        assert_eq!(surface.vertex_count(), 49 * 49);
        assert!((surface.positions[0].length() - 0.35).abs() < 1e-5);
    }

    #[test]
    fn test_strip_morph_prefixes() {
        let names = vec!["Face.smile".to_string(), "Face.cry".to_string()];
        assert_eq!(strip_morph_prefixes(names), vec!["smile", "cry"]);

        let mixed = vec!["Face.smile".to_string(), "cry".to_string()];
        assert_eq!(strip_morph_prefixes(mixed.clone()), mixed);
    }

    #[test]
    fn test_matches_hint() {
        assert!(matches_hint("Left_EYE", "eye"));
        assert!(matches_hint("tailBone2", "tail"));
        assert!(!matches_hint("body", "eye"));
    }

    #[test]
    fn test_keyframe_values_cubic() {
        let v = keyframe_values([0, 1, 2, 3, 4, 5].into_iter(), true);
        assert_eq!(v, vec![1, 4]);
    }
}
