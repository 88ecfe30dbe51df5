//! CPU skinning: forward kinematics, morph target application, and
//! linear blend skinning (LBS) for the cat model.

use glam::{Mat4, Vec3, Vec4};

use crate::animation::Pose;
use crate::model::CatModel;

/// Final vertex data for one primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeformedPrimitive {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

/// Compute world transforms for all nodes using forward kinematics.
///
/// Root nodes are placed under the model's root transform.
pub fn compute_world_transforms(model: &CatModel, pose: &Pose) -> Vec<Mat4> {
    let count = model.node_count();
    let mut world = vec![Mat4::IDENTITY; count];
    let mut computed = vec![false; count];

    for i in 0..count {
        compute_node(model, pose, &mut world, &mut computed, i);
    }

    world
}

fn compute_node(
    model: &CatModel,
    pose: &Pose,
    world: &mut [Mat4],
    computed: &mut [bool],
    idx: usize,
) {
    if computed[idx] {
        return;
    }

    let local = pose.local_matrix(idx);

    if let Some(parent) = model.nodes[idx].parent {
        compute_node(model, pose, world, computed, parent);
        world[idx] = world[parent] * local;
    } else {
        world[idx] = model.root_transform * local;
    }
    computed[idx] = true;
}

/// Apply the mesh's current morph weights to its base positions.
///
/// Returns new position arrays for each primitive of the mesh.
pub fn apply_morph_targets(model: &CatModel, mesh_idx: usize) -> Vec<Vec<Vec3>> {
    let mesh = &model.meshes[mesh_idx];
    let weights = mesh.channels.influences();
    let mut result = Vec::with_capacity(mesh.primitives.len());

    for (prim_idx, prim) in mesh.primitives.iter().enumerate() {
        let mut morphed = prim.surface.positions.clone();

        if let Some(deltas) = mesh.morph_deltas.get(prim_idx) {
            for (t_idx, &weight) in weights.iter().enumerate() {
                if weight.abs() < 0.001 || t_idx >= deltas.len() {
                    continue;
                }
                let target_deltas = &deltas[t_idx];
                if target_deltas.len() != morphed.len() {
                    continue;
                }
                for (v, delta) in morphed.iter_mut().zip(target_deltas.iter()) {
                    *v += *delta * weight;
                }
            }
        }

        result.push(morphed);
    }

    result
}

/// Apply linear blend skinning to vertex positions and normals.
///
/// Meshes without a skin are moved by their node's world transform, or by the
/// root transform when no node instances them.
pub fn skin_vertices(
    model: &CatModel,
    mesh_idx: usize,
    vertices_per_prim: &[Vec<Vec3>],
    world_transforms: &[Mat4],
) -> Vec<DeformedPrimitive> {
    let mesh = &model.meshes[mesh_idx];

    let Some(&skin_idx) = model.mesh_skin.get(&mesh_idx) else {
        let transform = mesh_world_transform(model, mesh_idx, world_transforms);
        return mesh
            .primitives
            .iter()
            .zip(vertices_per_prim)
            .map(|(prim, verts)| DeformedPrimitive {
                positions: verts.iter().map(|&p| transform.transform_point3(p)).collect(),
                normals: prim
                    .surface
                    .normals
                    .iter()
                    .map(|&n| transform.transform_vector3(n).normalize_or_zero())
                    .collect(),
            })
            .collect();
    };

    let skin = &model.skins[skin_idx];

    // Precompute joint matrices: world[joint_node] * inverse_bind_matrix
    let joint_matrices: Vec<Mat4> = skin
        .joints
        .iter()
        .zip(skin.inverse_bind_matrices.iter())
        .map(|(&node_idx, ibm)| world_transforms[node_idx] * *ibm)
        .collect();

    let mut result = Vec::with_capacity(mesh.primitives.len());

    for (prim_idx, prim) in mesh.primitives.iter().enumerate() {
        let base_verts = &vertices_per_prim[prim_idx];
        let mut positions = vec![Vec3::ZERO; base_verts.len()];
        let mut normals = vec![Vec3::ZERO; base_verts.len()];

        for (v_idx, pos) in base_verts.iter().enumerate() {
            let j = prim.joints.get(v_idx).copied().unwrap_or([0; 4]);
            let w = prim.weights.get(v_idx).copied().unwrap_or([1.0, 0.0, 0.0, 0.0]);
            let n = prim.surface.normals.get(v_idx).copied().unwrap_or(Vec3::Y);
            let p = Vec4::new(pos.x, pos.y, pos.z, 1.0);

            let mut blended = Mat4::ZERO;
            for k in 0..4 {
                if w[k] < 0.0001 {
                    continue;
                }
                let Some(jm) = joint_matrices.get(j[k] as usize) else {
                    continue;
                };
                blended += *jm * w[k];
            }

            positions[v_idx] = (blended * p).truncate();
            normals[v_idx] = blended.transform_vector3(n).normalize_or_zero();
        }

        result.push(DeformedPrimitive { positions, normals });
    }

    result
}

/// Morph and skin every mesh against precomputed node world transforms.
///
/// Returns per-mesh, per-primitive vertex data in model order.
pub fn deform_model(model: &CatModel, world: &[Mat4]) -> Vec<Vec<DeformedPrimitive>> {
    (0..model.meshes.len())
        .map(|mesh_idx| {
            let morphed = apply_morph_targets(model, mesh_idx);
            skin_vertices(model, mesh_idx, &morphed, world)
        })
        .collect()
}

/// World transform of the node that carries `mesh_idx` (root transform if none).
pub fn mesh_world_transform(model: &CatModel, mesh_idx: usize, world: &[Mat4]) -> Mat4 {
    model
        .meshes
        .get(mesh_idx)
        .and_then(|m| m.node)
        .and_then(|n| world.get(n).copied())
        .unwrap_or(model.root_transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::morph::{MorphChannels, MorphTarget};
    use crate::mesh::{PrimitiveData, SurfaceMaterial, SurfaceMesh};
    use crate::model::{MeshData, ModelStyle, NodeData, SkinData, Transform};
    use glam::Quat;
    use std::collections::HashMap;

    /// One triangle skinned fully to joint node 1, child of root node 0.
    fn skinned_triangle() -> CatModel {
        let surface = SurfaceMesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3],
            uvs: vec![[0.0; 2]; 3],
            indices: vec![0, 1, 2],
        };
        let mut prim = PrimitiveData::from_surface(surface, SurfaceMaterial::default());
        prim.joints = vec![[0, 0, 0, 0]; 3];

        let mut mesh_skin = HashMap::new();
        mesh_skin.insert(0, 0);

        CatModel {
            meshes: vec![MeshData {
                name: "body".into(),
                node: Some(0),
                primitives: vec![prim],
                morph_deltas: vec![vec![vec![Vec3::Y; 3]]],
                channels: MorphChannels::new(vec!["smile".into()]),
            }],
            nodes: vec![
                NodeData::new("root", None, Transform::IDENTITY),
                NodeData::new(
                    "tail",
                    Some(0),
                    Transform {
                        translation: Vec3::new(0.0, 1.0, 0.0),
                        ..Transform::IDENTITY
                    },
                ),
            ],
            skins: vec![SkinData {
                joints: vec![1],
                inverse_bind_matrices: vec![Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0))],
            }],
            mesh_skin,
            animations: Vec::new(),
            base_mesh: Some(0),
            eyes_mesh: None,
            tail_joint: Some(1),
            root_transform: Mat4::IDENTITY,
            is_placeholder: false,
            source: None,
        }
    }

    #[test]
    fn test_world_transforms_chain() {
        let mut model = skinned_triangle();
        model.root_transform = Mat4::from_scale(Vec3::splat(2.0));
        let world = compute_world_transforms(&model, &Pose::rest(&model.nodes));
        assert_eq!(world.len(), 2);
        let tail_origin = world[1].transform_point3(Vec3::ZERO);
        assert!((tail_origin - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_bind_pose_is_identity() {
        let model = skinned_triangle();
        let world = compute_world_transforms(&model, &Pose::rest(&model.nodes));
        let deformed = deform_model(&model, &world);
        let prim = &deformed[0][0];
        assert!((prim.positions[1] - Vec3::X).length() < 1e-6);
        assert!((prim.normals[0] - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_joint_rotation_moves_vertices() {
        let model = skinned_triangle();
        let mut pose = Pose::rest(&model.nodes);
        pose.set_rotation(1, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));

        let deformed = deform_model(&model, &compute_world_transforms(&model, &pose));
        // Vertex at X rotates about the joint at (0, 1, 0)
        let moved = deformed[0][0].positions[1];
        assert!((moved - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_morph_weights_applied() {
        let mut model = skinned_triangle();
        assert_eq!(apply_morph_targets(&model, 0)[0][2], Vec3::Y);

        model.meshes[0].channels.set_named_weight("smile", 0.5);
        let morphed = apply_morph_targets(&model, 0);
        assert!((morphed[0][0] - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_placeholder_follows_root() {
        let model = CatModel::placeholder(&ModelStyle::default());
        let world = compute_world_transforms(&model, &Pose::rest(&model.nodes));
        let deformed = deform_model(&model, &world);
        let top = deformed[0][0].positions[0];
        assert!((top - Vec3::new(0.0, 0.7, 0.0)).length() < 1e-5);
        assert_eq!(
            mesh_world_transform(&model, 0, &[]),
            model.root_transform
        );
    }
}
