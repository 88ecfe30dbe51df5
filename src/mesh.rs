//! CPU-side geometry shared by the model loader, the fur generator and the renderer.

use glam::Vec3;
use std::f32::consts::PI;

use crate::color::Rgb;

/// Indexed triangle surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl SurfaceMesh {
    /// UV sphere centred on the origin.
    ///
    /// Vertex layout is a `(width_segments + 1) x (height_segments + 1)` grid
    /// running from the north pole down, with the pole rows offset by half a
    /// segment in U and degenerate pole triangles skipped.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let ws = width_segments.max(3);
        let hs = height_segments.max(2);

        let mut positions = Vec::with_capacity(((ws + 1) * (hs + 1)) as usize);
        let mut normals = Vec::with_capacity(positions.capacity());
        let mut uvs = Vec::with_capacity(positions.capacity());
        let mut grid = Vec::with_capacity(hs as usize + 1);

        let mut index = 0u32;
        for iy in 0..=hs {
            let v = iy as f32 / hs as f32;
            let u_offset = if iy == 0 {
                0.5 / ws as f32
            } else if iy == hs {
                -0.5 / ws as f32
            } else {
                0.0
            };

            let mut row = Vec::with_capacity(ws as usize + 1);
            for ix in 0..=ws {
                let u = ix as f32 / ws as f32;
                let p = Vec3::new(
                    -radius * (u * 2.0 * PI).cos() * (v * PI).sin(),
                    radius * (v * PI).cos(),
                    radius * (u * 2.0 * PI).sin() * (v * PI).sin(),
                );
                positions.push(p);
                normals.push(p.normalize_or_zero());
                uvs.push([u + u_offset, 1.0 - v]);
                row.push(index);
                index += 1;
            }
            grid.push(row);
        }

        let mut indices = Vec::new();
        for iy in 0..hs as usize {
            for ix in 0..ws as usize {
                let a = grid[iy][ix + 1];
                let b = grid[iy][ix];
                let c = grid[iy + 1][ix];
                let d = grid[iy + 1][ix + 1];

                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != hs as usize - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self {
            positions,
            normals,
            uvs,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Recompute smooth normals by accumulating area-weighted face normals.
    ///
    /// Non-indexed surfaces are treated as a plain triangle list.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];

        let mut add_face = |a: usize, b: usize, c: usize| {
            let (Some(&pa), Some(&pb), Some(&pc)) = (
                self.positions.get(a),
                self.positions.get(b),
                self.positions.get(c),
            ) else {
                return;
            };
            let face = (pc - pb).cross(pa - pb);
            accum[a] += face;
            accum[b] += face;
            accum[c] += face;
        };

        if self.indices.is_empty() {
            for tri in 0..self.positions.len() / 3 {
                add_face(tri * 3, tri * 3 + 1, tri * 3 + 2);
            }
        } else {
            for tri in self.indices.chunks_exact(3) {
                add_face(tri[0] as usize, tri[1] as usize, tri[2] as usize);
            }
        }

        self.normals = accum.into_iter().map(Vec3::normalize_or_zero).collect();
    }

    /// Fill in missing per-vertex attributes with neutral values.
    pub fn ensure_attributes(&mut self) {
        let n = self.positions.len();
        if self.normals.len() != n {
            self.compute_vertex_normals();
        }
        if self.uvs.len() != n {
            self.uvs = vec![[0.0; 2]; n];
        }
        if self.indices.is_empty() {
            self.indices = (0..n as u32).collect();
        }
    }
}

/// Surface appearance parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMaterial {
    /// Linear RGB base color
    pub base_color: Rgb,
    pub roughness: f32,
    pub metalness: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub emissive: Rgb,
    pub emissive_intensity: f32,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            base_color: Rgb::WHITE,
            roughness: 1.0,
            metalness: 0.0,
            opacity: 1.0,
            transparent: false,
            emissive: Rgb::BLACK,
            emissive_intensity: 0.0,
        }
    }
}

impl SurfaceMaterial {
    pub fn coat(color: Rgb, roughness: f32, metalness: f32) -> Self {
        Self {
            base_color: color,
            roughness,
            metalness,
            ..Default::default()
        }
    }

    /// RGBA base color with the material opacity in alpha.
    pub fn base_rgba(&self) -> [f32; 4] {
        self.base_color.to_array4(self.opacity)
    }
}

/// Geometry for a single primitive plus its skinning attributes.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveData {
    pub surface: SurfaceMesh,
    /// Per-vertex joint indices (4 per vertex)
    pub joints: Vec<[u16; 4]>,
    /// Per-vertex joint weights (4 per vertex)
    pub weights: Vec<[f32; 4]>,
    pub material: SurfaceMaterial,
}

impl PrimitiveData {
    pub fn from_surface(surface: SurfaceMesh, material: SurfaceMaterial) -> Self {
        let n = surface.vertex_count();
        Self {
            surface,
            joints: vec![[0; 4]; n],
            weights: vec![[1.0, 0.0, 0.0, 0.0]; n],
            material,
        }
    }

    pub fn is_drawable(&self) -> bool {
        !self.surface.positions.is_empty() && !self.surface.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_layout() {
        let sphere = SurfaceMesh::sphere(0.35, 48, 48);
        assert_eq!(sphere.vertex_count(), 49 * 49);
        // Pole rows contribute one triangle per segment, the rest two
        assert_eq!(sphere.triangle_count(), 48 * 2 * 48 - 2 * 48);

        for p in &sphere.positions {
            assert!((p.length() - 0.35).abs() < 1e-5);
        }
        assert!((sphere.positions[0].y - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_sphere_indices_in_range() {
        let sphere = SurfaceMesh::sphere(1.0, 8, 6);
        let n = sphere.vertex_count() as u32;
        assert!(sphere.indices.iter().all(|&i| i < n));
    }

    #[test]
    fn test_recomputed_sphere_normals_point_outward() {
        let mut sphere = SurfaceMesh::sphere(1.0, 16, 12);
        sphere.compute_vertex_normals();
        for (p, n) in sphere.positions.iter().zip(&sphere.normals) {
            if p.y.abs() > 0.99 {
                continue;
            }
            assert!(n.dot(p.normalize()) > 0.9);
        }
    }

    #[test]
    fn test_single_triangle_normal() {
        let mut tri = SurfaceMesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        tri.compute_vertex_normals();
        for n in &tri.normals {
            assert!((*n - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn test_ensure_attributes() {
        let mut tri = SurfaceMesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            ..Default::default()
        };
        tri.ensure_attributes();
        assert_eq!(tri.indices, vec![0, 1, 2]);
        assert_eq!(tri.uvs.len(), 3);
        assert_eq!(tri.normals.len(), 3);
    }
}
