use glam::{Vec2, Vec3};

use crate::gpu::{self, MaterialId};

/// Host-side staging area for geometry; [`Scene::build`] flattens it into
/// the triangle soup the kernels trace against.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub vertices: Vec<Vec3>,
    /// Three indices per triangle.
    pub indices: Vec<u32>,
    /// Per-vertex shading normals; when empty, the geometric normals are
    /// used instead.
    pub normals: Vec<Vec3>,
    /// Per-vertex texture coordinates; optional.
    pub uvs: Vec<Vec2>,
    /// One material index per triangle.
    pub material_indices: Vec<u32>,
    pub materials: Vec<gpu::Material>,
}

impl Scene {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Flattens the indexed mesh into triangles, and extracts the indices of
    /// the emissive ones so that next-event estimation can pick lights
    /// without scanning the whole soup.
    pub fn build(&self) -> (Vec<gpu::Triangle>, Vec<u32>) {
        let mut triangles = Vec::with_capacity(self.triangle_count());
        let mut emissive_indices = Vec::new();

        for triangle_idx in 0..self.triangle_count() {
            let positions = [0, 1, 2].map(|vertex_idx| {
                self.vertices
                    [self.indices[triangle_idx * 3 + vertex_idx] as usize]
            });

            let geometric_normal = (positions[1] - positions[0])
                .cross(positions[2] - positions[0])
                .normalize_or_zero();

            let normals = [0, 1, 2].map(|vertex_idx| {
                if self.normals.is_empty() {
                    geometric_normal
                } else {
                    self.normals
                        [self.indices[triangle_idx * 3 + vertex_idx] as usize]
                }
            });

            let uvs = [0, 1, 2].map(|vertex_idx| {
                if self.uvs.is_empty() {
                    Vec2::ZERO
                } else {
                    self.uvs
                        [self.indices[triangle_idx * 3 + vertex_idx] as usize]
                }
            });

            let material_idx = self
                .material_indices
                .get(triangle_idx)
                .copied()
                .unwrap_or(0);

            let is_emissive = self
                .materials
                .get(material_idx as usize)
                .map_or(false, |material| material.is_emissive());

            if is_emissive {
                emissive_indices.push(triangle_idx as u32);
            }

            triangles.push(gpu::Triangle::new(
                positions,
                normals,
                uvs,
                MaterialId::new(material_idx),
            ));
        }

        (triangles, emissive_indices)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;

    fn two_triangle_scene() -> Scene {
        Scene {
            vertices: vec![
                vec3(0.0, 0.0, 0.0),
                vec3(1.0, 0.0, 0.0),
                vec3(0.0, 1.0, 0.0),
                vec3(1.0, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2, 1, 3, 2],
            material_indices: vec![0, 1],
            materials: vec![
                gpu::Material::default(),
                gpu::Material::default().with_emission(Vec3::splat(2.0)),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn build_flattens_and_finds_lights() {
        let (triangles, emissive_indices) = two_triangle_scene().build();

        assert_eq!(triangles.len(), 2);
        assert_eq!(emissive_indices, vec![1]);

        assert_eq!(triangles[0].material_id(), MaterialId::new(0));
        assert_eq!(triangles[1].material_id(), MaterialId::new(1));

        assert_eq!(triangles[0].position0(), vec3(0.0, 0.0, 0.0));
        assert_eq!(triangles[1].position0(), vec3(1.0, 0.0, 0.0));
    }

    #[test]
    fn build_falls_back_to_geometric_normals() {
        let (triangles, _) = two_triangle_scene().build();

        // Both triangles lie in the XY plane with CCW winding
        assert_relative_eq!(triangles[0].normal0().z, 1.0);
        assert_relative_eq!(triangles[1].normal1().z, 1.0);
    }

    #[test]
    fn build_prefers_vertex_normals() {
        let mut scene = two_triangle_scene();

        scene.normals = vec![Vec3::X; 4];

        let (triangles, _) = scene.build();

        assert_relative_eq!(triangles[0].normal0().x, 1.0);
    }
}
