use crate::{Ray, Triangle, TriangleHit};

/// Seam between the integrator and whatever acceleration structure serves the
/// intersection queries; the integrator itself never assumes how rays get
/// resolved.
pub trait Tracer {
    /// Traces given ray and returns its nearest hit.
    fn nearest_hit(&self, ray: Ray) -> TriangleHit;

    /// Traces given ray and returns whether it hits anything up to the given
    /// distance.
    fn any_hit(&self, ray: Ray, max_distance: f32) -> bool;
}

/// Brute-force tracer that tests every triangle; used by the reference
/// kernels and by host-side tests.
#[derive(Clone, Copy)]
pub struct LinearTracer<'a> {
    triangles: &'a [Triangle],
}

impl<'a> LinearTracer<'a> {
    pub fn new(triangles: &'a [Triangle]) -> Self {
        Self { triangles }
    }
}

impl Tracer for LinearTracer<'_> {
    fn nearest_hit(&self, ray: Ray) -> TriangleHit {
        let mut hit = TriangleHit::none();
        let mut idx = 0;

        while idx < self.triangles.len() {
            self.triangles[idx].hit(ray, &mut hit);
            idx += 1;
        }

        hit
    }

    fn any_hit(&self, ray: Ray, max_distance: f32) -> bool {
        let mut hit = TriangleHit {
            distance: max_distance,
            ..TriangleHit::none()
        };

        let mut idx = 0;

        while idx < self.triangles.len() {
            if self.triangles[idx].hit(ray, &mut hit) {
                return true;
            }

            idx += 1;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use glam::{vec2, vec3, Vec2, Vec3};

    use super::*;
    use crate::MaterialId;

    fn wall(z: f32, material_id: u32) -> Triangle {
        Triangle::new(
            [
                vec3(-10.0, -10.0, z),
                vec3(10.0, -10.0, z),
                vec3(0.0, 10.0, z),
            ],
            [-Vec3::Z; 3],
            [Vec2::ZERO, vec2(1.0, 0.0), vec2(0.5, 1.0)],
            MaterialId::new(material_id),
        )
    }

    #[test]
    fn nearest_hit_picks_closest() {
        let triangles = [wall(5.0, 0), wall(2.0, 1), wall(8.0, 2)];
        let tracer = LinearTracer::new(&triangles);

        let hit = tracer.nearest_hit(Ray::new(Vec3::ZERO, Vec3::Z));

        assert!(hit.is_some());
        assert_eq!(hit.material_id, MaterialId::new(1));
    }

    #[test]
    fn any_hit_respects_max_distance() {
        let triangles = [wall(5.0, 0)];
        let tracer = LinearTracer::new(&triangles);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);

        assert!(tracer.any_hit(ray, 10.0));
        assert!(!tracer.any_hit(ray, 4.0));
    }
}
