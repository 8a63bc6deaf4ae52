use bytemuck::{Pod, Zeroable};
use glam::{vec2, Vec2, Vec3, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{MaterialId, Ray, TriangleHit};

#[repr(C)]
#[derive(Copy, Clone, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct Triangle {
    pub d0: Vec4,
    pub d1: Vec4,
    pub d2: Vec4,
    pub d3: Vec4,
    pub d4: Vec4,
    pub d5: Vec4,
    pub d6: Vec4,
}

impl Triangle {
    pub fn new(
        positions: [Vec3; 3],
        normals: [Vec3; 3],
        uvs: [Vec2; 3],
        material_id: MaterialId,
    ) -> Self {
        Self {
            d0: positions[0].extend(uvs[0].x),
            d1: normals[0].extend(uvs[0].y),
            d2: positions[1].extend(uvs[1].x),
            d3: normals[1].extend(uvs[1].y),
            d4: positions[2].extend(uvs[2].x),
            d5: normals[2].extend(uvs[2].y),
            d6: Vec4::new(f32::from_bits(material_id.get()), 0.0, 0.0, 0.0),
        }
    }

    pub fn position0(&self) -> Vec3 {
        self.d0.xyz()
    }

    pub fn normal0(&self) -> Vec3 {
        self.d1.xyz()
    }

    pub fn uv0(&self) -> Vec2 {
        vec2(self.d0.w, self.d1.w)
    }

    pub fn position1(&self) -> Vec3 {
        self.d2.xyz()
    }

    pub fn normal1(&self) -> Vec3 {
        self.d3.xyz()
    }

    pub fn uv1(&self) -> Vec2 {
        vec2(self.d2.w, self.d3.w)
    }

    pub fn position2(&self) -> Vec3 {
        self.d4.xyz()
    }

    pub fn normal2(&self) -> Vec3 {
        self.d5.xyz()
    }

    pub fn uv2(&self) -> Vec2 {
        vec2(self.d4.w, self.d5.w)
    }

    pub fn material_id(&self) -> MaterialId {
        MaterialId::new(self.d6.x.to_bits())
    }

    pub fn geometric_normal(&self) -> Vec3 {
        (self.position1() - self.position0())
            .cross(self.position2() - self.position0())
            .normalize()
    }

    pub fn area(&self) -> f32 {
        (self.position1() - self.position0())
            .cross(self.position2() - self.position0())
            .length()
            / 2.0
    }

    /// Maps a uniform `<0.0, 1.0>²` sample onto this triangle's surface.
    pub fn sample_point(&self, sample: Vec2) -> Vec3 {
        let s = sample.x.sqrt();

        self.position0() * (1.0 - s)
            + self.position1() * (s * (1.0 - sample.y))
            + self.position2() * (s * sample.y)
    }

    pub fn hit(&self, ray: Ray, hit: &mut TriangleHit) -> bool {
        let v0v1 = self.position1() - self.position0();
        let v0v2 = self.position2() - self.position0();

        // ---

        let pvec = ray.direction().cross(v0v2);
        let det = v0v1.dot(pvec);

        if det.abs() < f32::EPSILON {
            return false;
        }

        // ---

        let inv_det = 1.0 / det;
        let tvec = ray.origin() - self.position0();
        let u = tvec.dot(pvec) * inv_det;
        let qvec = tvec.cross(v0v1);
        let v = ray.direction().dot(qvec) * inv_det;
        let distance = v0v2.dot(qvec) * inv_det;

        if (u < 0.0)
            | (u > 1.0)
            | (v < 0.0)
            | (u + v > 1.0)
            | (distance <= 0.0)
            | (distance >= hit.distance)
        {
            return false;
        }

        let normal = u * self.normal1()
            + v * self.normal2()
            + (1.0 - u - v) * self.normal0();

        let uv = self.uv0()
            + (self.uv1() - self.uv0()) * u
            + (self.uv2() - self.uv0()) * v;

        hit.distance = distance;
        hit.point = ray.at(distance);
        hit.normal = normal.normalize();
        hit.geometric_normal = v0v1.cross(v0v2).normalize();
        hit.uv = uv;
        hit.material_id = self.material_id();

        true
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;

    fn triangle() -> Triangle {
        Triangle::new(
            [
                vec3(-1.0, -1.0, 0.0),
                vec3(1.0, -1.0, 0.0),
                vec3(0.0, 1.0, 0.0),
            ],
            [Vec3::Z; 3],
            [Vec2::ZERO, vec2(1.0, 0.0), vec2(0.5, 1.0)],
            MaterialId::new(3),
        )
    }

    #[test]
    fn hit_head_on() {
        let mut hit = TriangleHit::none();

        let got =
            triangle().hit(Ray::new(vec3(0.0, 0.0, -2.0), Vec3::Z), &mut hit);

        assert!(got);
        assert_relative_eq!(hit.distance, 2.0);
        assert_relative_eq!(hit.point.z, 0.0);
        assert_eq!(hit.material_id, MaterialId::new(3));
    }

    #[test]
    fn miss_behind() {
        let mut hit = TriangleHit::none();

        let got =
            triangle().hit(Ray::new(vec3(0.0, 0.0, -2.0), -Vec3::Z), &mut hit);

        assert!(!got);
        assert!(hit.is_none());
    }

    #[test]
    fn area() {
        assert_relative_eq!(triangle().area(), 2.0);
    }

    #[test]
    fn sample_point_stays_on_surface() {
        let triangle = triangle();

        for i in 0..16 {
            for j in 0..16 {
                let sample =
                    vec2(i as f32 / 15.0, j as f32 / 15.0);

                let point = triangle.sample_point(sample);

                assert_relative_eq!(point.z, 0.0);
                assert!(point.x >= -1.0 && point.x <= 1.0);
                assert!(point.y >= -1.0 && point.y <= 1.0);
            }
        }
    }
}
