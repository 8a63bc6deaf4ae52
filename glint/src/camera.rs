use glam::{Mat4, UVec2, Vec3, Vec4};

use crate::gpu;

/// Host-side camera; [`Camera::serialize`] bakes it into the uniform the
/// kernels consume.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view, in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub viewport_size: UVec2,
}

impl Camera {
    pub fn serialize(&self) -> gpu::Camera {
        let aspect =
            self.viewport_size.x as f32 / (self.viewport_size.y.max(1) as f32);

        let view = Mat4::look_at_rh(self.position, self.look_at, self.up);

        let projection =
            Mat4::perspective_rh(self.fov, aspect, self.near, self.far);

        let projection_view = projection * view;

        gpu::Camera {
            projection_view,
            ndc_to_world: projection_view.inverse(),
            origin: self.position.extend(1.0),
            screen: Vec4::new(
                self.viewport_size.x as f32,
                self.viewport_size.y as f32,
                0.0,
                0.0,
            ),
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 5.0),
            look_at: Vec3::ZERO,
            up: Vec3::Y,
            fov: 45.0f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            viewport_size: UVec2::new(1280, 720),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec2, vec3};

    use super::*;

    #[test]
    fn serialize_tracks_viewport() {
        let mut camera = Camera::default();

        camera.viewport_size = uvec2(640, 480);

        let serialized = camera.serialize();

        assert_eq!(serialized.screen_size(), uvec2(640, 480));
    }

    #[test]
    fn central_ray_points_at_the_target() {
        let camera = Camera {
            position: vec3(3.0, 2.0, 1.0),
            look_at: vec3(-5.0, 0.5, 2.0),
            viewport_size: uvec2(100, 100),
            ..Default::default()
        };

        let serialized = camera.serialize();
        let ray = serialized.ray(uvec2(49, 49), vec2(0.5, 0.5));

        let expected = (camera.look_at - camera.position).normalize();

        assert_relative_eq!(ray.direction().x, expected.x, epsilon = 1e-3);
        assert_relative_eq!(ray.direction().y, expected.y, epsilon = 1e-3);
        assert_relative_eq!(ray.direction().z, expected.z, epsilon = 1e-3);
    }
}
