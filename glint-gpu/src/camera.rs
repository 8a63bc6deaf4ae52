use bytemuck::{Pod, Zeroable};
use glam::{vec2, Mat4, UVec2, Vec2, Vec4, Vec4Swizzles};

use crate::Ray;

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct Camera {
    pub projection_view: Mat4,
    pub ndc_to_world: Mat4,
    pub origin: Vec4,
    pub screen: Vec4,
}

impl Camera {
    /// Given a point in screen-coordinates, returns a unique index for it;
    /// used to index the per-pixel buffers.
    pub fn screen_to_idx(&self, pos: UVec2) -> usize {
        (pos.y * (self.screen.x as u32) + pos.x) as usize
    }

    pub fn screen_size(&self) -> UVec2 {
        self.screen.xy().as_uvec2()
    }

    /// Casts a ray through given screen-coordinates; `offset` jitters the
    /// sample inside the pixel's footprint for anti-aliasing.
    pub fn ray(&self, screen_pos: UVec2, offset: Vec2) -> Ray {
        let screen_size = self.screen.xy();

        let ndc =
            (screen_pos.as_vec2() + 0.5 + offset) * 2.0 / screen_size
                - Vec2::ONE;

        let ndc = vec2(ndc.x, -ndc.y);

        let near_plane = self.ndc_to_world.project_point3(ndc.extend(0.0));
        let far_plane = self.ndc_to_world.project_point3(ndc.extend(1.0));

        Ray::new(near_plane, (far_plane - near_plane).normalize())
    }
}
