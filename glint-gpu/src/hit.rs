use glam::{Vec2, Vec3};

use crate::MaterialId;

#[derive(Clone, Copy)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct TriangleHit {
    pub distance: f32,
    pub point: Vec3,
    /// Interpolated per-vertex normal, used for shading.
    pub normal: Vec3,
    /// Winding-order normal, used to pick the side bounce rays restart from.
    pub geometric_normal: Vec3,
    pub uv: Vec2,
    pub material_id: MaterialId,
}

impl TriangleHit {
    /// How far to move a bounce or shadow ray's origin away from the surface
    /// it starts at to avoid self-intersection.
    pub const NUDGE_OFFSET: f32 = 3.0e-3;

    pub fn none() -> Self {
        Self {
            distance: f32::MAX,
            point: Vec3::ZERO,
            normal: Vec3::ZERO,
            geometric_normal: Vec3::ZERO,
            uv: Vec2::ZERO,
            material_id: MaterialId::new(0),
        }
    }

    pub fn is_some(self) -> bool {
        self.distance < f32::MAX
    }

    pub fn is_none(self) -> bool {
        !self.is_some()
    }
}
