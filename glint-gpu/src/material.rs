use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4, Vec4Swizzles};

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct Material {
    pub base_color: Vec4,
    pub emission: Vec4,
    pub roughness: f32,
    pub metallic: f32,
    /// Index into the texture table, or `u32::MAX` when untextured; reserved
    /// for the textured-material path.
    pub base_color_texture: u32,
    pub emission_texture: u32,
}

impl Material {
    pub fn is_emissive(&self) -> bool {
        self.emission.xyz() != Vec3::ZERO
    }

    pub fn with_base_color(mut self, base_color: Vec3) -> Self {
        self.base_color = base_color.extend(1.0);
        self
    }

    pub fn with_emission(mut self, emission: Vec3) -> Self {
        self.emission = emission.extend(0.0);
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            emission: Vec4::ZERO,
            roughness: 1.0,
            metallic: 0.0,
            base_color_texture: u32::MAX,
            emission_texture: u32::MAX,
        }
    }
}

#[derive(Clone, Copy)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct MaterialId(u32);

impl MaterialId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}
