use core::f32::consts::PI;

use glam::{vec3, Vec3, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{F32Ext, Material, Noise};

/// Cook-Torrance microfacet model with a GGX normal distribution; the same
/// code evaluates light samples and importance-samples bounce directions, so
/// the two stay consistent for multiple importance sampling.
#[derive(Clone, Copy)]
pub struct CookTorranceBrdf<'a> {
    material: &'a Material,
}

#[derive(Clone, Copy)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct BrdfValue {
    pub radiance: Vec3,
    pub pdf: f32,
}

impl BrdfValue {
    pub fn none() -> Self {
        Self {
            radiance: Vec3::ZERO,
            pdf: 0.0,
        }
    }
}

#[derive(Clone, Copy)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct BrdfSample {
    pub direction: Vec3,
    pub value: BrdfValue,
}

impl<'a> CookTorranceBrdf<'a> {
    pub fn new(material: &'a Material) -> Self {
        Self { material }
    }

    pub fn eval(self, view: Vec3, light: Vec3, normal: Vec3) -> BrdfValue {
        let half = (view + light).normalize();

        let n_o_v = normal.dot(view);
        let n_o_l = normal.dot(light);
        let n_o_h = normal.dot(half);
        let v_o_h = half.dot(view);

        // Grazing and back-facing configurations contribute nothing; they are
        // legal inputs, not errors
        if n_o_v <= 0.0 || n_o_l <= 0.0 || n_o_h <= 0.0 || v_o_h <= 0.0 {
            return BrdfValue::none();
        }

        let base_color = self.material.base_color.xyz();
        let metallic = self.material.metallic;
        let alpha = self.material.roughness.sqr();

        let f0 = Vec3::splat(0.04) * (1.0 - metallic) + base_color * metallic;
        let f = fresnel_schlick(f0, v_o_h);
        let d = ggx_normal_distribution(alpha, n_o_h);
        let g = ggx_masking_shadowing(alpha, n_o_v, n_o_l);

        let diffuse = (Vec3::ONE - f) * (1.0 - metallic) * base_color / PI;
        let specular = f * d * g / (4.0 * n_o_v * n_o_l);

        BrdfValue {
            radiance: diffuse + specular,
            pdf: d * n_o_h / (4.0 * v_o_h),
        }
    }

    /// Importance-samples a bounce direction by drawing a half-vector from
    /// the GGX distribution and reflecting the view direction around it.
    pub fn sample(
        self,
        view: Vec3,
        normal: Vec3,
        noise: &mut Noise,
    ) -> BrdfSample {
        let alpha = self.material.roughness.sqr();

        let phi = 2.0 * PI * noise.sample();
        let u = noise.sample();

        let cos_theta =
            ((1.0 - u) / (u * (alpha.sqr() - 1.0) + 1.0)).sqrt();

        let sin_theta = (1.0 - cos_theta.sqr()).max(0.0).sqrt();

        let half_local =
            vec3(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);

        let (tangent, bitangent) = normal.any_orthonormal_pair();

        let half = half_local.x * tangent
            + half_local.y * bitangent
            + half_local.z * normal;

        let direction = (2.0 * view.dot(half) * half - view).normalize();

        // Microfacets can reflect the view below the surface; such samples
        // are rejected, not re-drawn
        if direction.dot(normal) <= 0.0 {
            return BrdfSample {
                direction,
                value: BrdfValue::none(),
            };
        }

        BrdfSample {
            direction,
            value: self.eval(view, direction, normal),
        }
    }
}

fn fresnel_schlick(f0: Vec3, angle: f32) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - angle).saturate().powf(5.0)
}

fn ggx_normal_distribution(alpha: f32, n_o_h: f32) -> f32 {
    let alpha2 = alpha.sqr();
    let b = n_o_h.sqr() * (alpha2 - 1.0) + 1.0;

    alpha2 / (PI * b.sqr()).max(1.0e-8)
}

fn g1_schlick_ggx(k: f32, angle: f32) -> f32 {
    angle / (angle * (1.0 - k) + k)
}

fn ggx_masking_shadowing(alpha: f32, n_o_v: f32, n_o_l: f32) -> f32 {
    let k = alpha / 2.0;

    g1_schlick_ggx(k, n_o_l) * g1_schlick_ggx(k, n_o_v)
}
