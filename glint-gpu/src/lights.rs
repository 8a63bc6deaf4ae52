use glam::{vec2, Vec3, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{
    CookTorranceBrdf, Material, Noise, Ray, SceneView, Tracer, TriangleHit,
    WorldSettings,
};

/// Balances the two sampling strategies that can produce the same light path;
/// power heuristic with β = 2.
pub fn power_heuristic(pdf: f32, other_pdf: f32) -> f32 {
    let p = pdf * pdf;
    let q = other_pdf * other_pdf;

    if p + q <= 0.0 {
        0.0
    } else {
        p / (p + q)
    }
}

/// Next-event estimation towards the emissive triangles: picks one uniformly,
/// samples a point on it and casts a shadow ray; the contribution is weighted
/// against the chance that BSDF sampling would have found the same light.
pub fn sample_emissive_triangles<T: Tracer>(
    scene: &SceneView,
    tracer: &T,
    point: Vec3,
    normal: Vec3,
    view: Vec3,
    material: &Material,
    noise: &mut Noise,
) -> Vec3 {
    let count = scene.emissive_indices.len();

    if count == 0 {
        return Vec3::ZERO;
    }

    // Emitters don't gather from other emitters
    if material.is_emissive() {
        return Vec3::ZERO;
    }

    let picked = (noise.sample_int() as usize) % count;
    let triangle = scene.triangles[scene.emissive_indices[picked] as usize];

    let light_point =
        triangle.sample_point(vec2(noise.sample(), noise.sample()));

    let origin = point + normal * TriangleHit::NUDGE_OFFSET;

    let to_light = light_point - origin;
    let distance = to_light.length();

    if distance <= 0.0 {
        return Vec3::ZERO;
    }

    let direction = to_light / distance;

    // Emissive triangles radiate from both sides
    let cos_at_light = triangle.geometric_normal().dot(-direction).abs();

    if cos_at_light < 1.0e-6 {
        return Vec3::ZERO;
    }

    let cosine = normal.dot(direction);

    if cosine <= 0.0 {
        return Vec3::ZERO;
    }

    if tracer.any_hit(Ray::new(origin, direction), distance - 1.0e-4) {
        return Vec3::ZERO;
    }

    let area = triangle.area();

    if area <= 0.0 {
        return Vec3::ZERO;
    }

    // Area-measure pdf converted to solid angle, folded with the uniform
    // triangle pick
    let light_pdf =
        distance * distance / (cos_at_light * area * count as f32);

    let brdf = CookTorranceBrdf::new(material).eval(view, direction, normal);

    let emission = scene.materials
        [triangle.material_id().get() as usize]
        .emission
        .xyz();

    let weight = power_heuristic(light_pdf, brdf.pdf);

    emission * brdf.radiance * cosine * weight / light_pdf
}

/// Next-event estimation towards the environment map, mirroring
/// [`sample_emissive_triangles`]: one luminance-proportional direction plus a
/// visibility ray, MIS-weighted against BSDF sampling.
pub fn sample_environment<T: Tracer>(
    scene: &SceneView,
    world: &WorldSettings,
    tracer: &T,
    point: Vec3,
    normal: Vec3,
    view: Vec3,
    material: &Material,
    noise: &mut Noise,
) -> Vec3 {
    if !world.uses_envmap() || scene.env.is_empty() {
        return Vec3::ZERO;
    }

    if material.is_emissive() {
        return Vec3::ZERO;
    }

    let sample = scene.env.sample(noise);

    if sample.pdf <= 0.0 {
        return Vec3::ZERO;
    }

    let cosine = normal.dot(sample.direction);

    if cosine <= 0.0 {
        return Vec3::ZERO;
    }

    let origin = point + normal * TriangleHit::NUDGE_OFFSET;

    if tracer.any_hit(Ray::new(origin, sample.direction), f32::MAX) {
        return Vec3::ZERO;
    }

    let brdf =
        CookTorranceBrdf::new(material).eval(view, sample.direction, normal);

    let weight = power_heuristic(sample.pdf, brdf.pdf);

    sample.radiance * world.envmap_intensity * brdf.radiance * cosine * weight
        / sample.pdf
}
