use glam::{vec2, vec3, UVec2, Vec3, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{
    power_heuristic, sample_emissive_triangles, sample_environment,
    sampling_decision, wang_hash, Camera, CookTorranceBrdf, EnvMapView,
    Material, Noise, Ray, RenderSettings, Tracer, Triangle, TriangleHit,
    Vec3Ext, WorldSettings, F32Ext, LOW_RESOLUTION_BOUNCES,
};

/// Read-only scene data as the kernels see it.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    pub triangles: &'a [Triangle],
    pub emissive_indices: &'a [u32],
    pub materials: &'a [Material],
    pub env: EnvMapView<'a>,
}

/// What a single invocation tells the dispatcher; on the GPU these feed the
/// status scalars, on the host the test harness tallies them directly.
#[derive(Clone, Copy, Default)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct PixelOutcome {
    /// Whether this pixel actually traced rays this frame.
    pub traced: bool,
    /// Whether this pixel passed the convergence test.
    pub converged: bool,
}

/// Integrates one pixel for one frame: traces `samples_per_frame` paths,
/// accumulates them into `colors` and updates the auxiliary buffers.
///
/// The color buffer holds the raw running sum; presenting code divides by
/// `sample_number + samples_per_frame`.
pub fn integrate<T: Tracer>(
    camera: &Camera,
    render: &RenderSettings,
    world: &WorldSettings,
    scene: &SceneView,
    tracer: &T,
    pixel: UVec2,
    colors: &mut [Vec4],
    normals: &mut [Vec4],
    albedo: &mut [Vec4],
    sample_counts: &mut [u32],
    squared_luminance: &mut [f32],
) -> PixelOutcome {
    let screen = camera.screen_size();

    if pixel.x >= screen.x || pixel.y >= screen.y {
        return PixelOutcome::default();
    }

    let mut bounces = render.nb_bounces;
    let mut samples = render.samples_per_frame;
    let mut pixel_index = camera.screen_to_idx(pixel);

    if render.is_low_resolution() {
        let scaling = render.low_resolution_scaling.max(1);

        // One representative pixel per block; everyone else sits the frame
        // out
        if pixel.x % scaling != 0 || pixel.y % scaling != 0 {
            return PixelOutcome::default();
        }

        bounces = LOW_RESOLUTION_BOUNCES;
        samples = 1;
        pixel_index /= scaling as usize;
    }

    // The first sample of a render lazily resets the pixel's slots, so
    // restarting accumulation never needs a buffer-clearing pass
    if render.sample_number == 0 {
        colors[pixel_index] = Vec4::ZERO;
        normals[pixel_index] = vec3(1.0, 1.0, 1.0).extend(0.0);
        albedo[pixel_index] = Vec4::ZERO;

        if render.has_adaptive_buffers() {
            sample_counts[pixel_index] = 0;
            squared_luminance[pixel_index] = 0.0;
        }
    }

    let decision = {
        let (count, squared) = if render.has_adaptive_buffers() {
            (sample_counts[pixel_index], squared_luminance[pixel_index])
        } else {
            (0, 0.0)
        };

        sampling_decision(render, colors[pixel_index].xyz(), count, squared)
    };

    if !decision.keep_sampling {
        // Scale the frozen sum as if this pixel kept accumulating, so that
        // dividing by the global sample count still yields its true mean
        if render.sample_number > 0 {
            let scale = (render.sample_number + samples) as f32
                / render.sample_number as f32;

            colors[pixel_index] =
                (colors[pixel_index].xyz() * scale).extend(0.0);
        }

        return PixelOutcome {
            traced: false,
            converged: true,
        };
    }

    let seed = if render.freezes_random() {
        wang_hash(pixel_index as u32 + 1)
    } else {
        wang_hash(
            (pixel_index as u32 + 1)
                .wrapping_mul(render.sample_number + 1),
        )
    };

    let mut noise = Noise::new(seed);

    let mut color_sum = Vec3::ZERO;
    let mut squared_luminance_sum = 0.0;
    let mut normal_sum = Vec3::ZERO;
    let mut albedo_sum = Vec3::ZERO;

    let mut sample = 0;

    while sample < samples {
        let jitter = vec2(noise.sample() - 0.5, noise.sample() - 0.5);
        let mut ray = camera.ray(pixel, jitter);

        let mut color = Vec3::ZERO;
        let mut throughput = Vec3::ONE;
        let mut last_brdf_pdf = 0.0;
        let mut bounce = 0;

        while bounce < bounces {
            let hit = tracer.nearest_hit(ray);

            if hit.is_none() {
                color += throughput
                    * sky_radiance(
                        world,
                        &scene.env,
                        ray.direction(),
                        bounce,
                        last_brdf_pdf,
                    );

                break;
            }

            let material =
                scene.materials[hit.material_id.get() as usize];

            let mut normal = hit.normal;
            let mut geometric_normal = hit.geometric_normal;

            // Emitters radiate from both sides, so a ray arriving from
            // behind sees the flipped frame
            if material.is_emissive()
                && (-ray.direction()).dot(geometric_normal) < 0.0
            {
                normal = -normal;
                geometric_normal = -geometric_normal;
            }

            let view = -ray.direction();

            if bounce == 0 {
                normal_sum += normal;
                albedo_sum += material.base_color.xyz();

                // Deeper emissive hits are already accounted for by the
                // light samples below
                color += throughput * material.emission.xyz();
            }

            color += throughput
                * sample_emissive_triangles(
                    scene, tracer, hit.point, normal, view, &material,
                    &mut noise,
                );

            color += throughput
                * sample_environment(
                    scene, world, tracer, hit.point, normal, view,
                    &material, &mut noise,
                );

            let brdf_sample = CookTorranceBrdf::new(&material)
                .sample(view, normal, &mut noise);

            if brdf_sample.value.pdf <= 0.0 {
                break;
            }

            let cosine = brdf_sample.direction.dot(normal).abs();

            throughput *= brdf_sample.value.radiance * cosine
                / brdf_sample.value.pdf;

            last_brdf_pdf = brdf_sample.value.pdf;

            let side = if brdf_sample.direction.dot(geometric_normal) < 0.0 {
                -1.0
            } else {
                1.0
            };

            ray = Ray::new(
                hit.point
                    + geometric_normal * TriangleHit::NUDGE_OFFSET * side,
                brdf_sample.direction,
            );

            bounce += 1;
        }

        if color.is_invalid() {
            if render.displays_nans() {
                let sentinel = vec3(1.0e15, 0.0, 1.0e15);

                // Keep the sentinel visible through the sample-count divide
                colors[pixel_index] = if render.sample_number == 0 {
                    sentinel.extend(0.0)
                } else {
                    (sentinel * render.sample_number as f32).extend(0.0)
                };
            }

            return PixelOutcome {
                traced: false,
                converged: false,
            };
        }

        squared_luminance_sum += color.luma().sqr();
        color_sum += color;
        sample += 1;
    }

    if render.has_adaptive_buffers() {
        sample_counts[pixel_index] += samples;
        squared_luminance[pixel_index] += squared_luminance_sum;
    }

    colors[pixel_index] += color_sum.extend(0.0);

    // Denoiser feature buffers keep a per-frame running average instead of a
    // raw sum
    let frame = render.frame_number as f32;

    let albedo_avg = albedo_sum / samples as f32;

    albedo[pixel_index] = ((albedo[pixel_index].xyz() * frame + albedo_avg)
        / (frame + 1.0))
        .extend(0.0);

    let normal_avg = normal_sum / samples as f32;

    let blended = (normals[pixel_index].xyz() * frame + normal_avg)
        / (frame + 1.0);

    let length = blended.length();

    normals[pixel_index] = if length != 0.0 {
        (blended / length).extend(0.0)
    } else {
        Vec4::ZERO
    };

    PixelOutcome {
        traced: true,
        converged: decision.converged,
    }
}

/// Radiance carried by a ray that left the scene.
///
/// With an environment map attached, paths past the camera ray only get here
/// through BSDF sampling, so their contribution is MIS-weighted against the
/// map's own importance sampling; the camera ray shows the background
/// directly, optionally without the lighting intensity scale.
fn sky_radiance(
    world: &WorldSettings,
    env: &EnvMapView,
    direction: Vec3,
    bounce: u32,
    last_brdf_pdf: f32,
) -> Vec3 {
    if !world.uses_envmap() || env.is_empty() {
        return world.ambient_color.xyz();
    }

    let radiance = env.radiance_in(direction);

    if bounce == 0 {
        if world.scales_background() {
            radiance * world.envmap_intensity
        } else {
            radiance
        }
    } else {
        let weight = power_heuristic(last_brdf_pdf, env.pdf(direction));

        radiance * world.envmap_intensity * weight
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, Mat4, UVec2, Vec2};

    use super::*;
    use crate::{LinearTracer, MaterialId};

    const SCREEN: u32 = 8;

    fn camera() -> Camera {
        let view =
            Mat4::look_at_rh(vec3(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);

        let projection =
            Mat4::perspective_rh(60.0f32.to_radians(), 1.0, 0.1, 100.0);

        let projection_view = projection * view;

        Camera {
            projection_view,
            ndc_to_world: projection_view.inverse(),
            origin: vec3(0.0, 0.0, 5.0).extend(1.0),
            screen: Vec4::new(SCREEN as f32, SCREEN as f32, 0.0, 0.0),
        }
    }

    struct Buffers {
        colors: Vec<Vec4>,
        normals: Vec<Vec4>,
        albedo: Vec<Vec4>,
        sample_counts: Vec<u32>,
        squared_luminance: Vec<f32>,
    }

    impl Buffers {
        fn new() -> Self {
            let len = (SCREEN * SCREEN) as usize;

            Self {
                colors: vec![Vec4::ZERO; len],
                normals: vec![Vec4::ZERO; len],
                albedo: vec![Vec4::ZERO; len],
                sample_counts: vec![0; len],
                squared_luminance: vec![0.0; len],
            }
        }
    }

    fn run_frame(
        render: &RenderSettings,
        world: &WorldSettings,
        scene: &SceneView,
        buffers: &mut Buffers,
    ) -> Vec<PixelOutcome> {
        let camera = camera();
        let tracer = LinearTracer::new(scene.triangles);
        let mut outcomes = Vec::new();

        for y in 0..SCREEN {
            for x in 0..SCREEN {
                outcomes.push(integrate(
                    &camera,
                    render,
                    world,
                    scene,
                    &tracer,
                    uvec2(x, y),
                    &mut buffers.colors,
                    &mut buffers.normals,
                    &mut buffers.albedo,
                    &mut buffers.sample_counts,
                    &mut buffers.squared_luminance,
                ));
            }
        }

        outcomes
    }

    fn empty_scene() -> SceneView<'static> {
        SceneView {
            triangles: &[],
            emissive_indices: &[],
            materials: &[],
            env: EnvMapView::new(&[], &[], UVec2::ZERO),
        }
    }

    fn big_emissive_triangle() -> [Triangle; 1] {
        [Triangle::new(
            [
                vec3(-20.0, -20.0, 0.0),
                vec3(20.0, -20.0, 0.0),
                vec3(0.0, 20.0, 0.0),
            ],
            [Vec3::Z; 3],
            [Vec2::ZERO; 3],
            MaterialId::new(0),
        )]
    }

    #[test]
    fn misses_accumulate_ambient_color() {
        let render = RenderSettings::default();

        let world = WorldSettings {
            ambient_color: vec3(0.3, 0.2, 0.1).extend(0.0),
            ..Default::default()
        };

        let mut buffers = Buffers::new();

        let outcomes =
            run_frame(&render, &world, &empty_scene(), &mut buffers);

        assert!(outcomes.iter().all(|outcome| outcome.traced));

        for color in &buffers.colors {
            assert_relative_eq!(color.x, 0.3);
            assert_relative_eq!(color.y, 0.2);
            assert_relative_eq!(color.z, 0.1);
        }
    }

    #[test]
    fn emissive_triangle_lights_the_frame() {
        let triangles = big_emissive_triangle();

        let materials =
            [Material::default().with_emission(Vec3::splat(4.0))];

        let scene = SceneView {
            triangles: &triangles,
            emissive_indices: &[0],
            materials: &materials,
            env: EnvMapView::new(&[], &[], UVec2::ZERO),
        };

        let render = RenderSettings::default();
        let world = WorldSettings::default();

        let mut buffers = Buffers::new();

        run_frame(&render, &world, &scene, &mut buffers);

        // The triangle fills the view, so the camera rays see the emission
        // directly
        let center = (SCREEN / 2 * SCREEN + SCREEN / 2) as usize;

        assert!(buffers.colors[center].x >= 4.0);

        // First-bounce feature buffers see the triangle too
        assert_relative_eq!(buffers.normals[center].z, 1.0, epsilon = 1e-4);
        assert_relative_eq!(buffers.albedo[center].x, 1.0);
    }

    #[test]
    fn one_bounce_frame_equals_the_emission() {
        let triangles = big_emissive_triangle();

        let materials =
            [Material::default().with_emission(Vec3::splat(4.0))];

        let scene = SceneView {
            triangles: &triangles,
            emissive_indices: &[0],
            materials: &materials,
            env: EnvMapView::new(&[], &[], UVec2::ZERO),
        };

        let render = RenderSettings {
            nb_bounces: 1,
            samples_per_frame: 1,
            ..Default::default()
        };

        let world = WorldSettings::default();
        let mut buffers = Buffers::new();

        run_frame(&render, &world, &scene, &mut buffers);

        // A single bounce leaves no room for an indirect term, so every
        // pixel holds the emission exactly
        for color in &buffers.colors {
            assert_eq!(*color, vec3(4.0, 4.0, 4.0).extend(0.0));
        }
    }

    #[test]
    fn frozen_random_state_repeats_frames() {
        let render = RenderSettings {
            freeze_random: 1,
            ..Default::default()
        };

        let world = WorldSettings::default();
        let scene = empty_scene();

        let mut first = Buffers::new();
        let mut second = Buffers::new();

        run_frame(&render, &world, &scene, &mut first);
        run_frame(&render, &world, &scene, &mut second);

        assert_eq!(first.colors, second.colors);

        // Same seed across sample numbers as well
        let advanced = RenderSettings {
            freeze_random: 1,
            sample_number: 1,
            frame_number: 1,
            ..Default::default()
        };

        let mut third = Buffers::new();

        run_frame(&render, &world, &scene, &mut third);
        run_frame(&advanced, &world, &scene, &mut third);

        for (color, reference) in third.colors.iter().zip(&first.colors) {
            assert_relative_eq!(color.x, reference.x * 2.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn sample_zero_resets_stale_buffers() {
        let render = RenderSettings::default();
        let world = WorldSettings::default();
        let scene = empty_scene();

        let mut fresh = Buffers::new();
        let mut stale = Buffers::new();

        stale.colors.fill(Vec4::splat(123.0));
        stale.normals.fill(Vec4::splat(-7.0));
        stale.albedo.fill(Vec4::splat(99.0));

        run_frame(&render, &world, &scene, &mut fresh);
        run_frame(&render, &world, &scene, &mut stale);

        assert_eq!(fresh.colors, stale.colors);
        assert_eq!(fresh.normals, stale.normals);
        assert_eq!(fresh.albedo, stale.albedo);
    }

    #[test]
    fn converged_pixels_get_rescaled_instead_of_traced() {
        let render = RenderSettings {
            enable_adaptive_sampling: 1,
            adaptive_min_samples: 2,
            adaptive_threshold: 1.0e9,
            samples_per_frame: 4,
            ..Default::default()
        };

        let world = WorldSettings {
            ambient_color: Vec4::splat(0.5),
            ..Default::default()
        };

        let scene = empty_scene();
        let mut buffers = Buffers::new();

        // Frame one traces and banks 4 samples per pixel
        let outcomes = run_frame(&render, &world, &scene, &mut buffers);

        assert!(outcomes.iter().all(|outcome| outcome.traced));

        let banked = buffers.colors[0];

        // Frame two finds every pixel converged (the threshold is absurd)
        // and only rescales
        let advanced = RenderSettings {
            sample_number: 4,
            frame_number: 1,
            ..render
        };

        let outcomes = run_frame(&advanced, &world, &scene, &mut buffers);

        assert!(outcomes.iter().all(|outcome| !outcome.traced));
        assert!(outcomes.iter().all(|outcome| outcome.converged));

        // `(4 + 4) / 4` keeps the mean intact after the divide
        assert_relative_eq!(buffers.colors[0].x, banked.x * 2.0);

        assert_eq!(buffers.sample_counts[0], 4);
    }

    #[test]
    fn low_resolution_frames_trace_one_pixel_per_block() {
        let render = RenderSettings {
            render_low_resolution: 1,
            low_resolution_scaling: 4,
            ..Default::default()
        };

        let world = WorldSettings::default();
        let scene = empty_scene();
        let mut buffers = Buffers::new();

        let outcomes = run_frame(&render, &world, &scene, &mut buffers);

        let traced =
            outcomes.iter().filter(|outcome| outcome.traced).count();

        // 8x8 screen, scaling 4: only pixels at (0|4, 0|4) trace
        assert_eq!(traced, 4);
    }
}
