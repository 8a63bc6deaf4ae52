use glint_gpu::prelude::*;
use spirv_std::arch::{atomic_i_increment, atomic_store};
use spirv_std::memory::{Scope, Semantics};

const SCOPE: u32 = Scope::Device as u32;
const SEMANTICS: u32 = Semantics::NONE.bits();

#[spirv(compute(threads(8, 8)))]
#[allow(clippy::too_many_arguments)]
pub fn main(
    #[spirv(global_invocation_id)] global_id: UVec3,
    #[spirv(descriptor_set = 0, binding = 0, storage_buffer)]
    triangles: &[Triangle],
    #[spirv(descriptor_set = 0, binding = 1, storage_buffer)]
    emissive_indices: &[u32],
    #[spirv(descriptor_set = 0, binding = 2, storage_buffer)]
    materials: &[Material],
    #[spirv(descriptor_set = 0, binding = 3, storage_buffer)]
    env_pixels: &[Vec4],
    #[spirv(descriptor_set = 0, binding = 4, storage_buffer)]
    env_cdf: &[f32],
    #[spirv(descriptor_set = 0, binding = 5, uniform)] world: &WorldSettings,
    #[spirv(descriptor_set = 1, binding = 0, uniform)] camera: &Camera,
    #[spirv(descriptor_set = 1, binding = 1, uniform)]
    render: &RenderSettings,
    #[spirv(descriptor_set = 1, binding = 2, storage_buffer)]
    colors: &mut [Vec4],
    #[spirv(descriptor_set = 1, binding = 3, storage_buffer)]
    normals: &mut [Vec4],
    #[spirv(descriptor_set = 1, binding = 4, storage_buffer)]
    albedo: &mut [Vec4],
    #[spirv(descriptor_set = 1, binding = 5, storage_buffer)]
    sample_counts: &mut [u32],
    #[spirv(descriptor_set = 1, binding = 6, storage_buffer)]
    squared_luminance: &mut [f32],
    #[spirv(descriptor_set = 1, binding = 7, storage_buffer)]
    status: &mut [u32],
) {
    let scene = SceneView {
        triangles,
        emissive_indices,
        materials,
        env: EnvMapView::new(env_pixels, env_cdf, world.envmap_extent()),
    };

    let tracer = LinearTracer::new(triangles);

    let outcome = integrate(
        camera,
        render,
        world,
        &scene,
        &tracer,
        global_id.xy(),
        colors,
        normals,
        albedo,
        sample_counts,
        squared_luminance,
    );

    if outcome.traced {
        unsafe {
            atomic_store::<_, SCOPE, SEMANTICS>(&mut status[0], 1);
        }
    }

    if outcome.converged {
        unsafe {
            atomic_i_increment::<_, SCOPE, SEMANTICS>(&mut status[1]);
        }
    }
}
