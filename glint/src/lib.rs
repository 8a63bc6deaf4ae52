//! Progressive GPU path tracer.
//!
//! Renders by accumulating Monte Carlo samples over frames: the host keeps
//! the scene and settings in sync with the GPU, while the path-tracing
//! kernel - shared with this crate as [`gpu`] - integrates one (or a few)
//! samples per pixel per frame into persistent accumulation buffers.
//!
//! The entry point is [`Renderer`]; see its docs for the per-frame cadence.

mod buffers;
mod camera;
mod env_map;
mod error;
mod kernel;
mod pass;
mod renderer;
mod scene;

pub use glint_gpu as gpu;

pub use self::buffers::*;
pub use self::camera::*;
pub use self::env_map::*;
pub use self::error::*;
pub use self::kernel::*;
pub use self::pass::*;
pub use self::renderer::*;
pub use self::scene::*;

/// Acquires a device suitable for the renderer, opting into the optional
/// features (timestamps, hardware ray tracing) where the adapter offers them.
pub fn request_device() -> Result<(wgpu::Device, wgpu::Queue), Error> {
    pollster::block_on(async {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(Error::NoAdapter)?;

        log::info!("Using adapter: {:?}", adapter.get_info());

        let features = adapter.features()
            & (wgpu::Features::TIMESTAMP_QUERY
                | wgpu::Features::EXPERIMENTAL_RAY_QUERY);

        let limits = wgpu::Limits {
            max_storage_buffers_per_shader_stage: 12
                .min(adapter.limits().max_storage_buffers_per_shader_stage),
            ..Default::default()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("glint"),
                    required_features: features,
                    required_limits: limits,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok((device, queue))
    })
}
