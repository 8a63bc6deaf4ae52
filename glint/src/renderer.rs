use std::sync::{Arc, Mutex};
use std::time::Instant;

use glam::{uvec2, UVec2, Vec4};
use log::{debug, info, warn};

use crate::gpu::{self, TILE_SIZE};
use crate::{
    compile_in_background, Camera, ComputePass, EnvMap, Error, KernelCache,
    KernelOptions, KernelSource, MappedStorageBuffer, MappedUniformBuffer,
    PendingKernel, ReadbackBuffer, Scene, UnmappedStorageBuffer,
};

/// Macro toggling the hardware-accelerated intersection path; the shader
/// build consumes it, the host merely keys the kernel cache with it.
pub const USE_HW_ACCELERATION: &str = "USE_HW_ACCELERATION";

const STATUS_RAY_ACTIVE: usize = 0;
const STATUS_CONVERGED: usize = 1;

/// Description of the path-tracing kernel the renderer launches; typically
/// points at the artifact produced by the shader builder.
#[derive(Clone, Debug)]
pub struct KernelDesc {
    pub name: String,
    pub source: KernelSource,
    pub entry_point: String,
}

/// What the previous frame's kernels reported back.
#[derive(Clone, Copy, Debug)]
pub struct StatusValues {
    /// Whether any pixel still traced rays; once this goes `false`, the
    /// image cannot change anymore and the host may stop submitting frames.
    pub any_ray_active: bool,

    /// How many pixels passed the convergence test.
    pub converged_count: u32,
}

impl Default for StatusValues {
    fn default() -> Self {
        Self {
            any_ray_active: true,
            converged_count: 0,
        }
    }
}

/// Frame orchestrator: owns the device-side buffers, keeps them in sync with
/// the host-side state, and launches one path-tracing dispatch per frame.
///
/// The expected per-frame cadence is [`Self::update`], [`Self::render`],
/// then - once the host confirmed completion - [`Self::download_status`] and
/// [`Self::advance`].
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,

    pub camera: Camera,
    settings: gpu::RenderSettings,

    camera_uniform: MappedUniformBuffer<gpu::Camera>,
    settings_uniform: MappedUniformBuffer<gpu::RenderSettings>,
    world: MappedUniformBuffer<gpu::WorldSettings>,

    triangles: MappedStorageBuffer<Vec<gpu::Triangle>>,
    emissive_indices: MappedStorageBuffer<Vec<u32>>,
    materials: MappedStorageBuffer<Vec<gpu::Material>>,
    env_pixels: MappedStorageBuffer<Vec<Vec4>>,
    env_cdf: MappedStorageBuffer<Vec<f32>>,

    frame: FrameBuffers,
    adaptive: Option<AdaptiveBuffers>,

    /// Bound in place of the adaptive buffers when those are deallocated;
    /// the kernels never touch it then, but the pipeline layout still wants
    /// something there.
    adaptive_stub: UnmappedStorageBuffer,

    status: MappedStorageBuffer<Vec<u32>>,
    status_readback: ReadbackBuffer,
    status_values: StatusValues,

    kernel_desc: KernelDesc,
    kernel_options: KernelOptions,
    kernels: KernelCache,
    pending_kernel: Option<PendingKernel>,
    pass: Option<(u64, ComputePass)>,

    timing: FrameTiming,
    hardware_acceleration: bool,
    was_last_frame_low_resolution: bool,
}

impl Renderer {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        viewport_size: UVec2,
        kernel_desc: KernelDesc,
    ) -> Self {
        let mut kernel_options = KernelOptions::default();

        let hardware_acceleration = device
            .features()
            .contains(wgpu::Features::EXPERIMENTAL_RAY_QUERY);

        if hardware_acceleration {
            info!("Hardware-accelerated ray tracing: supported");

            kernel_options.set_macro(USE_HW_ACCELERATION, 1);
        } else {
            info!("Hardware-accelerated ray tracing: not supported");
        }

        let pending_kernel = Some(compile_in_background(
            &device,
            &kernel_desc.name,
            &kernel_desc.source,
            &kernel_options,
        ));

        let camera = Camera {
            viewport_size,
            ..Default::default()
        };

        let camera_uniform =
            MappedUniformBuffer::new(&device, "camera", camera.serialize());

        let settings_uniform =
            MappedUniformBuffer::new_default(&device, "settings");

        let world = MappedUniformBuffer::new_default(&device, "world");

        let triangles =
            MappedStorageBuffer::new_default(&device, "triangles");

        let emissive_indices =
            MappedStorageBuffer::new_default(&device, "emissive_indices");

        let materials =
            MappedStorageBuffer::new_default(&device, "materials");

        let env_pixels =
            MappedStorageBuffer::new_default(&device, "env_pixels");

        let env_cdf = MappedStorageBuffer::new_default(&device, "env_cdf");

        let frame = FrameBuffers::new(&device, viewport_size);

        let adaptive_stub =
            UnmappedStorageBuffer::new(&device, "adaptive_stub", 4);

        let status =
            MappedStorageBuffer::new(&device, "status", vec![0u32, 0]);

        let status_readback =
            ReadbackBuffer::new(&device, "status_readback", 8);

        let timing = FrameTiming::new(&device, &queue);

        Self {
            device,
            queue,
            camera,
            settings: Default::default(),
            camera_uniform,
            settings_uniform,
            world,
            triangles,
            emissive_indices,
            materials,
            env_pixels,
            env_cdf,
            frame,
            adaptive: None,
            adaptive_stub,
            status,
            status_readback,
            status_values: Default::default(),
            kernel_desc,
            kernel_options,
            kernels: Default::default(),
            pending_kernel,
            pass: None,
            timing,
            hardware_acceleration,
            was_last_frame_low_resolution: false,
        }
    }

    pub fn settings(&self) -> &gpu::RenderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut gpu::RenderSettings {
        &mut self.settings
    }

    pub fn world(&self) -> &gpu::WorldSettings {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut gpu::WorldSettings {
        &mut self.world
    }

    pub fn status(&self) -> StatusValues {
        self.status_values
    }

    pub fn was_last_frame_low_resolution(&self) -> bool {
        self.was_last_frame_low_resolution
    }

    /// Duration of the previous frame's GPU work, in milliseconds; `None`
    /// until the first frame completes.
    pub fn last_frame_time(&self) -> Option<f32> {
        self.timing.last_frame_time()
    }

    pub fn supports_hardware_acceleration(&self) -> bool {
        self.device
            .features()
            .contains(wgpu::Features::EXPERIMENTAL_RAY_QUERY)
    }

    pub fn hardware_acceleration(&self) -> bool {
        self.hardware_acceleration
    }

    /// Switches the intersection path; flipping the toggle kicks off a
    /// background compilation for the new configuration, while previously
    /// compiled ones stay cached for an instant flip back.
    pub fn set_hardware_acceleration(&mut self, enabled: bool) {
        if enabled && !self.supports_hardware_acceleration() {
            warn!(
                "Hardware-accelerated ray tracing requested, but the device \
                 doesn't support it; keeping the software path"
            );

            return;
        }

        if enabled == self.hardware_acceleration {
            return;
        }

        self.hardware_acceleration = enabled;

        if enabled {
            self.kernel_options.set_macro(USE_HW_ACCELERATION, 1);
        } else {
            self.kernel_options.remove_macro(USE_HW_ACCELERATION);
        }

        let key = self.kernel_options.cache_key(&self.kernel_desc.name);

        if !self.kernels.contains(key) {
            self.pending_kernel = Some(compile_in_background(
                &self.device,
                &self.kernel_desc.name,
                &self.kernel_desc.source,
                &self.kernel_options,
            ));
        }
    }

    pub fn kernel_options(&self) -> &KernelOptions {
        &self.kernel_options
    }

    /// Size of the active kernel's SPIR-V module, in 32-bit words; zero when
    /// it hasn't been compiled yet.
    pub fn kernel_word_count(&self) -> u32 {
        self.kernels.word_count(
            self.kernel_options.cache_key(&self.kernel_desc.name),
            &self.kernel_desc.name,
        )
    }

    pub fn set_scene(&mut self, scene: &Scene) {
        let (triangles, emissive_indices) = scene.build();

        info!(
            "Uploading scene; triangles={}, lights={}, materials={}",
            triangles.len(),
            emissive_indices.len(),
            scene.materials.len(),
        );

        self.triangles =
            MappedStorageBuffer::new(&self.device, "triangles", triangles);

        self.emissive_indices = MappedStorageBuffer::new(
            &self.device,
            "emissive_indices",
            emissive_indices,
        );

        self.materials = MappedStorageBuffer::new(
            &self.device,
            "materials",
            scene.materials.clone(),
        );

        self.pass = None;
    }

    /// Replaces the material table without touching geometry; reallocates
    /// (and rebinds) only when the table grew past its buffer.
    pub fn set_materials(&mut self, materials: &[gpu::Material]) {
        *self.materials = materials.to_vec();

        if !self.materials.fits() {
            self.materials = MappedStorageBuffer::new(
                &self.device,
                "materials",
                materials.to_vec(),
            );

            self.pass = None;
        }
    }

    /// Attaches an environment map; `None` (or an empty image upstream)
    /// falls back to the uniform ambient light.
    pub fn set_env_map(&mut self, env_map: Option<&EnvMap>) {
        match env_map {
            Some(env_map) => {
                let size = env_map.size();

                info!("Uploading environment map; size={}x{}", size.x, size.y);

                self.env_pixels = MappedStorageBuffer::new(
                    &self.device,
                    "env_pixels",
                    env_map.pixels().to_vec(),
                );

                self.env_cdf = MappedStorageBuffer::new(
                    &self.device,
                    "env_cdf",
                    env_map.cdf().to_vec(),
                );

                self.world.ambient_mode = gpu::AMBIENT_ENVMAP;
                self.world.envmap_width = size.x;
                self.world.envmap_height = size.y;
            }

            None => {
                log::error!(
                    "Environment map is empty; falling back to the uniform \
                     ambient light"
                );

                self.world.ambient_mode = gpu::AMBIENT_UNIFORM;
                self.world.envmap_width = 0;
                self.world.envmap_height = 0;
            }
        }

        self.pass = None;
    }

    /// Begin-of-frame bookkeeping: clears the status scalars and reconciles
    /// the adaptive-sampling buffers with the current settings.
    pub fn update(&mut self) {
        self.status.fill(0);
        self.status.flush(&self.queue);

        let wants_adaptive = self.settings.has_adaptive_buffers();

        if wants_adaptive != self.adaptive.is_some() {
            // (De)allocating buffers that an in-flight launch might still
            // reference would be a use-after-free on some backends
            self.synchronize();

            // Only the statistics buffers come and go; the accumulation
            // targets stay put, so a mid-render toggle never loses banked
            // radiance
            self.adaptive = wants_adaptive.then(|| {
                AdaptiveBuffers::new(&self.device, self.frame.size)
            });

            self.pass = None;
        }
    }

    /// Launches one frame's worth of path tracing; fire-and-forget, the
    /// launch is only submitted here, never waited for.
    pub fn render(&mut self) -> Result<(), Error> {
        let kernel_key = self.ensure_kernel()?;
        self.ensure_pass(kernel_key);

        *self.camera_uniform = self.camera.serialize();
        *self.settings_uniform = self.settings;

        self.camera_uniform.flush(&self.queue);
        self.settings_uniform.flush(&self.queue);
        self.world.flush(&self.queue);
        self.triangles.flush(&self.queue);
        self.emissive_indices.flush(&self.queue);
        self.materials.flush(&self.queue);
        self.env_pixels.flush(&self.queue);
        self.env_cdf.flush(&self.queue);

        let mut encoder = self.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor {
                label: Some("glint_frame"),
            },
        );

        let size = self.frame.size;

        let tiles = uvec2(
            size.x.div_ceil(TILE_SIZE),
            size.y.div_ceil(TILE_SIZE),
        );

        let (_, pass) =
            self.pass.as_ref().expect("pass was just ensured");

        pass.run(&mut encoder, tiles, self.timing.timestamp_writes());

        self.timing.resolve(&mut encoder);

        self.status_readback
            .copy_from(&mut encoder, self.status.as_buffer());

        self.queue.submit([encoder.finish()]);
        self.timing.schedule(&self.queue);

        self.was_last_frame_low_resolution =
            self.settings.is_low_resolution();

        Ok(())
    }

    /// Moves the accumulation counters past the frame that was just
    /// rendered; call after [`Self::render`], once per frame.
    pub fn advance(&mut self) {
        self.settings.sample_number += if self.settings.is_low_resolution() {
            1
        } else {
            self.settings.samples_per_frame
        };

        self.settings.frame_number += 1;
    }

    /// Restarts the accumulation; buffers get lazily re-initialized by the
    /// kernels on the next frame.
    ///
    /// `samples_per_frame` resets too, so the host has to pick it again
    /// before the next frame.
    pub fn reset(&mut self) {
        self.settings.sample_number = 0;
        self.settings.frame_number = 0;
        self.settings.samples_per_frame = 0;
        self.status_values = Default::default();
    }

    /// Returns whether the GPU finished all submitted work, without
    /// blocking.
    pub fn frame_render_done(&self) -> bool {
        self.device
            .poll(wgpu::Maintain::Poll)
            .is_queue_empty()
    }

    /// Blocks until the GPU finished all submitted work.
    pub fn synchronize(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Fetches the status scalars of the last completed frame; meant to be
    /// called after [`Self::frame_render_done`] reported `true` or after
    /// [`Self::synchronize`].
    pub fn download_status(&mut self) -> Result<(), Error> {
        let bytes =
            self.status_readback.read(&self.device).ok_or_else(|| {
                Error::Readback {
                    label: "status".into(),
                }
            })?;

        let words: &[u32] = bytemuck::cast_slice(&bytes);

        self.status_values = StatusValues {
            any_ray_active: words[STATUS_RAY_ACTIVE] != 0,
            converged_count: words[STATUS_CONVERGED],
        };

        Ok(())
    }

    /// Resizes the per-pixel buffers; must not race a launch, so it waits
    /// for the device to go idle first.
    pub fn resize(&mut self, size: UVec2) {
        if size == self.frame.size {
            return;
        }

        info!("Resizing; new-size={}x{}", size.x, size.y);

        self.synchronize();

        self.camera.viewport_size = size;

        self.frame = FrameBuffers::new(&self.device, size);

        if self.adaptive.is_some() {
            self.adaptive = Some(AdaptiveBuffers::new(&self.device, size));
        }

        self.pass = None;
    }

    pub fn viewport_size(&self) -> UVec2 {
        self.frame.size
    }

    /// Number of pixels (and thus elements) in each per-pixel buffer.
    pub fn pixel_count(&self) -> usize {
        (self.frame.size.x * self.frame.size.y) as usize
    }

    /// Raw accumulation buffer (`Vec4` per pixel, running radiance sum);
    /// presenting code divides by `sample_number`.
    pub fn color_buffer(&self) -> &wgpu::Buffer {
        self.frame.colors.as_buffer()
    }

    /// Denoiser normal AOV (`Vec4` per pixel, running average).
    pub fn normal_buffer(&self) -> &wgpu::Buffer {
        self.frame.normals.as_buffer()
    }

    /// Denoiser albedo AOV (`Vec4` per pixel, running average).
    pub fn albedo_buffer(&self) -> &wgpu::Buffer {
        self.frame.albedo.as_buffer()
    }

    /// Makes sure the kernel for the current options is compiled, joining
    /// the background thread when necessary.
    fn ensure_kernel(&mut self) -> Result<u64, Error> {
        let key = self.kernel_options.cache_key(&self.kernel_desc.name);

        if self.kernels.contains(key) {
            return Ok(key);
        }

        if let Some(pending) = self.pending_kernel.take() {
            let pending_key = pending.key();
            let kernel = pending.join()?;

            self.kernels.insert(pending_key, kernel);

            if pending_key == key {
                return Ok(key);
            }
        }

        // The options changed with no compilation in flight for them; there
        // is nothing to overlap with anymore, so compile synchronously
        let pending = compile_in_background(
            &self.device,
            &self.kernel_desc.name,
            &self.kernel_desc.source,
            &self.kernel_options,
        );

        let kernel = pending.join()?;

        self.kernels.insert(key, kernel);

        Ok(key)
    }

    fn ensure_pass(&mut self, kernel_key: u64) {
        if matches!(&self.pass, Some((key, _)) if *key == kernel_key) {
            return;
        }

        let kernel = self
            .kernels
            .get(kernel_key)
            .expect("kernel was just ensured");

        debug!(
            "Rebuilding pass; kernel=`{}`, key={kernel_key:#018x}",
            kernel.name(),
        );

        let (sample_counts, squared_luminance) = self.adaptive_bind();

        let pass = ComputePass::builder("path_tracing")
            .bind([
                &self.triangles,
                &self.emissive_indices,
                &self.materials,
                &self.env_pixels,
                &self.env_cdf,
                &self.world,
            ])
            .bind([
                &self.camera_uniform,
                &self.settings_uniform,
                &self.frame.colors,
                &self.frame.normals,
                &self.frame.albedo,
                sample_counts,
                squared_luminance,
                &self.status,
            ])
            .build(&self.device, kernel, &self.kernel_desc.entry_point);

        self.pass = Some((kernel_key, pass));
    }

    fn adaptive_bind(
        &self,
    ) -> (&UnmappedStorageBuffer, &UnmappedStorageBuffer) {
        match &self.adaptive {
            Some(adaptive) => {
                (&adaptive.sample_counts, &adaptive.squared_luminance)
            }
            None => (&self.adaptive_stub, &self.adaptive_stub),
        }
    }
}

/// Per-pixel accumulation targets; recreated only on resize, so radiance
/// banked across frames survives everything else.
struct FrameBuffers {
    size: UVec2,
    colors: UnmappedStorageBuffer,
    normals: UnmappedStorageBuffer,
    albedo: UnmappedStorageBuffer,
}

impl FrameBuffers {
    fn new(device: &wgpu::Device, size: UVec2) -> Self {
        let pixels = (size.x * size.y).max(1) as usize;

        let colors =
            UnmappedStorageBuffer::new(device, "colors", pixels * 16);

        let normals =
            UnmappedStorageBuffer::new(device, "normals", pixels * 16);

        let albedo =
            UnmappedStorageBuffer::new(device, "albedo", pixels * 16);

        Self {
            size,
            colors,
            normals,
            albedo,
        }
    }
}

/// Per-pixel sampling statistics; allocated only while adaptive sampling or
/// the stop-noise threshold needs them, and (de)allocated independently of
/// [`FrameBuffers`].
struct AdaptiveBuffers {
    sample_counts: UnmappedStorageBuffer,
    squared_luminance: UnmappedStorageBuffer,
}

impl AdaptiveBuffers {
    fn new(device: &wgpu::Device, size: UVec2) -> Self {
        let pixels = (size.x * size.y).max(1) as usize;

        Self {
            sample_counts: UnmappedStorageBuffer::new(
                device,
                "sample_counts",
                pixels * 4,
            ),
            squared_luminance: UnmappedStorageBuffer::new(
                device,
                "squared_luminance",
                pixels * 4,
            ),
        }
    }
}

/// Measures how long a frame's GPU work took: timestamp queries where the
/// device supports them, wall-clock between submission and the completion
/// callback otherwise.
struct FrameTiming {
    timestamps: Option<Timestamps>,
    last_frame_ms: Arc<Mutex<Option<f32>>>,
}

struct Timestamps {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    period: f32,
}

impl FrameTiming {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let timestamps = device
            .features()
            .contains(wgpu::Features::TIMESTAMP_QUERY)
            .then(|| {
                let query_set =
                    device.create_query_set(&wgpu::QuerySetDescriptor {
                        label: Some("glint_frame_timestamps"),
                        ty: wgpu::QueryType::Timestamp,
                        count: 2,
                    });

                let resolve =
                    device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("glint_frame_timestamps_resolve"),
                        usage: wgpu::BufferUsages::QUERY_RESOLVE
                            | wgpu::BufferUsages::COPY_SRC,
                        size: 16,
                        mapped_at_creation: false,
                    });

                let readback =
                    device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("glint_frame_timestamps_readback"),
                        usage: wgpu::BufferUsages::COPY_DST
                            | wgpu::BufferUsages::MAP_READ,
                        size: 16,
                        mapped_at_creation: false,
                    });

                Timestamps {
                    query_set,
                    resolve,
                    readback,
                    period: queue.get_timestamp_period(),
                }
            });

        Self {
            timestamps,
            last_frame_ms: Default::default(),
        }
    }

    fn timestamp_writes(&self) -> Option<wgpu::ComputePassTimestampWrites> {
        self.timestamps.as_ref().map(|timestamps| {
            wgpu::ComputePassTimestampWrites {
                query_set: &timestamps.query_set,
                beginning_of_pass_write_index: Some(0),
                end_of_pass_write_index: Some(1),
            }
        })
    }

    fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        if let Some(timestamps) = &self.timestamps {
            encoder.resolve_query_set(
                &timestamps.query_set,
                0..2,
                &timestamps.resolve,
                0,
            );

            encoder.copy_buffer_to_buffer(
                &timestamps.resolve,
                0,
                &timestamps.readback,
                0,
                16,
            );
        }
    }

    /// Registers the completion callback for the frame that was just
    /// submitted; fires during a later `device.poll()`.
    fn schedule(&self, queue: &wgpu::Queue) {
        let out = Arc::clone(&self.last_frame_ms);

        match &self.timestamps {
            Some(timestamps) => {
                let buffer = timestamps.readback.clone();
                let period = timestamps.period;

                timestamps.readback.slice(..).map_async(
                    wgpu::MapMode::Read,
                    move |result| {
                        if result.is_err() {
                            return;
                        }

                        let elapsed = {
                            let data =
                                buffer.slice(..).get_mapped_range();

                            let stamps: &[u64] =
                                bytemuck::cast_slice(&data);

                            stamps[1].wrapping_sub(stamps[0]) as f32
                                * period
                                / 1.0e6
                        };

                        buffer.unmap();

                        *out.lock().unwrap() = Some(elapsed);
                    },
                );
            }

            None => {
                let started = Instant::now();

                queue.on_submitted_work_done(move || {
                    *out.lock().unwrap() =
                        Some(started.elapsed().as_secs_f32() * 1.0e3);
                });
            }
        }
    }

    fn last_frame_time(&self) -> Option<f32> {
        *self.last_frame_ms.lock().unwrap()
    }
}
