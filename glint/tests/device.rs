//! Smoke tests that exercise the renderer's host-side orchestration against
//! a real device; they skip (instead of failing) on machines without one.

use glam::uvec2;
use glint::{KernelDesc, KernelSource, ReadbackBuffer, Renderer};

fn context() -> Option<(wgpu::Device, wgpu::Queue)> {
    _ = env_logger::builder().is_test(true).try_init();

    match glint::request_device() {
        Ok(context) => Some(context),
        Err(_) => {
            eprintln!("no GPU adapter available; skipping");
            None
        }
    }
}

fn kernel_desc() -> KernelDesc {
    // Minimal valid SPIR-V module header; good enough for everything that
    // doesn't launch a frame
    let header: [u32; 5] = [0x0723_0203, 0x0001_0500, 0, 8, 0];

    KernelDesc {
        name: "path_tracing".into(),
        source: KernelSource::Bytes(bytemuck::cast_slice(&header).to_vec()),
        entry_point: "main".into(),
    }
}

fn renderer() -> Option<Renderer> {
    let (device, queue) = context()?;

    Some(Renderer::new(device, queue, uvec2(64, 64), kernel_desc()))
}

#[test]
fn resize_tracks_the_camera() {
    let Some(mut renderer) = renderer() else {
        return;
    };

    assert_eq!(renderer.viewport_size(), uvec2(64, 64));

    renderer.resize(uvec2(100, 100));
    renderer.resize(uvec2(50, 50));
    renderer.resize(uvec2(100, 100));

    assert_eq!(renderer.viewport_size(), uvec2(100, 100));
    assert_eq!(renderer.pixel_count(), 100 * 100);
    assert_eq!(renderer.camera.viewport_size, uvec2(100, 100));
    assert_eq!(
        renderer.camera.serialize().screen_size(),
        uvec2(100, 100),
    );

    // Resizing to the same size is a no-op
    renderer.resize(uvec2(100, 100));

    assert_eq!(renderer.viewport_size(), uvec2(100, 100));
}

#[test]
fn reset_restarts_the_accumulation() {
    let Some(mut renderer) = renderer() else {
        return;
    };

    renderer.settings_mut().sample_number = 123;
    renderer.settings_mut().frame_number = 45;
    renderer.settings_mut().samples_per_frame = 4;

    renderer.reset();

    assert_eq!(renderer.settings().sample_number, 0);
    assert_eq!(renderer.settings().frame_number, 0);
    assert_eq!(renderer.settings().samples_per_frame, 0);
    assert!(renderer.status().any_ray_active);
    assert_eq!(renderer.status().converged_count, 0);
}

#[test]
fn advance_respects_the_sampling_mode() {
    let Some(mut renderer) = renderer() else {
        return;
    };

    renderer.settings_mut().samples_per_frame = 4;

    renderer.advance();

    assert_eq!(renderer.settings().sample_number, 4);
    assert_eq!(renderer.settings().frame_number, 1);

    // Low-resolution frames always contribute a single sample
    renderer.settings_mut().render_low_resolution = 1;

    renderer.advance();

    assert_eq!(renderer.settings().sample_number, 5);
    assert_eq!(renderer.settings().frame_number, 2);
}

#[test]
fn adaptive_toggle_preserves_accumulated_radiance() {
    let Some((device, queue)) = context() else {
        return;
    };

    let mut renderer =
        Renderer::new(device.clone(), queue.clone(), uvec2(8, 8), kernel_desc());

    // Pretend 100 samples are banked in the accumulation buffer
    renderer.settings_mut().sample_number = 100;

    let banked = vec![7.25f32; 8 * 8 * 4];

    queue.write_buffer(
        renderer.color_buffer(),
        0,
        bytemuck::cast_slice(&banked),
    );

    // Toggling the statistics buffers on and off must leave it alone
    renderer.settings_mut().enable_adaptive_sampling = 1;
    renderer.update();

    renderer.settings_mut().enable_adaptive_sampling = 0;
    renderer.update();

    let readback =
        ReadbackBuffer::new(&device, "colors_readback", banked.len() * 4);

    let mut encoder = device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: None,
        });

    readback.copy_from(&mut encoder, renderer.color_buffer());
    queue.submit([encoder.finish()]);

    let bytes = readback.read(&device).unwrap();
    let read: &[f32] = bytemuck::cast_slice(&bytes);

    assert_eq!(read, &banked[..]);
}

#[test]
fn update_reconciles_adaptive_buffers() {
    let Some(mut renderer) = renderer() else {
        return;
    };

    renderer.update();

    renderer.settings_mut().enable_adaptive_sampling = 1;
    renderer.update();

    renderer.settings_mut().enable_adaptive_sampling = 0;
    renderer.settings_mut().stop_noise_threshold = 0.05;
    renderer.update();

    renderer.settings_mut().stop_noise_threshold = 0.0;
    renderer.update();
}

#[test]
fn hardware_acceleration_follows_device_support() {
    let Some(mut renderer) = renderer() else {
        return;
    };

    if renderer.supports_hardware_acceleration() {
        assert!(renderer.hardware_acceleration());
    } else {
        assert!(!renderer.hardware_acceleration());

        // Requesting it anyway keeps the software path
        renderer.set_hardware_acceleration(true);

        assert!(!renderer.hardware_acceleration());
    }
}
