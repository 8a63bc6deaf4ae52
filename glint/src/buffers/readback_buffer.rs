use std::sync::mpsc;

use log::info;

/// Staging buffer for host-side reads.
///
/// wgpu forbids mapping storage buffers directly, so values computed by the
/// kernels (status scalars, timestamps) first get copied into one of these
/// and only then mapped.
#[derive(Debug)]
pub struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    size: usize,
}

impl ReadbackBuffer {
    pub fn new(
        device: &wgpu::Device,
        label: impl AsRef<str>,
        size: usize,
    ) -> Self {
        let label = label.as_ref();

        info!("Allocating readback buffer `{label}`; size={size}");

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            size: size as _,
            mapped_at_creation: false,
        });

        Self { buffer, size }
    }

    pub fn copy_from(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Buffer,
    ) {
        encoder.copy_buffer_to_buffer(
            source,
            0,
            &self.buffer,
            0,
            self.size as _,
        );
    }

    pub fn as_buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Blocks until the latest copy into this buffer has landed and returns
    /// its bytes; `None` when mapping failed (e.g. on a lost device).
    pub fn read(&self, device: &wgpu::Device) -> Option<Vec<u8>> {
        let slice = self.buffer.slice(..);
        let (tx, rx) = mpsc::channel();

        slice.map_async(wgpu::MapMode::Read, move |result| {
            _ = tx.send(result);
        });

        device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {
                let data = slice.get_mapped_range().to_vec();

                self.buffer.unmap();

                Some(data)
            }
            _ => None,
        }
    }
}
