use glam::UVec2;
use log::debug;

use crate::{Bindable, BindGroup, BindGroupBuilder, CompiledKernel};

/// Compute pass wrapping one compiled kernel together with the bind groups
/// it runs against; rebuilt whenever either side changes.
#[derive(Debug)]
pub struct ComputePass {
    label: String,
    bind_groups: Vec<BindGroup>,
    pipeline: wgpu::ComputePipeline,
}

impl ComputePass {
    pub fn builder<'a>(label: impl ToString) -> ComputePassBuilder<'a> {
        ComputePassBuilder {
            label: label.to_string(),
            bind_groups: Default::default(),
        }
    }

    pub fn run(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        size: UVec2,
        timestamp_writes: Option<wgpu::ComputePassTimestampWrites>,
    ) {
        let label = format!("glint_{}_pass", self.label);

        let mut pass =
            encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&label),
                timestamp_writes,
            });

        pass.set_pipeline(&self.pipeline);

        for (bind_group_idx, bind_group) in self.bind_groups.iter().enumerate()
        {
            pass.set_bind_group(bind_group_idx as u32, bind_group.get(), &[]);
        }

        pass.dispatch_workgroups(size.x, size.y, 1);
    }
}

pub struct ComputePassBuilder<'a> {
    label: String,
    bind_groups: Vec<BindGroupBuilder<'a>>,
}

impl<'a> ComputePassBuilder<'a> {
    pub fn bind<const N: usize>(
        mut self,
        items: [&'a dyn Bindable; N],
    ) -> Self {
        let mut bind_group = BindGroup::builder(format!(
            "{}_bg{}",
            self.label,
            self.bind_groups.len()
        ));

        for item in items {
            bind_group = bind_group.add(item);
        }

        self.bind_groups.push(bind_group);
        self
    }

    pub fn build(
        self,
        device: &wgpu::Device,
        kernel: &CompiledKernel,
        entry_point: &str,
    ) -> ComputePass {
        debug!("Initializing pass: {}:{}", self.label, entry_point);

        let bind_groups: Vec<_> = self
            .bind_groups
            .into_iter()
            .map(|bg| bg.build(device))
            .collect();

        let bind_group_layouts: Vec<_> =
            bind_groups.iter().map(|bg| bg.layout()).collect();

        let pipeline_layout_label =
            format!("glint_{}_pipeline_layout", self.label);

        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&pipeline_layout_label),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            });

        let pipeline_label = format!("glint_{}_pipeline", self.label);

        let pipeline =
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&pipeline_label),
                layout: Some(&pipeline_layout),
                module: kernel.module(),
                entry_point: Some(entry_point),
                compilation_options: wgpu::PipelineCompilationOptions {
                    zero_initialize_workgroup_memory: false,
                    ..Default::default()
                },
                cache: None,
            });

        ComputePass {
            label: self.label,
            bind_groups,
            pipeline,
        }
    }
}
