use wgpu::util::DeviceExt;

use crate::{
    composer::{Frame, Pass},
    data_structures::texture,
    pipelines::{PipelineOptions, mk_render_pipeline},
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RgbShiftUniform {
    pub amount: f32,
    pub angle: f32,
    pub encode_srgb: f32,
    _padding: f32,
}

impl RgbShiftUniform {
    pub fn new(amount: f32, angle: f32, output_format: wgpu::TextureFormat) -> Self {
        Self {
            amount,
            angle,
            encode_srgb: if output_format.is_srgb() { 0.0 } else { 1.0 },
            _padding: 0.0,
        }
    }

    /// Texture-space offset of the red channel; blue moves the opposite way.
    pub fn offset(&self) -> [f32; 2] {
        [self.amount * self.angle.cos(), self.amount * self.angle.sin()]
    }
}

/// Chromatic offset effect: red sampled at `uv + offset`, green and alpha at
/// `uv`, blue at `uv - offset`.
pub struct RgbShiftPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    buffer: wgpu::Buffer,
    size: (u32, u32),
}

impl RgbShiftPass {
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        amount: f32,
        angle: f32,
        size: (u32, u32),
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("rgb_shift_bind_group_layout"),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("RGB Shift Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("RGB Shift Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("rgb_shift.wgsl").into()),
        });
        let pipeline = mk_render_pipeline(
            device,
            "RGB Shift Pipeline",
            &layout,
            output_format,
            Some(wgpu::BlendState::REPLACE),
            &[],
            &shader,
            PipelineOptions {
                cull_mode: None,
                ..Default::default()
            },
        );

        let uniform = RgbShiftUniform::new(amount, angle, output_format);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("RGB Shift Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        Self {
            pipeline,
            bind_group_layout,
            sampler: texture::create_clamped_sampler(device),
            buffer,
            size,
        }
    }
}

impl Pass for RgbShiftPass {
    fn name(&self) -> &str {
        "rgb shift"
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn set_size(&mut self, _device: &wgpu::Device, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn render(
        &mut self,
        frame: &mut Frame<'_>,
        read: Option<&wgpu::TextureView>,
        write: &wgpu::TextureView,
    ) {
        let Some(read) = read else {
            log::warn!("RGB shift pass has no input, it can't be the first pass");
            return;
        };
        // The input view changes whenever the composer resizes, so bind per frame.
        let bind_group = frame.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(read),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.buffer.as_entire_binding(),
                },
            ],
            label: Some("rgb_shift_bind_group"),
        });

        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("RGB Shift Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: write,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_targets_skip_manual_encoding() {
        let srgb = RgbShiftUniform::new(0.003, 0.0, wgpu::TextureFormat::Bgra8UnormSrgb);
        let linear = RgbShiftUniform::new(0.003, 0.0, wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(srgb.encode_srgb, 0.0);
        assert_eq!(linear.encode_srgb, 1.0);
    }

    #[test]
    fn zero_angle_shifts_horizontally() {
        let uniform = RgbShiftUniform::new(0.003, 0.0, wgpu::TextureFormat::Rgba8UnormSrgb);
        assert_eq!(uniform.offset(), [0.003, 0.0]);
        let vertical = RgbShiftUniform::new(0.5, std::f32::consts::FRAC_PI_2, wgpu::TextureFormat::Rgba8UnormSrgb);
        let [x, y] = vertical.offset();
        assert!(x.abs() < 1e-6 && (y - 0.5).abs() < 1e-6);
    }
}
