//! Prefiltered, mipmapped radiance environment maps.
//!
//! An equirectangular HDR image is projected onto a cube whose mip levels hold
//! the radiance convolved with a GGX lobe of increasing roughness. Everything
//! runs as render passes so it works on WebGL2 as well, where compute shaders
//! and filterable 32-bit float textures are unavailable.

use wgpu::util::DeviceExt;

use crate::{
    data_structures::environment::{ENVIRONMENT_FORMAT, EnvironmentMap, mip_count},
    pipelines::{PipelineOptions, mk_render_pipeline},
    resources::environment::HdrImage,
};

/// Importance samples taken per texel for rough mip levels.
const SAMPLE_COUNT: u32 = 128;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PmremUniform {
    face: u32,
    sample_count: u32,
    roughness: f32,
    face_size: f32,
    source_width: f32,
    source_levels: f32,
    _padding: [f32; 2],
}

pub struct PmremGenerator {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    equirect: Option<wgpu::Texture>,
    uniforms: Vec<wgpu::Buffer>,
}

impl PmremGenerator {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("pmrem_bind_group_layout"),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PMREM Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("PMREM Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("pmrem.wgsl").into()),
        });
        let pipeline = mk_render_pipeline(
            device,
            "PMREM Pipeline",
            &layout,
            ENVIRONMENT_FORMAT,
            None,
            &[],
            &shader,
            PipelineOptions {
                cull_mode: None,
                ..Default::default()
            },
        );

        Self {
            pipeline,
            bind_group_layout,
            equirect: None,
            uniforms: Vec::new(),
        }
    }

    fn upload_equirect(&self, device: &wgpu::Device, queue: &wgpu::Queue, chain: &[HdrImage]) -> wgpu::Texture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Equirectangular Source"),
            size: wgpu::Extent3d {
                width: chain[0].width,
                height: chain[0].height,
                depth_or_array_layers: 1,
            },
            mip_level_count: chain.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (mip_level, level) in chain.iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(&level.pixels),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(16 * level.width),
                    rows_per_image: Some(level.height),
                },
                wgpu::Extent3d {
                    width: level.width,
                    height: level.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        texture
    }

    /// Prefilters `image` into a cube with `face_size` pixel faces. Mip `m` has
    /// faces of `face_size >> m` pixels, down to 16, and roughness
    /// `m / (mips - 1)`.
    pub fn from_equirectangular(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &HdrImage,
        face_size: u32,
    ) -> EnvironmentMap {
        let max_dimension = device.limits().max_texture_dimension_2d;
        let face_size = face_size.clamp(1, max_dimension);
        let chain = image.mip_chain(max_dimension);
        let equirect = self.upload_equirect(device, queue, &chain);
        let source = equirect.create_view(&wgpu::TextureViewDescriptor::default());

        let mips = mip_count(face_size);
        let environment = EnvironmentMap::create_cube(device, face_size, mips, "Prefiltered Environment");

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("PMREM Encoder"),
        });
        for mip_level in 0..mips {
            let roughness = if mips > 1 {
                mip_level as f32 / (mips - 1) as f32
            } else {
                0.0
            };
            for face in 0..6 {
                let uniform = PmremUniform {
                    face,
                    sample_count: if roughness > 0.0 { SAMPLE_COUNT } else { 1 },
                    roughness,
                    face_size: (face_size >> mip_level).max(1) as f32,
                    source_width: chain[0].width as f32,
                    source_levels: chain.len() as f32,
                    _padding: [0.0; 2],
                };
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("PMREM Uniform Buffer"),
                    contents: bytemuck::cast_slice(&[uniform]),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &self.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&source),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: buffer.as_entire_binding(),
                        },
                    ],
                    label: Some("pmrem_bind_group"),
                });
                let target = environment.face_view(face, mip_level);

                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("PMREM Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
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
                drop(render_pass);

                self.uniforms.push(buffer);
            }
        }
        queue.submit(std::iter::once(encoder.finish()));

        if let Some(previous) = self.equirect.replace(equirect) {
            previous.destroy();
        }
        log::info!(
            "Prefiltered {}x{} environment into {} px cube with {} mips",
            image.width,
            image.height,
            face_size,
            mips
        );
        environment
    }

    /// Releases the source texture and per-pass uniforms. The generated cube
    /// maps stay valid.
    pub fn dispose(self) {
        if let Some(equirect) = self.equirect {
            equirect.destroy();
        }
        for buffer in self.uniforms {
            buffer.destroy();
        }
    }
}
