use wgpu::util::DeviceExt;

use crate::{
    config::ViewerConfig,
    data_structures::{environment::EnvironmentMap, texture},
};

/// Image-based lighting state: the prefiltered environment and how bright it is.
pub struct LightingResources {
    pub environment: EnvironmentMap,
    pub uniform: LightingUniform,
    pub buffer: wgpu::Buffer,
    pub sampler: wgpu::Sampler,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniform {
    pub exposure: f32,
    pub intensity: f32,
    /// Highest mip of the environment cube, sampled for fully rough surfaces.
    pub max_mip: f32,
    /// 0.0 while only the placeholder environment is bound.
    pub enabled: f32,
}

impl LightingUniform {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            exposure: config.exposure,
            intensity: config.environment_intensity,
            max_mip: 0.0,
            enabled: 0.0,
        }
    }
}

pub fn mk_buffer(device: &wgpu::Device, uniform: LightingUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Lighting Buffer"),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::Cube,
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
        label: Some("lighting_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    environment: &EnvironmentMap,
    sampler: &wgpu::Sampler,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&environment.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: buffer.as_entire_binding(),
            },
        ],
        label: Some("lighting_bind_group"),
    })
}

impl LightingResources {
    /// Starts out with the neutral placeholder environment.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: &ViewerConfig) -> Self {
        let environment = EnvironmentMap::placeholder(device, queue);
        let uniform = LightingUniform::new(config);
        let buffer = mk_buffer(device, uniform);
        let sampler = texture::create_clamped_sampler(device);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &environment, &sampler, &buffer);
        Self {
            environment,
            uniform,
            buffer,
            sampler,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn has_environment(&self) -> bool {
        self.uniform.enabled > 0.0
    }

    pub fn set_environment(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, environment: EnvironmentMap) {
        self.uniform.max_mip = environment.max_mip();
        self.uniform.enabled = 1.0;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
        self.bind_group = mk_bind_group(
            device,
            &self.bind_group_layout,
            &environment,
            &self.sampler,
            &self.buffer,
        );
        self.environment = environment;
        log::info!(
            "Environment set ({} px faces, {} mips)",
            self.environment.size,
            self.environment.mip_level_count
        );
    }
}
