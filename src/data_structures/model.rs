//! Meshes and materials as they live on the GPU.

use std::ops::Range;

use wgpu::util::DeviceExt;

use crate::{
    data_structures::texture::Texture,
    resources::asset::MaterialData,
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 11]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// How a material's alpha channel is interpreted, mirroring glTF's `alphaMode`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AlphaMode {
    Opaque,
    Mask(f32),
    Blend,
}

impl AlphaMode {
    pub fn is_blended(&self) -> bool {
        matches!(self, AlphaMode::Blend)
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material: usize,
}

impl Mesh {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        vertices: &[ModelVertex],
        indices: &[u32],
        material: usize,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: indices.len() as u32,
            material,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    base_color_factor: [f32; 4],
    // rgb + padding
    emissive_factor: [f32; 4],
    // metallic, roughness, normal scale, occlusion strength
    params: [f32; 4],
    // cutoff, 1.0 when masked, 1.0 when blended, padding
    alpha: [f32; 4],
}

impl From<&MaterialData> for MaterialUniform {
    fn from(data: &MaterialData) -> Self {
        let (cutoff, masked, blended) = match data.alpha_mode {
            AlphaMode::Opaque => (0.0, 0.0, 0.0),
            AlphaMode::Mask(cutoff) => (cutoff, 1.0, 0.0),
            AlphaMode::Blend => (0.0, 0.0, 1.0),
        };
        let [r, g, b] = data.emissive_factor;
        Self {
            base_color_factor: data.base_color_factor,
            emissive_factor: [r, g, b, 0.0],
            params: [
                data.metallic_factor,
                data.roughness_factor,
                data.normal_scale,
                data.occlusion_strength,
            ],
            alpha: [cutoff, masked, blended, 0.0],
        }
    }
}

#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
    pub textures: [Texture; 5],
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        data: &MaterialData,
        images: &[image::RgbaImage],
    ) -> Self {
        let upload = |texture: Option<usize>, fallback: [u8; 4], srgb: bool, slot: &str| {
            let label = format!("{} {}", data.name, slot);
            match texture.and_then(|index| images.get(index)) {
                Some(image) => Texture::from_rgba8(device, queue, image, Some(&label), srgb),
                None => Texture::create_solid(device, queue, fallback, srgb, &label),
            }
        };
        // Missing maps fall back to values that leave the factors untouched.
        let textures = [
            upload(data.base_color, [255, 255, 255, 255], true, "base colour"),
            upload(data.metallic_roughness, [255, 255, 255, 255], false, "metallic roughness"),
            upload(data.normal, [128, 128, 255, 255], false, "normal"),
            upload(data.occlusion, [255, 255, 255, 255], false, "occlusion"),
            upload(data.emissive, [255, 255, 255, 255], true, "emissive"),
        ];

        let uniform = MaterialUniform::from(data);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material Buffer", data.name)),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let sampler = textures[0]
            .sampler
            .clone()
            .unwrap_or_else(|| crate::data_structures::texture::create_default_sampler(device));
        let mut entries: Vec<wgpu::BindGroupEntry> = textures
            .iter()
            .enumerate()
            .map(|(binding, texture)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: 5,
            resource: wgpu::BindingResource::Sampler(&sampler),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: 6,
            resource: buffer.as_entire_binding(),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &entries,
            label: Some(&data.name),
        });

        Self {
            name: data.name.clone(),
            alpha_mode: data.alpha_mode,
            double_sided: data.double_sided,
            textures,
            buffer,
            bind_group,
        }
    }
}

pub trait DrawModel<'a> {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'a Mesh,
        material: &'a Material,
        instances: Range<u32>,
        camera_bind_group: &'a wgpu::BindGroup,
        lighting_bind_group: &'a wgpu::BindGroup,
    );
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'b Mesh,
        material: &'b Material,
        instances: Range<u32>,
        camera_bind_group: &'b wgpu::BindGroup,
        lighting_bind_group: &'b wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, lighting_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }
}
