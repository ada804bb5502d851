//! Render pipelines and the passes that own them.
//!
//! - `pbr` draws glTF primitives with image-based lighting (the scene pass)
//! - `lighting` holds the environment cube and exposure uniforms
//! - `pmrem` prefilters an equirectangular HDR image into a mipmapped cube
//! - `rgb_shift` is the chromatic offset post effect

pub mod lighting;
pub mod pbr;
pub mod pmrem;
pub mod rgb_shift;

/// Fixed function state that differs between the viewer's pipelines.
#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    pub cull_mode: Option<wgpu::Face>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub depth_write: bool,
    pub sample_count: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            cull_mode: Some(wgpu::Face::Back),
            depth_format: None,
            depth_write: true,
            sample_count: 1,
        }
    }
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: &wgpu::ShaderModule,
    options: PipelineOptions,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: options.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: options.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: options.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: options.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
