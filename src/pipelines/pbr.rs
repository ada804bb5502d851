use crate::{
    composer::{Frame, Pass},
    data_structures::{
        model::{self, DrawModel, Material, Vertex},
        texture::Texture,
        transform::TransformRaw,
    },
    pipelines::{PipelineOptions, mk_render_pipeline},
    render::Instanced,
};

/// The shader premultiplies blended output, so source colour is taken as is.
pub(crate) const TRANSPARENT_BLEND: wgpu::BlendState = wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING;

/// One pipeline per combination of blending and face culling a glTF material can ask for.
pub struct PbrPipelines {
    opaque: wgpu::RenderPipeline,
    opaque_double_sided: wgpu::RenderPipeline,
    blend: wgpu::RenderPipeline,
    blend_double_sided: wgpu::RenderPipeline,
}

impl PbrPipelines {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
        material_layout: &wgpu::BindGroupLayout,
        camera_layout: &wgpu::BindGroupLayout,
        lighting_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PBR Pipeline Layout"),
            bind_group_layouts: &[material_layout, camera_layout, lighting_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("PBR Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("pbr.wgsl").into()),
        });
        let vertex_layouts = [model::ModelVertex::desc(), TransformRaw::desc()];

        let mk = |label: &str, blend: Option<wgpu::BlendState>, double_sided: bool| {
            mk_render_pipeline(
                device,
                label,
                &layout,
                color_format,
                blend,
                &vertex_layouts,
                &shader,
                PipelineOptions {
                    cull_mode: (!double_sided).then_some(wgpu::Face::Back),
                    depth_format: Some(Texture::DEPTH_FORMAT),
                    // Blended surfaces are drawn last and don't occlude each other.
                    depth_write: blend.is_none(),
                    sample_count,
                },
            )
        };
        let replace = None;
        let alpha = Some(TRANSPARENT_BLEND);

        Self {
            opaque: mk("PBR Opaque", replace, false),
            opaque_double_sided: mk("PBR Opaque Double Sided", replace, true),
            blend: mk("PBR Blend", alpha, false),
            blend_double_sided: mk("PBR Blend Double Sided", alpha, true),
        }
    }

    pub fn select(&self, material: &Material) -> &wgpu::RenderPipeline {
        match (material.alpha_mode.is_blended(), material.double_sided) {
            (false, false) => &self.opaque,
            (false, true) => &self.opaque_double_sided,
            (true, false) => &self.blend,
            (true, true) => &self.blend_double_sided,
        }
    }
}

/// Draws the scene with image-based lighting and ACES tone mapping into a
/// multisampled target, resolving into the pass output.
pub struct ScenePass {
    pipelines: PbrPipelines,
    format: wgpu::TextureFormat,
    sample_count: u32,
    clear_colour: wgpu::Color,
    colour: Option<Texture>,
    depth: Texture,
    size: (u32, u32),
}

impl ScenePass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        sample_count: u32,
        clear_colour: wgpu::Color,
        size: (u32, u32),
        material_layout: &wgpu::BindGroupLayout,
        camera_layout: &wgpu::BindGroupLayout,
        lighting_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let pipelines = PbrPipelines::new(
            device,
            format,
            sample_count,
            material_layout,
            camera_layout,
            lighting_layout,
        );
        let (colour, depth) = Self::mk_targets(device, format, sample_count, size);
        Self {
            pipelines,
            format,
            sample_count,
            clear_colour,
            colour,
            depth,
            size,
        }
    }

    fn mk_targets(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        sample_count: u32,
        (width, height): (u32, u32),
    ) -> (Option<Texture>, Texture) {
        let colour = (sample_count > 1).then(|| {
            Texture::create_render_target(
                device,
                [width, height],
                format,
                sample_count,
                "Scene MSAA Target",
            )
        });
        let depth =
            Texture::create_depth_texture(device, [width, height], sample_count, "Scene Depth");
        (colour, depth)
    }
}

impl Pass for ScenePass {
    fn name(&self) -> &str {
        "scene"
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn set_size(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.size == (width, height) {
            return;
        }
        self.size = (width, height);
        (self.colour, self.depth) =
            Self::mk_targets(device, self.format, self.sample_count, self.size);
    }

    fn render(
        &mut self,
        frame: &mut Frame<'_>,
        _read: Option<&wgpu::TextureView>,
        write: &wgpu::TextureView,
    ) {
        let (view, resolve_target) = match &self.colour {
            Some(msaa) => (&msaa.view, Some(write)),
            None => (write, None),
        };

        let mut opaque: Vec<Instanced> = Vec::new();
        let mut transparent: Vec<Instanced> = Vec::new();
        frame
            .scene
            .get_render()
            .set_pipelines(&mut opaque, &mut transparent);

        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let camera_bind_group = &frame.camera.bind_group;
        let lighting_bind_group = &frame.scene.lighting.bind_group;
        for instanced in opaque.iter().chain(transparent.iter()) {
            render_pass.set_pipeline(self.pipelines.select(instanced.material));
            render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
            render_pass.draw_mesh_instanced(
                instanced.mesh,
                instanced.material,
                0..instanced.amount as u32,
                camera_bind_group,
                lighting_bind_group,
            );
        }
    }
}
