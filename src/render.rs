//! Render composition and pipeline batching.
//!
//! Scene nodes describe what they want drawn through the [`Render`] enum. The
//! scene pass sorts those descriptions into an opaque and a transparent batch
//! and draws the batches in that order. [`Renderer`] ties the camera, the bind
//! group layouts and the post-processing chain together.
//!
//! # Key types
//!
//! - [`Render<'a>`] is the primary enum describing render operations
//! - [`Instanced<'a>`] contains data for instanced rendering (mesh + material + instance buffer)
//! - [`Renderer`] owns the camera and the [`EffectComposer`]

use crate::{
    camera::CameraResources,
    composer::{EffectComposer, Frame},
    config::ViewerConfig,
    data_structures::{
        model::{Material, Mesh},
        scene_graph::Scene,
        texture::Texture,
    },
    pipelines::{pbr::ScenePass, rgb_shift::RgbShiftPass},
    resources::texture::material_layout,
};

/// Data for instanced rendering of one primitive.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub mesh: &'a Mesh,
    pub material: &'a Material,
    pub amount: usize,
}

/// Specifies how a scene object should be rendered.
///
/// - `None` renders nothing
/// - `Opaque(Vec<Instanced>)` renders opaque and alpha-masked primitives
/// - `Transparent(Vec<Instanced>)` renders blended primitives after every opaque one
/// - `Composed(Vec<Render>)` recursively renders a composition of multiple renders
pub enum Render<'a> {
    None,
    Opaque(Vec<Instanced<'a>>),
    Transparent(Vec<Instanced<'a>>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn set_pipelines(
        self,
        opaque: &mut Vec<Instanced<'a>>,
        transparent: &mut Vec<Instanced<'a>>,
    ) {
        match self {
            Render::Opaque(mut vec) => opaque.append(&mut vec),
            Render::Transparent(mut vec) => transparent.append(&mut vec),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(opaque, transparent)),
            Render::None => (),
        }
    }

    /// Number of draw calls this render expands to.
    pub fn draw_count(&self) -> usize {
        match self {
            Render::None => 0,
            Render::Opaque(vec) | Render::Transparent(vec) => vec.len(),
            Render::Composed(renders) => renders.iter().map(Render::draw_count).sum(),
        }
    }
}

/// Camera, shared layouts and the effect chain.
pub struct Renderer {
    pub camera: CameraResources,
    pub material_layout: wgpu::BindGroupLayout,
    pub composer: EffectComposer,
}

impl Renderer {
    /// Builds the fixed chain: scene pass first, RGB shift last, writing into
    /// targets of `output_format`.
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        sample_count: u32,
        size: (u32, u32),
        config: &ViewerConfig,
        lighting_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let (width, height) = size;
        let camera = CameraResources::new(device, config, width, height);
        let material_layout = material_layout(device);

        let mut composer = EffectComposer::new(device, width, height);
        composer.add_pass(Box::new(ScenePass::new(
            device,
            Texture::TARGET_FORMAT,
            sample_count,
            config.clear_colour,
            (width, height),
            &material_layout,
            &camera.bind_group_layout,
            lighting_layout,
        )));
        composer.add_pass(Box::new(RgbShiftPass::new(
            device,
            output_format,
            config.rgb_shift_amount,
            config.rgb_shift_angle,
            (width, height),
        )));

        Self {
            camera,
            material_layout,
            composer,
        }
    }

    /// Applies a new drawing-buffer size to the projection and every pass.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) {
        self.camera.resize(queue, width, height);
        self.composer.set_size(device, width, height);
    }

    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &Scene,
        output: &wgpu::TextureView,
    ) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
        let mut frame = Frame {
            device,
            queue,
            encoder: &mut encoder,
            scene,
            camera: &self.camera,
        };
        self.composer.render(&mut frame, output);
        queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_renders_draw_nothing() {
        let render: Render<'_> = Render::Composed(vec![
            Render::None,
            Render::Opaque(Vec::new()),
            Render::Composed(vec![Render::Transparent(Vec::new())]),
        ]);
        assert_eq!(render.draw_count(), 0);
        let (mut opaque, mut transparent) = (Vec::new(), Vec::new());
        render.set_pipelines(&mut opaque, &mut transparent);
        assert!(opaque.is_empty() && transparent.is_empty());
    }
}
