//! Post-processing chain.
//!
//! An [`EffectComposer`] runs its passes in insertion order. Every pass but the
//! last renders into one of two intermediate targets, alternating between them,
//! and the next pass reads what the previous one wrote. The last pass writes to
//! the output view handed to [`EffectComposer::render`].

use crate::{camera::CameraResources, data_structures::{scene_graph::Scene, texture::Texture}};

/// Everything a pass may need while recording one frame.
pub struct Frame<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub scene: &'a Scene,
    pub camera: &'a CameraResources,
}

pub trait Pass {
    fn name(&self) -> &str;

    fn size(&self) -> (u32, u32);

    /// Recreates size dependent resources such as multisampled targets.
    fn set_size(&mut self, device: &wgpu::Device, width: u32, height: u32);

    /// `read` is the previous pass's output, `None` for the first pass.
    fn render(
        &mut self,
        frame: &mut Frame<'_>,
        read: Option<&wgpu::TextureView>,
        write: &wgpu::TextureView,
    );
}

pub struct EffectComposer {
    passes: Vec<Box<dyn Pass>>,
    targets: [Texture; 2],
    width: u32,
    height: u32,
}

impl EffectComposer {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self {
            passes: Vec::new(),
            targets: Self::mk_targets(device, width, height),
            width,
            height,
        }
    }

    fn mk_targets(device: &wgpu::Device, width: u32, height: u32) -> [Texture; 2] {
        [0, 1].map(|i| {
            Texture::create_render_target(
                device,
                [width, height],
                Texture::TARGET_FORMAT,
                1,
                &format!("Composer Target {}", i),
            )
        })
    }

    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        log::debug!("Adding pass {}", pass.name());
        self.passes.push(pass);
    }

    pub fn passes(&self) -> &[Box<dyn Pass>] {
        &self.passes
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resizes the intermediate targets and every pass.
    pub fn set_size(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            self.targets = Self::mk_targets(device, width, height);
            self.width = width;
            self.height = height;
        }
        for pass in self.passes.iter_mut() {
            pass.set_size(device, width, height);
        }
    }

    /// Records every pass into the frame's encoder.
    pub fn render(&mut self, frame: &mut Frame<'_>, output: &wgpu::TextureView) {
        let last = self.passes.len().saturating_sub(1);
        for (i, pass) in self.passes.iter_mut().enumerate() {
            let read = (i > 0).then(|| &self.targets[(i - 1) % 2].view);
            let write = if i == last {
                output
            } else {
                &self.targets[i % 2].view
            };
            pass.render(frame, read, write);
        }
    }
}
