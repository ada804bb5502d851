use std::time::Duration;

use helmet_viewer::{
    config::ViewerConfig,
    data_structures::{scene_graph::Scene, texture::Texture},
    pipelines::lighting::LightingResources,
    render::Renderer,
};

/// Rows of a texture copy must be 256 byte aligned, 64 RGBA8 texels are exactly that.
pub(crate) const WIDTH: u32 = 64;
pub(crate) const HEIGHT: u32 = 64;

/// A device without a window. Frames go into an offscreen target that can be
/// read back.
pub(crate) struct Headless {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) target: Texture,
}

impl Headless {
    pub(crate) async fn new() -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await?;
        let target = Texture::create_render_target(
            &device,
            [WIDTH, HEIGHT],
            Texture::TARGET_FORMAT,
            1,
            "Test Output",
        );
        Ok(Self {
            device,
            queue,
            target,
        })
    }

    /// Renderer and an empty scene, without MSAA.
    pub(crate) fn viewer(&self, config: &ViewerConfig) -> (Renderer, Scene) {
        let lighting = LightingResources::new(&self.device, &self.queue, config);
        let renderer = Renderer::new(
            &self.device,
            Texture::TARGET_FORMAT,
            1,
            (WIDTH, HEIGHT),
            config,
            &lighting.bind_group_layout,
        );
        (renderer, Scene::new(lighting))
    }

    pub(crate) async fn read_target(&self) -> anyhow::Result<image::RgbaImage> {
        let u32_size = std::mem::size_of::<u32>() as u32;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            size: (u32_size * WIDTH * HEIGHT) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: None,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(u32_size * WIDTH),
                    rows_per_image: Some(HEIGHT),
                },
            },
            wgpu::Extent3d {
                width: WIDTH,
                height: HEIGHT,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).unwrap();
        });
        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })?;
        rx.receive()
            .await
            .ok_or_else(|| anyhow::anyhow!("map callback dropped"))??;
        let data = buffer_slice.get_mapped_range().to_vec();
        output_buffer.unmap();
        image::RgbaImage::from_raw(WIDTH, HEIGHT, data)
            .ok_or_else(|| anyhow::anyhow!("readback has the wrong size"))
    }
}

/// Runs a future to completion on a fresh runtime.
pub(crate) fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Runtime::new()
        .expect("Failed to create a runtime for the test.")
        .block_on(future)
}
