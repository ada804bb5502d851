use std::sync::Arc;

use anyhow::Context as _;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{config::ViewerConfig, data_structures::texture::Texture};

/// Window, surface and GPU handles. Everything scene related lives elsewhere.
#[derive(Debug)]
pub struct Context {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    /// MSAA sample count the scene pass renders with.
    pub sample_count: u32,
    max_pixel_ratio: f64,
}

/// Size of the drawing buffer for a window of `physical` pixels: the logical size
/// times the device pixel ratio, with the ratio capped at `max_pixel_ratio`.
pub fn drawing_buffer_size(
    physical: PhysicalSize<u32>,
    scale_factor: f64,
    max_pixel_ratio: f64,
) -> PhysicalSize<u32> {
    if scale_factor <= max_pixel_ratio || scale_factor <= 0.0 {
        return physical;
    }
    physical
        .to_logical::<f64>(scale_factor)
        .to_physical::<u32>(max_pixel_ratio)
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("failed to open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // An sRGB surface encodes the final colours in hardware; otherwise the
        // last effect pass does it in its shader.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let alpha_mode = if surface_caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps.alpha_modes[0]
        };

        let size = drawing_buffer_size(
            window.inner_size(),
            window.scale_factor(),
            viewer.max_pixel_ratio,
        );
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let sample_count = if adapter
            .get_texture_format_features(Texture::TARGET_FORMAT)
            .flags
            .sample_count_supported(viewer.msaa_samples)
        {
            viewer.msaa_samples
        } else {
            log::warn!("{}x MSAA unsupported, rendering without it", viewer.msaa_samples);
            1
        };

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            sample_count,
            max_pixel_ratio: viewer.max_pixel_ratio,
        })
    }

    /// Drawing-buffer size for the window's current physical size and scale.
    pub fn drawing_size(&self, physical: PhysicalSize<u32>) -> PhysicalSize<u32> {
        let size = drawing_buffer_size(physical, self.window.scale_factor(), self.max_pixel_ratio);
        let max = self.device.limits().max_texture_dimension_2d;
        PhysicalSize::new(size.width.min(max), size.height.min(max))
    }

    /// Reconfigures the surface. Returns false for a zero-sized window, which
    /// can't be rendered to.
    pub fn resize(&mut self, size: PhysicalSize<u32>) -> bool {
        if size.width == 0 || size.height == 0 {
            return false;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
        true
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_ratio_below_the_cap_is_kept() {
        let physical = PhysicalSize::new(1600, 1200);
        assert_eq!(drawing_buffer_size(physical, 1.0, 2.0), physical);
        assert_eq!(drawing_buffer_size(physical, 2.0, 2.0), physical);
    }

    #[test]
    fn pixel_ratio_above_the_cap_is_clamped() {
        // 800x600 logical on a 3x display
        let physical = PhysicalSize::new(2400, 1800);
        assert_eq!(
            drawing_buffer_size(physical, 3.0, 2.0),
            PhysicalSize::new(1600, 1200)
        );
    }

    #[test]
    fn zero_sized_windows_stay_zero() {
        let physical = PhysicalSize::new(0, 0);
        assert_eq!(drawing_buffer_size(physical, 3.0, 2.0), physical);
    }
}
