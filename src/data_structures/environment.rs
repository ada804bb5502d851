//! Prefiltered environment cube maps.

/// Format of every prefiltered cube. WebGL2 can render to and filter it.
pub const ENVIRONMENT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// A cube texture whose mip levels hold radiance prefiltered for increasing
/// roughness, mip 0 being a mirror reflection.
#[derive(Debug)]
pub struct EnvironmentMap {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: u32,
    pub mip_level_count: u32,
}

impl EnvironmentMap {
    pub fn create_cube(device: &wgpu::Device, size: u32, mip_level_count: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ENVIRONMENT_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        Self {
            texture,
            view,
            size,
            mip_level_count,
        }
    }

    /// A black 1x1 cube, used until a real environment has been prefiltered.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let map = Self::create_cube(device, 1, 1, "Placeholder Environment");
        // Eight bytes per texel: four half floats, all zero.
        let black = [0u8; 8 * 6];
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &map.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &black,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(8),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 6,
            },
        );
        map
    }

    pub fn max_mip(&self) -> f32 {
        self.mip_level_count.saturating_sub(1) as f32
    }

    /// View of a single face of one mip level, used as a render target.
    pub fn face_view(&self, face: u32, mip_level: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Environment Face"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: mip_level,
            mip_level_count: Some(1),
            base_array_layer: face,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }
}

/// Number of mip levels generated for a cube of `face_size`, stopping at 16 px faces.
pub fn mip_count(face_size: u32) -> u32 {
    let mut count = 1;
    let mut size = face_size;
    while size > 16 {
        size /= 2;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_ends_at_sixteen_pixels() {
        assert_eq!(mip_count(256), 5);
        assert_eq!(mip_count(512), 6);
        assert_eq!(mip_count(16), 1);
        assert_eq!(mip_count(8), 1);
    }
}
