use anyhow::Context as _;

use crate::resources::asset::LoadProgress;

/// Directory relative assets are read from on native targets.
#[cfg(not(target_arch = "wasm32"))]
pub const ASSET_DIR: &str = "assets";

/// Bind group layout shared by every material: five textures, one sampler, factors.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            // base colour, metallic-roughness, normal, occlusion, emissive
            texture(0),
            texture(1),
            texture(2),
            texture(3),
            texture(4),
            wgpu::BindGroupLayoutEntry {
                binding: 5,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 6,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

pub fn is_remote(file_name: &str) -> bool {
    file_name.starts_with("http://") || file_name.starts_with("https://")
}

/// Resolves `uri` (as found inside a glTF file) against the file that referenced it.
pub fn resolve_uri(base: &str, uri: &str) -> String {
    if is_remote(uri) {
        return uri.to_string();
    }
    let base = base.trim_start_matches("./");
    let uri = uri.trim_start_matches("./");
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    if is_remote(file_name) {
        return Ok(reqwest::Url::parse(file_name)?);
    }
    let window = web_sys::window().context("no window available")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page origin is not accessible"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name.trim_start_matches("./"))?)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    load_binary_with_progress(file_name, |_| ()).await
}

/// Fetches a file, reporting the cumulative number of bytes received.
///
/// Absolute `http(s)` URLs go over the network on every target. Anything else is
/// read from [`ASSET_DIR`] natively and from `<origin>/assets/` on the web.
pub async fn load_binary_with_progress(
    file_name: &str,
    mut on_progress: impl FnMut(LoadProgress),
) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        let response = reqwest::get(url).await?.error_for_status()?;
        let total = response.content_length();
        let data = response.bytes().await?.to_vec();
        on_progress(LoadProgress {
            loaded: data.len() as u64,
            total,
        });
        data
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = if is_remote(file_name) {
        let mut response = reqwest::get(file_name).await?.error_for_status()?;
        let total = response.content_length();
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            on_progress(LoadProgress {
                loaded: data.len() as u64,
                total,
            });
        }
        data
    } else {
        let path = std::path::Path::new("./")
            .join(ASSET_DIR)
            .join(file_name.trim_start_matches("./"));
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("could not read {}", path.display()))?;
        on_progress(LoadProgress {
            loaded: data.len() as u64,
            total: Some(data.len() as u64),
        });
        data
    };

    Ok(data)
}
