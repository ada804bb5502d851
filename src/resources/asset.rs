//! CPU-side model data.
//!
//! Loading happens off the render thread, so a decoded glTF file is kept in
//! these plain structs until the event loop uploads it to the GPU.

use crate::data_structures::{
    model::{AlphaMode, ModelVertex},
    transform::Transform,
};

/// Metallic-roughness material. Texture fields index into [`ModelAsset::images`].
#[derive(Clone, Debug)]
pub struct MaterialData {
    pub name: String,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
    pub base_color: Option<usize>,
    pub metallic_roughness: Option<usize>,
    pub normal: Option<usize>,
    pub occlusion: Option<usize>,
    pub emissive: Option<usize>,
}

/// The glTF default material: white, fully metallic and rough.
impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: "default material".to_string(),
            base_color_factor: [1.0; 4],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0; 3],
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
            base_color: None,
            metallic_roughness: None,
            normal: None,
            occlusion: None,
            emissive: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PrimitiveData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub name: String,
    pub primitives: Vec<PrimitiveData>,
}

#[derive(Clone, Debug, Default)]
pub struct NodeData {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<usize>,
    pub children: Vec<NodeData>,
}

#[derive(Clone, Debug, Default)]
pub struct ModelAsset {
    pub name: String,
    /// Root nodes of the scene.
    pub nodes: Vec<NodeData>,
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,
    pub images: Vec<image::RgbaImage>,
}

impl ModelAsset {
    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.primitives.len()).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes
            .iter()
            .flat_map(|mesh| mesh.primitives.iter())
            .map(|primitive| primitive.vertices.len())
            .sum()
    }
}

/// Cumulative download state of a single file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) | None => None,
            Some(total) => Some(self.loaded as f64 / total as f64 * 100.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_needs_a_known_total() {
        let half = LoadProgress {
            loaded: 50,
            total: Some(200),
        };
        assert_eq!(half.percent(), Some(25.0));
        let unknown = LoadProgress {
            loaded: 50,
            total: None,
        };
        assert_eq!(unknown.percent(), None);
        let empty = LoadProgress {
            loaded: 0,
            total: Some(0),
        };
        assert_eq!(empty.percent(), None);
    }
}
