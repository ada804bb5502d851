use std::collections::HashMap;

use anyhow::{Context as _, bail};

use crate::{
    data_structures::{model::AlphaMode, model::ModelVertex, transform::Transform},
    resources::{
        asset::{LoadProgress, MaterialData, MeshData, ModelAsset, NodeData, PrimitiveData},
        mesh::{bitangent_from, compute_tangents},
        texture::{load_binary, load_binary_with_progress, resolve_uri},
    },
};

pub mod asset;
pub mod environment;
pub mod mesh;
pub mod texture;

/// Fetches a glTF (or GLB) file together with every external buffer and image
/// it references, and decodes it into a [`ModelAsset`].
///
/// `on_progress` only sees the main file; referenced files are small in
/// comparison or already covered by the total of a GLB.
pub async fn load_model_gltf(
    file_name: &str,
    on_progress: impl FnMut(LoadProgress),
) -> anyhow::Result<ModelAsset> {
    let bytes = load_binary_with_progress(file_name, on_progress)
        .await
        .with_context(|| format!("failed to fetch model {}", file_name))?;
    let gltf = gltf::Gltf::from_slice(&bytes)
        .with_context(|| format!("{} is not a valid glTF file", file_name))?;

    let mut external = HashMap::new();
    let buffer_uris = gltf.buffers().filter_map(|buffer| match buffer.source() {
        gltf::buffer::Source::Uri(uri) => Some(uri.to_string()),
        gltf::buffer::Source::Bin => None,
    });
    let image_uris = gltf.images().filter_map(|image| match image.source() {
        gltf::image::Source::Uri { uri, .. } => Some(uri.to_string()),
        gltf::image::Source::View { .. } => None,
    });
    for uri in buffer_uris.chain(image_uris).collect::<Vec<_>>() {
        if uri.starts_with("data:") {
            bail!("{}: embedded data URIs are not supported", file_name);
        }
        if external.contains_key(&uri) {
            continue;
        }
        let data = load_binary(&resolve_uri(file_name, &uri))
            .await
            .with_context(|| format!("failed to fetch {} referenced by {}", uri, file_name))?;
        external.insert(uri, data);
    }

    let mut asset = decode_gltf(&bytes, &external)?;
    asset.name = file_name.to_string();
    Ok(asset)
}

/// Decodes a glTF or GLB file. External resources are looked up in `external`
/// by the URI exactly as written in the file.
pub fn decode_gltf(
    bytes: &[u8],
    external: &HashMap<String, Vec<u8>>,
) -> anyhow::Result<ModelAsset> {
    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(bytes).context("not a valid glTF file")?;

    // Load buffers
    let mut buffers: Vec<Vec<u8>> = Vec::new();
    for buffer in document.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => blob
                .clone()
                .context("glTF references a binary chunk but has none")?,
            gltf::buffer::Source::Uri(uri) => external
                .get(uri)
                .cloned()
                .with_context(|| format!("missing buffer {}", uri))?,
        };
        if data.len() < buffer.length() {
            bail!(
                "buffer {} holds {} bytes, expected {}",
                buffer.index(),
                data.len(),
                buffer.length()
            );
        }
        buffers.push(data);
    }

    // Load images
    let mut images = Vec::new();
    for image in document.images() {
        let bytes: &[u8] = match image.source() {
            gltf::image::Source::View { view, .. } => {
                let end = view.offset().checked_add(view.length());
                buffers
                    .get(view.buffer().index())
                    .zip(end)
                    .and_then(|(buffer, end)| buffer.get(view.offset()..end))
                    .with_context(|| format!("image {} view out of range", image.index()))?
            }
            gltf::image::Source::Uri { uri, .. } => external
                .get(uri)
                .with_context(|| format!("missing image {}", uri))?
                .as_slice(),
        };
        let decoded = image::load_from_memory(bytes)
            .with_context(|| format!("failed to decode image {}", image.index()))?;
        images.push(decoded.to_rgba8());
    }

    // Load materials
    let texture_index = |info: Option<gltf::texture::Texture<'_>>| info.map(|t| t.source().index());
    let materials = document
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let alpha_mode = match material.alpha_mode() {
                gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
                gltf::material::AlphaMode::Mask => {
                    AlphaMode::Mask(material.alpha_cutoff().unwrap_or(0.5))
                }
                gltf::material::AlphaMode::Blend => AlphaMode::Blend,
            };
            MaterialData {
                name: material
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("material {}", material.index().unwrap_or(0))),
                base_color_factor: pbr.base_color_factor(),
                metallic_factor: pbr.metallic_factor(),
                roughness_factor: pbr.roughness_factor(),
                emissive_factor: material.emissive_factor(),
                normal_scale: material.normal_texture().map_or(1.0, |t| t.scale()),
                occlusion_strength: material.occlusion_texture().map_or(1.0, |t| t.strength()),
                alpha_mode,
                double_sided: material.double_sided(),
                base_color: texture_index(pbr.base_color_texture().map(|t| t.texture())),
                metallic_roughness: texture_index(
                    pbr.metallic_roughness_texture().map(|t| t.texture()),
                ),
                normal: texture_index(material.normal_texture().map(|t| t.texture())),
                occlusion: texture_index(material.occlusion_texture().map(|t| t.texture())),
                emissive: texture_index(material.emissive_texture().map(|t| t.texture())),
            }
        })
        .collect();

    // Load meshes
    let meshes = document
        .meshes()
        .map(|mesh| {
            let name = mesh
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("mesh {}", mesh.index()));
            let primitives = mesh
                .primitives()
                .filter_map(|primitive| {
                    if primitive.mode() != gltf::mesh::Mode::Triangles {
                        log::warn!("{}: skipping non-triangle primitive in {}", name, mesh.index());
                        return None;
                    }
                    Some(read_primitive(&primitive, &buffers))
                })
                .collect();
            MeshData { name, primitives }
        })
        .collect();

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .context("glTF file contains no scene")?;
    let nodes = scene.nodes().map(|node| read_node(&node)).collect();

    Ok(ModelAsset {
        name: "model".to_string(),
        nodes,
        meshes,
        materials,
        images,
    })
}

fn read_primitive(primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> PrimitiveData {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let mut vertices: Vec<ModelVertex> = reader
        .read_positions()
        .map(|positions| {
            positions
                .map(|position| ModelVertex {
                    position,
                    ..Default::default()
                })
                .collect()
        })
        .unwrap_or_default();
    if let Some(normals) = reader.read_normals() {
        vertices
            .iter_mut()
            .zip(normals)
            .for_each(|(vertex, normal)| vertex.normal = normal);
    }
    if let Some(tex_coords) = reader.read_tex_coords(0) {
        vertices
            .iter_mut()
            .zip(tex_coords.into_f32())
            .for_each(|(vertex, tex_coords)| vertex.tex_coords = tex_coords);
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    match reader.read_tangents() {
        Some(tangents) => vertices.iter_mut().zip(tangents).for_each(|(vertex, tangent)| {
            vertex.tangent = [tangent[0], tangent[1], tangent[2]];
            vertex.bitangent = bitangent_from(vertex.normal, tangent);
        }),
        None => compute_tangents(&mut vertices, &indices),
    }

    PrimitiveData {
        vertices,
        indices,
        material: primitive.material().index(),
    }
}

fn read_node(node: &gltf::Node) -> NodeData {
    let (translation, rotation, scale) = node.transform().decomposed();
    NodeData {
        name: node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node {}", node.index())),
        transform: Transform::from_trs(translation, rotation, scale),
        mesh: node.mesh().map(|mesh| mesh.index()),
        children: node.children().map(|child| read_node(&child)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A GLB with one textured triangle below a translated root node.
    fn triangle_glb() -> Vec<u8> {
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let uvs: [[f32; 2]; 3] = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0]];
        let indices: [u16; 3] = [0, 1, 2];
        let mut bin: Vec<u8> = Vec::new();
        bin.extend_from_slice(bytemuck::cast_slice(&positions));
        bin.extend_from_slice(bytemuck::cast_slice(&uvs));
        bin.extend_from_slice(bytemuck::cast_slice(&indices));
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "root", "translation": [0.0, 2.0, 0.0], "children": [1] }},
    {{ "name": "triangle", "mesh": 0, "rotation": [0.0, 0.0, 0.0, 1.0] }}
  ],
  "meshes": [{{ "name": "tri", "primitives": [{{
    "attributes": {{ "POSITION": 0, "TEXCOORD_0": 1 }},
    "indices": 2,
    "material": 0
  }}] }}],
  "materials": [{{
    "name": "red",
    "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.0, 0.0, 1.0], "metallicFactor": 0.25 }},
    "alphaMode": "MASK",
    "doubleSided": true
  }}],
  "buffers": [{{ "byteLength": {len} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 24 }},
    {{ "buffer": 0, "byteOffset": 60, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
            len = bin.len()
        );
        glb(json, bin)
    }

    fn glb(json: String, bin: Vec<u8>) -> Vec<u8> {
        let mut json = json.into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    fn decode(bytes: &[u8]) -> anyhow::Result<ModelAsset> {
        decode_gltf(bytes, &HashMap::new())
    }

    #[test]
    fn decodes_geometry_from_glb() {
        let asset = decode(&triangle_glb()).unwrap();
        assert_eq!(asset.primitive_count(), 1);
        assert_eq!(asset.vertex_count(), 3);
        let primitive = &asset.meshes[0].primitives[0];
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(primitive.vertices[2].tex_coords, [0.0, 0.0]);
        assert_eq!(primitive.material, Some(0));
    }

    #[test]
    fn computes_missing_tangents() {
        let asset = decode(&triangle_glb()).unwrap();
        for vertex in &asset.meshes[0].primitives[0].vertices {
            assert!((vertex.tangent[0] - 1.0).abs() < 1e-5, "{:?}", vertex.tangent);
            assert!((vertex.bitangent[1] - 1.0).abs() < 1e-5, "{:?}", vertex.bitangent);
        }
    }

    #[test]
    fn keeps_the_node_hierarchy() {
        let asset = decode(&triangle_glb()).unwrap();
        assert_eq!(asset.nodes.len(), 1);
        let root = &asset.nodes[0];
        assert_eq!(root.name, "root");
        assert_eq!(root.mesh, None);
        assert_eq!(root.transform.position, cgmath::Vector3::new(0.0, 2.0, 0.0));
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].mesh, Some(0));
    }

    #[test]
    fn reads_material_factors() {
        let asset = decode(&triangle_glb()).unwrap();
        let material = &asset.materials[0];
        assert_eq!(material.name, "red");
        assert_eq!(material.base_color_factor, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(material.metallic_factor, 0.25);
        assert_eq!(material.roughness_factor, 1.0);
        assert_eq!(material.alpha_mode, AlphaMode::Mask(0.5));
        assert!(material.double_sided);
        assert_eq!(material.base_color, None);
    }

    #[test]
    fn image_view_past_the_buffer_is_an_error() {
        let json = r#"{
  "asset": { "version": "2.0" },
  "buffers": [{ "byteLength": 8 }],
  "bufferViews": [{ "buffer": 0, "byteOffset": 4, "byteLength": 64 }],
  "images": [{ "bufferView": 0, "mimeType": "image/png" }]
}"#;
        let error = decode(&glb(json.to_string(), vec![0; 8])).unwrap_err();
        assert!(format!("{:#}", error).contains("image 0 view out of range"));
    }

    #[test]
    fn missing_external_buffer_is_an_error() {
        let json = br#"{
  "asset": { "version": "2.0" },
  "buffers": [{ "uri": "missing.bin", "byteLength": 4 }]
}"#;
        let error = decode_gltf(json, &HashMap::new()).unwrap_err();
        assert!(format!("{:#}", error).contains("missing.bin"));
    }
}
