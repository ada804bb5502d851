//! Scene graph and hierarchical scene organization.
//!
//! A loaded glTF model becomes a tree of [`SceneNode`]s below an identity root.
//! Rotating the model only touches the root's local transform; world
//! transforms and instance buffers are refreshed once per frame.

use cgmath::{Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        environment::EnvironmentMap,
        model::{Material, Mesh},
        transform::{Transform, TransformRaw},
    },
    pipelines::lighting::LightingResources,
    render::{Instanced, Render},
    resources::asset::{MaterialData, ModelAsset, NodeData},
};

pub trait SceneNode {
    fn name(&self) -> &str;

    fn get_local_transform(&self) -> Transform;

    fn set_local_transform(&mut self, transform: Transform);

    /// Full parent chain applied, as a matrix so non-uniform scale composes.
    fn get_world_transform(&self) -> Matrix4<f32>;

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    /**
     * Recomputes this node's world transform from its parent's and passes the
     * result down to every child.
     */
    fn update_world_transforms(&mut self, parent: &Matrix4<f32>);

    fn write_to_buffers(&mut self, queue: &wgpu::Queue);

    fn get_render<'a>(&'a self, materials: &'a [Material]) -> Vec<Instanced<'a>>;
}

/// A node without geometry that only groups and transforms its children.
pub struct ContainerNode {
    name: String,
    local: Transform,
    world: Matrix4<f32>,
    children: Vec<Box<dyn SceneNode>>,
}

impl ContainerNode {
    pub fn new(name: &str, local: Transform) -> Self {
        Self {
            name: name.to_string(),
            local,
            world: local.to_matrix(),
            children: Vec::new(),
        }
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_local_transform(&self) -> Transform {
        self.local
    }

    fn set_local_transform(&mut self, transform: Transform) {
        self.local = transform;
    }

    fn get_world_transform(&self) -> Matrix4<f32> {
        self.world
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn update_world_transforms(&mut self, parent: &Matrix4<f32>) {
        self.world = *parent * self.local.to_matrix();
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render<'a>(&'a self, materials: &'a [Material]) -> Vec<Instanced<'a>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render(materials))
            .collect()
    }
}

/// A node carrying the primitives of one glTF mesh.
///
/// Its world transform is uploaded into a one-element instance buffer that every
/// primitive is drawn with.
pub struct MeshNode {
    name: String,
    local: Transform,
    world: Matrix4<f32>,
    meshes: Vec<Mesh>,
    instance_buffer: wgpu::Buffer,
    children: Vec<Box<dyn SceneNode>>,
}

impl MeshNode {
    pub fn new(device: &wgpu::Device, name: &str, local: Transform, meshes: Vec<Mesh>) -> Self {
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Instance Buffer", name)),
            contents: bytemuck::cast_slice(&[local.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            name: name.to_string(),
            local,
            world: local.to_matrix(),
            meshes,
            instance_buffer,
            children: Vec::new(),
        }
    }
}

impl SceneNode for MeshNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_local_transform(&self) -> Transform {
        self.local
    }

    fn set_local_transform(&mut self, transform: Transform) {
        self.local = transform;
    }

    fn get_world_transform(&self) -> Matrix4<f32> {
        self.world
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn update_world_transforms(&mut self, parent: &Matrix4<f32>) {
        self.world = *parent * self.local.to_matrix();
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        let raw: [TransformRaw; 1] = [TransformRaw::from_matrix(self.world)];
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw));
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render<'a>(&'a self, materials: &'a [Material]) -> Vec<Instanced<'a>> {
        let own = self.meshes.iter().filter_map(|mesh| {
            let material = materials.get(mesh.material)?;
            Some(Instanced {
                instance: &self.instance_buffer,
                mesh,
                material,
                amount: 1,
            })
        });
        own.chain(
            self.children
                .iter()
                .flat_map(|child| child.get_render(materials)),
        )
        .collect()
    }
}

/// A glTF model on the GPU: its node tree and the materials its meshes index into.
pub struct Model {
    pub name: String,
    root: ContainerNode,
    pub materials: Vec<Material>,
}

impl Model {
    /// Uploads a decoded asset. Primitives without a material get the glTF
    /// default material, appended after the file's own.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
        asset: &ModelAsset,
    ) -> Self {
        let mut materials: Vec<Material> = asset
            .materials
            .iter()
            .map(|data| Material::new(device, queue, material_layout, data, &asset.images))
            .collect();
        let default_material = materials.len();
        let needs_default = asset
            .meshes
            .iter()
            .flat_map(|mesh| mesh.primitives.iter())
            .any(|primitive| primitive.material.is_none_or(|m| m >= default_material));
        if needs_default {
            materials.push(Material::new(
                device,
                queue,
                material_layout,
                &MaterialData::default(),
                &asset.images,
            ));
        }

        let mut root = ContainerNode::new(&asset.name, Transform::identity());
        for node in &asset.nodes {
            root.add_child(build_node(device, asset, node, default_material));
        }
        root.update_world_transforms(&Matrix4::identity());

        log::info!(
            "Uploaded {} ({} primitives, {} vertices, {} materials)",
            asset.name,
            asset.primitive_count(),
            asset.vertex_count(),
            materials.len()
        );

        Self {
            name: asset.name.clone(),
            root,
            materials,
        }
    }

    /// Orients the whole model. Takes effect with the next [`Model::update`].
    pub fn set_rotation(&mut self, rotation: cgmath::Quaternion<f32>) {
        let mut local = self.root.get_local_transform();
        local.rotation = rotation;
        self.root.set_local_transform(local);
    }

    pub fn update(&mut self, queue: &wgpu::Queue) {
        self.root.update_world_transforms(&Matrix4::identity());
        self.root.write_to_buffers(queue);
    }

    /// Opaque and masked primitives first, blended ones after.
    pub fn get_render(&self) -> Render<'_> {
        let (transparent, opaque): (Vec<_>, Vec<_>) = self
            .root
            .get_render(&self.materials)
            .into_iter()
            .partition(|instanced| instanced.material.alpha_mode.is_blended());
        Render::Composed(vec![Render::Opaque(opaque), Render::Transparent(transparent)])
    }
}

fn build_node(
    device: &wgpu::Device,
    asset: &ModelAsset,
    node: &NodeData,
    default_material: usize,
) -> Box<dyn SceneNode> {
    let mut scene_node: Box<dyn SceneNode> = match node.mesh.and_then(|m| asset.meshes.get(m)) {
        Some(mesh) => {
            let meshes = mesh
                .primitives
                .iter()
                .filter(|primitive| !primitive.indices.is_empty())
                .map(|primitive| {
                    let material = primitive
                        .material
                        .filter(|m| *m < default_material)
                        .unwrap_or(default_material);
                    Mesh::new(
                        device,
                        &mesh.name,
                        &primitive.vertices,
                        &primitive.indices,
                        material,
                    )
                })
                .collect();
            Box::new(MeshNode::new(device, &node.name, node.transform, meshes))
        }
        None => Box::new(ContainerNode::new(&node.name, node.transform)),
    };
    for child in &node.children {
        scene_node.add_child(build_node(device, asset, child, default_material));
    }
    scene_node
}

/// Everything the scene pass draws: the model, once loaded, lit by the
/// current environment.
pub struct Scene {
    pub model: Option<Model>,
    pub lighting: LightingResources,
}

impl Scene {
    pub fn new(lighting: LightingResources) -> Self {
        Self {
            model: None,
            lighting,
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn attach_model(&mut self, model: Model) {
        if let Some(previous) = self.model.replace(model) {
            log::warn!("Replacing already loaded model {}", previous.name);
        }
    }

    /// Swaps in a new environment map. The lighting bind group is rebuilt in
    /// one step, so no frame ever samples a half-updated environment.
    pub fn set_environment(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, map: EnvironmentMap) {
        self.lighting.set_environment(device, queue, map);
    }

    pub fn update(&mut self, queue: &wgpu::Queue, rotation: Option<cgmath::Quaternion<f32>>) {
        if let Some(model) = self.model.as_mut() {
            if let Some(rotation) = rotation {
                model.set_rotation(rotation);
            }
            model.update(queue);
        }
    }

    pub fn get_render(&self) -> Render<'_> {
        match &self.model {
            Some(model) => model.get_render(),
            None => Render::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Point3, Rotation3, Transform as _, Vector3};

    use super::*;

    fn translated(x: f32, y: f32, z: f32) -> Transform {
        Transform {
            position: Vector3::new(x, y, z),
            ..Transform::identity()
        }
    }

    fn origin(world: Matrix4<f32>) -> Vector3<f32> {
        world.w.truncate()
    }

    fn assert_close(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a.x - b.x).abs() < 1e-5, "{:?} != {:?}", a, b);
        assert!((a.y - b.y).abs() < 1e-5, "{:?} != {:?}", a, b);
        assert!((a.z - b.z).abs() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn world_transforms_compose_down_the_tree() {
        let mut root = ContainerNode::new("root", translated(1.0, 0.0, 0.0));
        let mut middle = ContainerNode::new("middle", translated(0.0, 2.0, 0.0));
        middle.add_child(Box::new(ContainerNode::new("leaf", translated(0.0, 0.0, 3.0))));
        root.add_child(Box::new(middle));

        root.update_world_transforms(&Matrix4::identity());

        let middle = &root.get_children()[0];
        let leaf = &middle.get_children()[0];
        assert_close(origin(middle.get_world_transform()), Vector3::new(1.0, 2.0, 0.0));
        assert_close(origin(leaf.get_world_transform()), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(leaf.name(), "leaf");
    }

    #[test]
    fn rotating_the_root_moves_children_around_it() {
        let mut root = ContainerNode::new("root", Transform::identity());
        root.add_child(Box::new(ContainerNode::new("child", translated(1.0, 0.0, 0.0))));

        let mut local = root.get_local_transform();
        local.rotation = cgmath::Quaternion::from_angle_y(Deg(90.0));
        root.set_local_transform(local);
        root.update_world_transforms(&Matrix4::identity());

        let child = &root.get_children()[0];
        assert_close(origin(child.get_world_transform()), Vector3::new(0.0, 0.0, -1.0));
        // The local transform is untouched by the parent.
        assert_eq!(child.get_local_transform(), translated(1.0, 0.0, 0.0));
    }

    #[test]
    fn non_uniform_parent_scale_applies_after_child_rotation() {
        let parent = Transform {
            scale: Vector3::new(2.0, 1.0, 1.0),
            ..Transform::identity()
        };
        let child = Transform {
            rotation: cgmath::Quaternion::from_angle_z(Deg(90.0)),
            ..Transform::identity()
        };
        let mut root = ContainerNode::new("root", parent);
        root.add_child(Box::new(ContainerNode::new("child", child)));
        root.update_world_transforms(&Matrix4::identity());

        let world = root.get_children()[0].get_world_transform();
        let expected = parent.to_matrix() * child.to_matrix();
        let point = Point3::new(1.0, 0.0, 0.0);
        let a = world.transform_point(point);
        let b = expected.transform_point(point);
        assert_close(Vector3::new(a.x, a.y, a.z), Vector3::new(b.x, b.y, b.z));
        assert_close(Vector3::new(a.x, a.y, a.z), Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn containers_render_nothing_themselves() {
        let mut root = ContainerNode::new("root", Transform::identity());
        root.add_child(Box::new(ContainerNode::new("child", Transform::identity())));
        assert!(root.get_render(&[]).is_empty());
    }
}
