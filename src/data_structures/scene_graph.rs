//! Scene graph and hierarchical scene organization.
//!
//! Loaded files become trees of [`SceneNode`]s: [`ContainerNode`]s group
//! children and [`ModelNode`]s carry a single drawable [`MeshNode`]. Top-level
//! trees live in a [`SceneRoot`], an append-only list where every entry
//! remembers which descriptor produced it.

use cgmath::{Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::{Instance, InstanceRaw},
        model::{Material, MeshNode},
    },
    pipelines::{MaterialLayouts, outline::OutlineMaterial},
    render::Instanced,
};

pub trait SceneNode: Send {
    fn name(&self) -> &str;

    fn get_local_transform(&self) -> &Instance;

    fn set_local_transform(&mut self, instance: Instance);

    fn get_world_transform(&self) -> &Matrix4<f32>;

    /// Recomputes `world = parent * local` for `self` and the subtree below.
    fn update_world_transforms(&mut self, parent: &Matrix4<f32>);

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    fn mesh(&self) -> Option<&MeshNode>;

    fn mesh_mut(&mut self) -> Option<&mut MeshNode>;

    /// An independent copy of the subtree.
    ///
    /// Transforms and materials are copied, geometry stays shared and
    /// immutable. GPU buffers and shadow flags are not carried over.
    fn deep_clone(&self) -> Box<dyn SceneNode>;

    /// The same subtree with every mesh drawn by an outline material.
    fn to_outline(&self, thickness: f32) -> Box<dyn SceneNode>;

    fn write_to_buffers(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        layouts: &MaterialLayouts,
    );

    fn get_render(&self) -> Vec<Instanced<'_>>;

    fn traverse_meshes(&self, visit: &mut dyn FnMut(&MeshNode)) {
        if let Some(mesh) = self.mesh() {
            visit(mesh);
        }
        for child in self.get_children() {
            child.traverse_meshes(visit);
        }
    }

    fn traverse_meshes_mut(&mut self, visit: &mut dyn FnMut(&mut MeshNode)) {
        if let Some(mesh) = self.mesh_mut() {
            visit(mesh);
        }
        for child in self.get_children_mut() {
            child.traverse_meshes_mut(visit);
        }
    }

    /// Number of nodes in the subtree, `self` included.
    fn count_nodes(&self) -> usize {
        1 + self
            .get_children()
            .iter()
            .map(|child| child.count_nodes())
            .sum::<usize>()
    }
}

pub struct ContainerNode {
    pub name: String,
    pub children: Vec<Box<dyn SceneNode>>,
    local: Instance,
    world: Matrix4<f32>,
}

impl ContainerNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: vec![],
            local: Instance::default(),
            world: Matrix4::identity(),
        }
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_local_transform(&self) -> &Instance {
        &self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> &Matrix4<f32> {
        &self.world
    }

    fn update_world_transforms(&mut self, parent: &Matrix4<f32>) {
        self.world = parent * self.local.to_matrix();
        for child in self.children.iter_mut() {
            child.update_world_transforms(&self.world);
        }
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn mesh(&self) -> Option<&MeshNode> {
        None
    }

    fn mesh_mut(&mut self) -> Option<&mut MeshNode> {
        None
    }

    fn deep_clone(&self) -> Box<dyn SceneNode> {
        Box::new(Self {
            name: self.name.clone(),
            children: self.children.iter().map(|c| c.deep_clone()).collect(),
            local: self.local.clone(),
            world: self.world,
        })
    }

    fn to_outline(&self, thickness: f32) -> Box<dyn SceneNode> {
        Box::new(Self {
            name: format!("{} (outline)", self.name),
            children: self
                .children
                .iter()
                .map(|c| c.to_outline(thickness))
                .collect(),
            local: self.local.clone(),
            world: self.world,
        })
    }

    fn write_to_buffers(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        layouts: &MaterialLayouts,
    ) {
        self.get_children_mut()
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue, device, layouts));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .collect()
    }
}

pub struct ModelNode {
    pub name: String,
    children: Vec<Box<dyn SceneNode>>,
    mesh: MeshNode,
    local: Instance,
    world: Matrix4<f32>,
    instance_buffer: Option<wgpu::Buffer>,
}

impl ModelNode {
    pub fn new(name: impl Into<String>, mesh: MeshNode) -> Self {
        Self {
            name: name.into(),
            children: vec![],
            mesh,
            local: Instance::default(),
            world: Matrix4::identity(),
            instance_buffer: None,
        }
    }
}

impl SceneNode for ModelNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_local_transform(&self) -> &Instance {
        &self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> &Matrix4<f32> {
        &self.world
    }

    fn update_world_transforms(&mut self, parent: &Matrix4<f32>) {
        self.world = parent * self.local.to_matrix();
        for child in self.children.iter_mut() {
            child.update_world_transforms(&self.world);
        }
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn mesh(&self) -> Option<&MeshNode> {
        Some(&self.mesh)
    }

    fn mesh_mut(&mut self) -> Option<&mut MeshNode> {
        Some(&mut self.mesh)
    }

    fn deep_clone(&self) -> Box<dyn SceneNode> {
        Box::new(Self {
            name: self.name.clone(),
            children: self.children.iter().map(|c| c.deep_clone()).collect(),
            mesh: self.mesh.duplicate(),
            local: self.local.clone(),
            world: self.world,
            instance_buffer: None,
        })
    }

    fn to_outline(&self, thickness: f32) -> Box<dyn SceneNode> {
        let mesh = MeshNode::new(
            self.mesh.geometry.clone(),
            Material::Outline(OutlineMaterial::new(thickness)),
        );
        Box::new(Self {
            name: format!("{} (outline)", self.name),
            children: self
                .children
                .iter()
                .map(|c| c.to_outline(thickness))
                .collect(),
            mesh,
            local: self.local.clone(),
            world: self.world,
            instance_buffer: None,
        })
    }

    fn write_to_buffers(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        layouts: &MaterialLayouts,
    ) {
        self.mesh.geometry.upload(device);
        self.mesh.material.prepare(device, queue, layouts);

        let raw = [InstanceRaw::new(&self.world, self.mesh.receive_shadow)];
        match &self.instance_buffer {
            Some(buffer) => queue.write_buffer(buffer, 0, bytemuck::cast_slice(&raw)),
            None => {
                self.instance_buffer =
                    Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Instance Buffer"),
                        contents: bytemuck::cast_slice(&raw),
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    }));
            }
        }
        self.get_children_mut()
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue, device, layouts));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        let own = match (
            &self.instance_buffer,
            self.mesh.geometry.buffers(),
            self.mesh.material.bind_group(),
        ) {
            (Some(instance), Some(geometry), Some(material)) => Some(Instanced {
                instance,
                geometry,
                material,
                kind: self.mesh.material.kind(),
                cast_shadow: self.mesh.cast_shadow,
                amount: 1,
            }),
            _ => None,
        };
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .chain(own)
            .collect()
    }
}

/// What produced a top-level node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Scenery that exists before any asset loads, e.g. the ground plane.
    Static,
    Primary,
    Outline,
    Clone { rule: usize },
    CloneOutline { rule: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribution {
    pub descriptor: Option<usize>,
    pub kind: NodeKind,
}

impl Attribution {
    pub fn of(descriptor: usize, kind: NodeKind) -> Self {
        Self {
            descriptor: Some(descriptor),
            kind,
        }
    }

    pub fn scenery() -> Self {
        Self {
            descriptor: None,
            kind: NodeKind::Static,
        }
    }
}

/// The scene's top-level node list. Insertion only appends.
#[derive(Default)]
pub struct SceneRoot {
    entries: Vec<(Attribution, Box<dyn SceneNode>)>,
}

impl SceneRoot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `node` and returns its index.
    pub fn insert(&mut self, attribution: Attribution, node: Box<dyn SceneNode>) -> usize {
        self.entries.push((attribution, node));
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn node(&self, idx: usize) -> Option<&dyn SceneNode> {
        self.entries.get(idx).map(|(_, node)| node.as_ref())
    }

    pub fn node_mut(&mut self, idx: usize) -> Option<&mut Box<dyn SceneNode>> {
        self.entries.get_mut(idx).map(|(_, node)| node)
    }

    pub fn attribution(&self, idx: usize) -> Option<Attribution> {
        self.entries.get(idx).map(|(attribution, _)| *attribution)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribution, &dyn SceneNode)> {
        self.entries
            .iter()
            .map(|(attribution, node)| (*attribution, node.as_ref()))
    }

    /// Indices of every top-level node produced by `descriptor`.
    pub fn attributed_to(&self, descriptor: usize) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, (attribution, _))| attribution.descriptor == Some(descriptor))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn update_world_transforms(&mut self) {
        let identity = Matrix4::identity();
        for (_, node) in self.entries.iter_mut() {
            node.update_world_transforms(&identity);
        }
    }

    pub fn write_to_buffers(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        layouts: &MaterialLayouts,
    ) {
        for (_, node) in self.entries.iter_mut() {
            node.write_to_buffers(queue, device, layouts);
        }
    }

    /// Everything uploaded so far that can be drawn this frame.
    pub fn get_render(&self) -> Vec<Instanced<'_>> {
        self.entries
            .iter()
            .flat_map(|(_, node)| node.get_render())
            .collect()
    }
}
