//! Meshes, materials and vertex layouts.
//!
//! Geometry and materials are kept on the CPU until the render thread uploads
//! them. Geometry is immutable once built and shared between a node, its
//! outline companion and its clones through an `Arc`; materials are owned per
//! mesh and carry a `needs_update` flag that asks the renderer to rebuild
//! their GPU bind group.

use std::{
    ops::Range,
    sync::{Arc, OnceLock},
};

use cgmath::InnerSpace;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::texture::Texture,
    pipelines::{MaterialLayouts, outline::OutlineMaterial},
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[derive(Debug)]
pub struct GeometryBuffers {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

/// Triangle list geometry. Uploaded at most once.
#[derive(Debug)]
pub struct Geometry {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    buffers: OnceLock<GeometryBuffers>,
}

impl Geometry {
    pub fn new(name: impl Into<String>, vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            buffers: OnceLock::new(),
        }
    }

    /// A `width` x `height` plane in the XY plane facing +Z.
    pub fn plane(name: impl Into<String>, width: f32, height: f32) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        let normal = [0.0, 0.0, 1.0];
        let vertices = vec![
            ModelVertex {
                position: [-hw, -hh, 0.0],
                tex_coords: [0.0, 1.0],
                normal,
            },
            ModelVertex {
                position: [hw, -hh, 0.0],
                tex_coords: [1.0, 1.0],
                normal,
            },
            ModelVertex {
                position: [hw, hh, 0.0],
                tex_coords: [1.0, 0.0],
                normal,
            },
            ModelVertex {
                position: [-hw, hh, 0.0],
                tex_coords: [0.0, 0.0],
                normal,
            },
        ];
        Self::new(name, vertices, vec![0, 1, 2, 0, 2, 3])
    }

    /// Smooth vertex normals accumulated from face normals.
    ///
    /// Only used when a file ships without normals; the outline shader pushes
    /// vertices along these so they must not stay zero.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![cgmath::Vector3::new(0.0f32, 0.0, 0.0); self.vertices.len()];
        for c in self.indices.chunks_exact(3) {
            let (a, b, d) = (c[0] as usize, c[1] as usize, c[2] as usize);
            if a >= normals.len() || b >= normals.len() || d >= normals.len() {
                continue;
            }
            let p0: cgmath::Vector3<f32> = self.vertices[a].position.into();
            let p1: cgmath::Vector3<f32> = self.vertices[b].position.into();
            let p2: cgmath::Vector3<f32> = self.vertices[d].position.into();
            let face = (p1 - p0).cross(p2 - p0);
            normals[a] += face;
            normals[b] += face;
            normals[d] += face;
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            if normal.magnitude2() > 0.0 {
                vertex.normal = normal.normalize().into();
            }
        }
    }

    pub fn upload(&self, device: &wgpu::Device) -> &GeometryBuffers {
        self.buffers.get_or_init(|| {
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{:?} Vertex Buffer", self.name)),
                contents: bytemuck::cast_slice(&self.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{:?} Index Buffer", self.name)),
                contents: bytemuck::cast_slice(&self.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            GeometryBuffers {
                vertex_buffer,
                index_buffer,
                num_elements: self.indices.len() as u32,
            }
        })
    }

    pub fn buffers(&self) -> Option<&GeometryBuffers> {
        self.buffers.get()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialUniform {
    base_color: [f32; 4],
}

/// Lit, optionally textured surface.
#[derive(Debug)]
pub struct StandardMaterial {
    pub name: String,
    /// Linear RGBA multiplier applied to the diffuse texture.
    pub base_color: [f32; 4],
    pub diffuse: Option<Arc<image::RgbaImage>>,
    needs_update: bool,
    bind_group: Option<wgpu::BindGroup>,
}

impl StandardMaterial {
    pub fn new(
        name: impl Into<String>,
        base_color: [f32; 4],
        diffuse: Option<Arc<image::RgbaImage>>,
    ) -> Self {
        Self {
            name: name.into(),
            base_color,
            diffuse,
            needs_update: true,
            bind_group: None,
        }
    }

    fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) {
        let texture = match &self.diffuse {
            Some(image) => Texture::from_image(device, queue, image, Some(&self.name), false),
            None => Texture::create_solid([255, 255, 255, 255], device, queue),
        };
        let uniform = MaterialUniform {
            base_color: self.base_color,
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material Buffer", self.name)),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
            label: Some(&self.name),
        }));
    }

    fn duplicate(&self) -> Self {
        Self::new(self.name.clone(), self.base_color, self.diffuse.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialKind {
    Standard,
    Outline,
}

#[derive(Debug)]
pub enum Material {
    Standard(StandardMaterial),
    Outline(OutlineMaterial),
}

impl Material {
    pub fn kind(&self) -> MaterialKind {
        match self {
            Material::Standard(_) => MaterialKind::Standard,
            Material::Outline(_) => MaterialKind::Outline,
        }
    }

    pub fn as_outline(&self) -> Option<&OutlineMaterial> {
        match self {
            Material::Outline(outline) => Some(outline),
            Material::Standard(_) => None,
        }
    }

    pub fn needs_update(&self) -> bool {
        match self {
            Material::Standard(m) => m.needs_update,
            Material::Outline(m) => m.needs_update(),
        }
    }

    /// Forces the bind group to be rebuilt before the next frame.
    pub fn mark_needs_update(&mut self) {
        match self {
            Material::Standard(m) => m.needs_update = true,
            Material::Outline(m) => m.mark_needs_update(),
        }
    }

    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, layouts: &MaterialLayouts) {
        if !self.needs_update() {
            return;
        }
        match self {
            Material::Standard(m) => {
                m.prepare(device, queue, &layouts.standard);
                m.needs_update = false;
            }
            Material::Outline(m) => m.prepare(device, &layouts.outline),
        }
    }

    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        match self {
            Material::Standard(m) => m.bind_group.as_ref(),
            Material::Outline(m) => m.bind_group(),
        }
    }

    /// Copies the parameters into a fresh material with no GPU state.
    pub fn duplicate(&self) -> Self {
        match self {
            Material::Standard(m) => Material::Standard(m.duplicate()),
            Material::Outline(m) => Material::Outline(OutlineMaterial::new(m.thickness)),
        }
    }
}

/// A drawable leaf: shared geometry, an owned material and shadow flags.
#[derive(Debug)]
pub struct MeshNode {
    pub geometry: Arc<Geometry>,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl MeshNode {
    pub fn new(geometry: Arc<Geometry>, material: Material) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    /// Geometry is shared, the material is copied and shadow flags start cleared.
    pub fn duplicate(&self) -> Self {
        Self::new(self.geometry.clone(), self.material.duplicate())
    }
}

pub trait DrawMesh {
    fn draw_mesh_instanced(&mut self, geometry: &GeometryBuffers, instances: Range<u32>);
}

impl DrawMesh for wgpu::RenderPass<'_> {
    fn draw_mesh_instanced(&mut self, geometry: &GeometryBuffers, instances: Range<u32>) {
        self.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
        self.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..geometry.num_elements, 0, instances);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_faces_positive_z() {
        let plane = Geometry::plane("ground", 50.0, 50.0);
        assert_eq!(plane.indices.len(), 6);
        assert!(plane.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
        assert!(plane.vertices.iter().all(|v| v.position[0].abs() == 25.0));
    }

    #[test]
    fn computed_normals_are_unit_length() {
        let mut plane = Geometry::plane("quad", 2.0, 2.0);
        plane.vertices.iter_mut().for_each(|v| v.normal = [0.0; 3]);
        plane.compute_normals();
        for v in &plane.vertices {
            let n: cgmath::Vector3<f32> = v.normal.into();
            assert!((n.magnitude() - 1.0).abs() < 1e-5);
            assert!((n.z - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn duplicated_mesh_shares_geometry_but_not_material() {
        let geometry = Arc::new(Geometry::plane("quad", 1.0, 1.0));
        let mut source = MeshNode::new(
            geometry.clone(),
            Material::Standard(StandardMaterial::new("white", [1.0; 4], None)),
        );
        source.cast_shadow = true;
        let mut copy = source.duplicate();
        assert!(Arc::ptr_eq(&source.geometry, &copy.geometry));
        assert!(!copy.cast_shadow);

        if let Material::Standard(m) = &mut copy.material {
            m.base_color = [0.0, 0.0, 0.0, 1.0];
        }
        match &source.material {
            Material::Standard(m) => assert_eq!(m.base_color, [1.0; 4]),
            Material::Outline(_) => panic!("material kind changed"),
        }
    }
}
