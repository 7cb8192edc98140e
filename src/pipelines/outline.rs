//! Inverted-hull outlines.
//!
//! An outline companion draws the mesh a second time with every vertex pushed
//! `thickness` units along its normal. Only back faces are rasterized and the
//! fragment stage writes opaque black, so the enlarged hull shows up as a
//! border exactly `thickness` wide around the original surface and is hidden
//! everywhere else by the depth test.

use cgmath::InnerSpace;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::InstanceRaw,
        model::{Material, ModelVertex, Vertex},
        texture::Texture,
    },
    pipelines::basic::mk_render_pipeline,
};

/// Outline colour, opaque black.
pub const OUTLINE_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Culling front faces leaves only the back faces of the hull.
pub const OUTLINE_CULL_MODE: wgpu::Face = wgpu::Face::Front;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct OutlineUniform {
    color: [f32; 4],
    thickness: f32,
    // Uniforms are sized in multiples of 16 bytes
    _padding: [f32; 3],
}

#[derive(Debug)]
pub struct OutlineMaterial {
    /// Displacement along the vertex normal, in model units.
    pub thickness: f32,
    needs_update: bool,
    bind_group: Option<wgpu::BindGroup>,
}

impl OutlineMaterial {
    pub fn new(thickness: f32) -> Self {
        Self {
            thickness,
            needs_update: true,
            bind_group: None,
        }
    }

    pub fn color(&self) -> [f32; 4] {
        OUTLINE_COLOR
    }

    pub fn cull_mode(&self) -> wgpu::Face {
        OUTLINE_CULL_MODE
    }

    /// CPU mirror of the vertex stage: `position + normalize(normal) * thickness`.
    pub fn displace(
        &self,
        position: cgmath::Vector3<f32>,
        normal: cgmath::Vector3<f32>,
    ) -> cgmath::Vector3<f32> {
        if normal.magnitude2() == 0.0 {
            return position;
        }
        position + normal.normalize() * self.thickness
    }

    pub(crate) fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub(crate) fn mark_needs_update(&mut self) {
        self.needs_update = true;
    }

    pub(crate) fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    pub(crate) fn prepare(&mut self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout) {
        let uniform = OutlineUniform {
            color: OUTLINE_COLOR,
            thickness: self.thickness,
            _padding: [0.0; 3],
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Outline Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("outline_bind_group"),
        }));
        self.needs_update = false;
    }
}

/// Builds a fresh outline material. Pure: nothing is shared between calls.
pub fn make_outline_material(thickness: f32) -> Material {
    Material::Outline(OutlineMaterial::new(thickness))
}

pub fn outline_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("outline_bind_group_layout"),
    })
}

pub fn mk_outline_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    outline_bind_group_layout: &wgpu::BindGroupLayout,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Outline Pipeline Layout"),
        bind_group_layouts: &[Some(outline_bind_group_layout), Some(camera_bind_group_layout)],
        immediate_size: 0,
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Outline Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("outline.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        &layout,
        config.format,
        Some(wgpu::BlendState::REPLACE),
        Some(Texture::DEPTH_FORMAT),
        &[ModelVertex::desc(), InstanceRaw::desc()],
        Some(OUTLINE_CULL_MODE),
        shader,
    )
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector3};

    use super::*;
    use crate::data_structures::model::MaterialKind;

    #[test]
    fn factory_builds_black_back_face_material() {
        let material = make_outline_material(0.005);
        assert_eq!(material.kind(), MaterialKind::Outline);
        let outline = material.as_outline().unwrap();
        assert_eq!(outline.thickness, 0.005);
        assert_eq!(outline.color(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(outline.cull_mode(), wgpu::Face::Front);
        assert!(material.needs_update());
    }

    #[test]
    fn displacement_never_exceeds_thickness() {
        let normals = [
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(3.0, -4.0, 0.0),
            Vector3::new(0.2, 0.2, 0.9),
            Vector3::new(-10.0, 0.0, 0.0),
        ];
        for &t in &[0.005f32, 0.01, 0.5] {
            let material = OutlineMaterial::new(t);
            for normal in normals {
                let position = Vector3::new(1.0, 2.0, 3.0);
                let displaced = material.displace(position, normal);
                let offset = displaced - position;
                assert!(offset.magnitude() <= t + 1e-6);
                // the push goes outward along the normal
                assert!(offset.dot(normal) > 0.0);
            }
        }
    }

    #[test]
    fn zero_normal_is_left_in_place() {
        let material = OutlineMaterial::new(0.01);
        let position = Vector3::new(1.0, 1.0, 1.0);
        assert_eq!(material.displace(position, Vector3::new(0.0, 0.0, 0.0)), position);
    }

    #[test]
    fn each_call_returns_an_independent_material() {
        let mut a = make_outline_material(0.01);
        let b = make_outline_material(0.01);
        if let Material::Outline(m) = &mut a {
            m.thickness = 0.5;
        }
        assert_eq!(b.as_outline().unwrap().thickness, 0.01);
    }
}
