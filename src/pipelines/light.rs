//! Directional light uniform and the shadow map it renders into.
//!
//! The light looks from its position towards its target through an
//! orthographic box; the same view-projection fills the shadow map and is
//! used by the lit shader to look it up.

use wgpu::util::DeviceExt;

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    data_structures::texture::Texture,
    manifest::{LightConfig, ShadowConfig, srgb_hex_to_linear},
};

/// GPU side of the directional light, its ambient term and the shadow map.
#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub shadow_map: Texture,
    /// Uniform + shadow map, read by the lit pipeline.
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// Uniform only, read by the depth pass that fills the shadow map.
    pub shadow_bind_group: wgpu::BindGroup,
    pub shadow_bind_group_layout: wgpu::BindGroupLayout,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub view_proj: [[f32; 4]; 4],
    pub direction: [f32; 4],
    pub color: [f32; 4],
    pub ambient: [f32; 4],
    pub shadow: [f32; 4],
}

impl LightUniform {
    pub fn new(light: &LightConfig, shadow: &ShadowConfig) -> Self {
        let eye = cgmath::Point3::new(light.position.x, light.position.y, light.position.z);
        let target = cgmath::Point3::new(light.target.x, light.target.y, light.target.z);
        let view = cgmath::Matrix4::look_at_rh(eye, target, cgmath::Vector3::unit_y());
        let proj = cgmath::ortho(
            shadow.left,
            shadow.right,
            shadow.bottom,
            shadow.top,
            shadow.near,
            shadow.far,
        );
        let to_light = light.position - light.target;
        let [r, g, b] = srgb_hex_to_linear(light.color);
        let [ar, ag, ab] = srgb_hex_to_linear(light.ambient_color);
        Self {
            view_proj: (OPENGL_TO_WGPU_MATRIX * proj * view).into(),
            direction: [to_light.x, to_light.y, to_light.z, 0.0],
            color: [
                r * light.intensity,
                g * light.intensity,
                b * light.intensity,
                1.0,
            ],
            ambient: [
                ar * light.ambient_intensity,
                ag * light.ambient_intensity,
                ab * light.ambient_intensity,
                1.0,
            ],
            shadow: [
                shadow.bias,
                shadow.normal_bias,
                1.0 / shadow.map_size.max(1) as f32,
                if shadow.enabled { 1.0 } else { 0.0 },
            ],
        }
    }
}

impl LightResources {
    pub fn new(device: &wgpu::Device, light: &LightConfig, shadow: &ShadowConfig) -> Self {
        let uniform = LightUniform::new(light, shadow);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let shadow_map = Texture::create_shadow_map(device, shadow.map_size);

        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
                },
            ],
            label: Some("light_bind_group"),
        });

        let shadow_bind_group_layout = mk_shadow_bind_group_layout(device);
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("shadow_bind_group"),
        });

        Self {
            uniform,
            buffer,
            shadow_map,
            bind_group,
            bind_group_layout,
            shadow_bind_group,
            shadow_bind_group_layout,
        }
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_shadow_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("shadow_bind_group_layout"),
    })
}
