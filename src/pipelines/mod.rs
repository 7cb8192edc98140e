//! Render pipelines and the bind group layouts they share.
//!
//! - `basic`: lit, textured meshes with shadow lookups
//! - `outline`: inverted-hull outline material and pipeline
//! - `shadow`: depth-only pass filling the light's shadow map
//! - `light`: directional light uniform and shadow map resources

pub mod basic;
pub mod light;
pub mod outline;
pub mod shadow;

/// Bind group layouts materials are prepared against.
#[derive(Debug)]
pub struct MaterialLayouts {
    pub standard: wgpu::BindGroupLayout,
    pub outline: wgpu::BindGroupLayout,
}

impl MaterialLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            standard: basic::standard_material_layout(device),
            outline: outline::outline_layout(device),
        }
    }
}

#[derive(Debug)]
pub struct Pipelines {
    pub lit: wgpu::RenderPipeline,
    pub outline: wgpu::RenderPipeline,
    pub shadow: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        layouts: &MaterialLayouts,
        camera_layout: &wgpu::BindGroupLayout,
        light: &light::LightResources,
    ) -> Self {
        Self {
            lit: basic::mk_lit_pipeline(
                device,
                config,
                &layouts.standard,
                camera_layout,
                &light.bind_group_layout,
            ),
            outline: outline::mk_outline_pipeline(device, config, &layouts.outline, camera_layout),
            shadow: shadow::mk_shadow_pipeline(device, &light.shadow_bind_group_layout),
        }
    }
}
