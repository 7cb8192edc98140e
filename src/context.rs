//! Long-lived state passed explicitly through the frame loop.
//!
//! [`Context`] owns everything GPU side: surface, device, queue, the shared
//! bind group layouts and the pipelines. [`SceneContext`] owns what the user
//! sees: the scene root, the camera with its orbit controls, the light
//! settings and the assembler that keeps adding nodes as loads complete.
//! Both are created once at startup and live until the process exits.

use std::{f32::consts::FRAC_PI_2, sync::Arc};

use anyhow::Context as _;
use cgmath::Rotation3;
use winit::window::Window;

use crate::{
    assembly::{DescriptorState, LoadOutcome, SceneAssembler},
    camera::{Camera, CameraResources, OrbitControls, Projection},
    data_structures::{
        instance::Instance,
        model::{Geometry, Material, MeshNode, StandardMaterial},
        scene_graph::{Attribution, ModelNode, SceneNode, SceneRoot},
        texture,
    },
    manifest::{GroundConfig, LightConfig, SceneManifest, ViewerConfig, srgb_hex_to_linear},
    pipelines::{MaterialLayouts, Pipelines, light::LightResources},
};

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub layouts: MaterialLayouts,
    pub pipelines: Pipelines,
    pub clear_colour: wgpu::Color,
    pub shadows_enabled: bool,
}

impl Context {
    pub async fn new(
        window: Arc<Window>,
        viewer: &ViewerConfig,
        scene: &SceneContext,
    ) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("cannot create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible graphics adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("cannot open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Colours are computed in linear space, an sRGB surface does the encoding
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface reports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(viewer.camera.fov_degrees),
            viewer.camera.near,
            viewer.camera.far,
        );
        let camera = CameraResources::new(&device, &scene.camera, &projection);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let light = LightResources::new(&device, &scene.light, &viewer.shadow);
        let layouts = MaterialLayouts::new(&device);
        let pipelines = Pipelines::new(
            &device,
            &config,
            &layouts,
            &camera.bind_group_layout,
            &light,
        );

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            layouts,
            pipelines,
            clear_colour: viewer.clear_colour(),
            shadows_enabled: viewer.shadow.enabled,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

pub struct SceneContext {
    pub scene: SceneRoot,
    pub camera: Camera,
    pub controls: OrbitControls,
    pub light: LightConfig,
    pub assembler: SceneAssembler,
}

impl SceneContext {
    /// The scene before any asset has loaded: just the ground, if configured.
    pub fn new(manifest: &SceneManifest) -> Self {
        let config = &manifest.config;
        let mut scene = SceneRoot::new();
        if config.ground.enabled {
            scene.insert(Attribution::scenery(), Box::new(ground(&config.ground)));
        }
        Self {
            scene,
            camera: Camera::from_config(&config.camera),
            controls: OrbitControls::from_config(&config.camera),
            light: config.light.clone(),
            assembler: SceneAssembler::from_manifest(manifest),
        }
    }

    /// Render thread side of a finished load.
    pub fn on_asset_loaded(&mut self, outcome: LoadOutcome) -> DescriptorState {
        let state = self
            .assembler
            .install(&mut self.scene, outcome.index, outcome.result);
        if self.assembler.is_settled() {
            log::info!("scene assembled with {} top-level nodes", self.scene.len());
        }
        state
    }
}

/// Horizontal plane that only receives shadows.
fn ground(config: &GroundConfig) -> ModelNode {
    let [r, g, b] = srgb_hex_to_linear(config.color);
    let mut mesh = MeshNode::new(
        Arc::new(Geometry::plane("ground", config.width, config.depth)),
        Material::Standard(StandardMaterial::new("ground", [r, g, b, 1.0], None)),
    );
    mesh.receive_shadow = true;

    let mut node = ModelNode::new("ground", mesh);
    node.set_local_transform(Instance {
        position: cgmath::Vector3::new(0.0, config.height, 0.0),
        rotation: cgmath::Quaternion::from_angle_x(cgmath::Rad(-FRAC_PI_2)),
        scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
    });
    node
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector3};

    use super::*;
    use crate::data_structures::scene_graph::NodeKind;

    #[test]
    fn ground_faces_up_and_only_receives_shadows() {
        let node = ground(&GroundConfig::default());
        let mesh = node.mesh().unwrap();
        assert!(mesh.receive_shadow);
        assert!(!mesh.cast_shadow);

        let rotation = node.get_local_transform().rotation;
        let normal = rotation * Vector3::new(0.0, 0.0, 1.0);
        assert!((normal - Vector3::new(0.0, 1.0, 0.0)).magnitude() < 1e-5);
        assert_eq!(node.get_local_transform().position.y, -1.0);
    }

    #[test]
    fn scene_starts_with_the_ground_only() {
        let ctx = SceneContext::new(&SceneManifest::office());
        assert_eq!(ctx.scene.len(), 1);
        assert_eq!(ctx.scene.attribution(0).map(|a| a.kind), Some(NodeKind::Static));
        assert_eq!(ctx.assembler.descriptors().len(), 12);
        assert_eq!(ctx.assembler.state(0), Some(DescriptorState::Pending));
    }

    #[test]
    fn light_settings_come_from_the_manifest() {
        let mut manifest = SceneManifest::office();
        manifest.config.light.intensity = 1.25;
        manifest.config.ground.enabled = false;

        let ctx = SceneContext::new(&manifest);
        assert_eq!(ctx.light, manifest.config.light);
        assert!(ctx.scene.is_empty());
    }
}
