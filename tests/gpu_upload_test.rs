#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn assembled_scene_uploads_and_batches_by_material() {
    use cubicle_viewer::{
        assembly::{AssetDescriptor, CloneRule, CloneRules, SceneAssembler},
        camera::{Camera, CameraResources, Projection},
        data_structures::scene_graph::SceneRoot,
        manifest::ViewerConfig,
        pipelines::{MaterialLayouts, Pipelines, light::LightResources},
        render::Batches,
    };
    use futures::executor::block_on;

    use crate::common::{Fixture, MemoryLoader};

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
    let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
        .expect("no graphics adapter");
    let (device, queue) = block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
        .expect("no graphics device");

    let viewer = ViewerConfig::default();
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        width: 64,
        height: 64,
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: wgpu::CompositeAlphaMode::Auto,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    let camera = Camera::from_config(&viewer.camera);
    let projection = Projection::new(64, 64, cgmath::Deg(45.0), 0.1, 100.0);
    let camera_resources = CameraResources::new(&device, &camera, &projection);
    let light = LightResources::new(&device, &viewer.light, &viewer.shadow);
    let layouts = MaterialLayouts::new(&device);
    let _pipelines = Pipelines::new(
        &device,
        &config,
        &layouts,
        &camera_resources.bind_group_layout,
        &light,
    );

    let loader = MemoryLoader::new()
        .with("models/cabinet.glb", Fixture::Meshes(vec!["body", "drawer"]))
        .with("models/computer.glb", Fixture::Meshes(vec!["case"]));
    let mut rules = CloneRules::new();
    rules.add(
        "models/cabinet.glb",
        CloneRule::new(
            cgmath::Vector3::new(8.0, 0.0, 8.0),
            cgmath::Vector3::new(0.0, 0.0, 0.0),
        ),
    );
    let mut assembler = SceneAssembler::new(
        vec![
            AssetDescriptor::new("models/cabinet.glb").outlined(),
            AssetDescriptor::new("models/computer.glb"),
        ],
        rules,
        viewer.outline_thickness,
    );
    let mut scene = SceneRoot::new();
    block_on(assembler.assemble(&mut scene, &loader));

    scene.update_world_transforms();
    scene.write_to_buffers(&queue, &device, &layouts);

    let batches: Batches = scene.get_render().into_iter().collect();
    // Cabinet and its clone have two meshes each, the computer one
    assert_eq!(batches.lit.len(), 5);
    assert_eq!(batches.outlines.len(), 4);
    assert_eq!(batches.shadow_casters.len(), 5);
}
