use std::{f32::consts::FRAC_PI_2, sync::Arc};

use cgmath::Vector3;
use cubicle_viewer::{
    SceneManifest,
    assembly::{
        AssetDescriptor, CloneRule, CloneRules, DescriptorState, SceneAssembler, stamp_shadows,
    },
    data_structures::{
        instance::euler_to_quaternion,
        model::{Material, MaterialKind},
        scene_graph::{NodeKind, SceneNode, SceneRoot},
    },
    resources::{AssetLoader, LoadedAsset},
};
use futures::executor::block_on;

use crate::common::{Fixture, MemoryLoader, model, shadow_flags};

mod common;

const THICKNESS: f32 = 0.005;

fn kinds(scene: &SceneRoot) -> Vec<NodeKind> {
    scene.iter().map(|(attribution, _)| attribution.kind).collect()
}

fn material_kinds(node: &dyn SceneNode) -> Vec<MaterialKind> {
    let mut out = vec![];
    node.traverse_meshes(&mut |mesh| out.push(mesh.material.kind()));
    out
}

fn assemble(
    descriptors: Vec<AssetDescriptor>,
    rules: CloneRules,
    loader: &MemoryLoader,
) -> (SceneAssembler, SceneRoot) {
    let mut assembler = SceneAssembler::new(descriptors, rules, THICKNESS);
    let mut scene = SceneRoot::new();
    block_on(assembler.assemble(&mut scene, loader));
    (assembler, scene)
}

#[test]
fn plain_asset_adds_a_single_shadowed_node() {
    let loader = MemoryLoader::new().with("models/computer.glb", Fixture::Meshes(vec!["case", "screen"]));
    let descriptor = AssetDescriptor::new("models/computer.glb").at(6.0, 0.98, 5.2);
    let (assembler, scene) = assemble(vec![descriptor.clone()], CloneRules::new(), &loader);

    assert_eq!(scene.len(), 1);
    assert_eq!(kinds(&scene), vec![NodeKind::Primary]);
    assert_eq!(assembler.state(0), Some(DescriptorState::Installed));

    let node = scene.node(0).unwrap();
    assert_eq!(node.get_local_transform(), &descriptor.transform());
    assert_eq!(material_kinds(node), vec![MaterialKind::Standard; 2]);
    assert_eq!(shadow_flags(node), vec![(true, true); 2]);
}

#[test]
fn outlined_asset_gets_a_companion_with_the_same_transform() {
    let loader = MemoryLoader::new().with("models/desk04.glb", Fixture::Meshes(vec!["top", "legs"]));
    let descriptor = AssetDescriptor::new("models/desk04.glb")
        .at(6.0, 0.0, 5.0)
        .rotated(0.0, FRAC_PI_2, 0.0)
        .scaled(2.0, 2.0, 2.0)
        .outlined();
    let (_, scene) = assemble(vec![descriptor], CloneRules::new(), &loader);

    assert_eq!(kinds(&scene), vec![NodeKind::Primary, NodeKind::Outline]);
    let primary = scene.node(0).unwrap();
    let outline = scene.node(1).unwrap();
    assert_eq!(primary.get_local_transform(), outline.get_local_transform());
    assert_eq!(primary.count_nodes(), outline.count_nodes());

    assert_eq!(material_kinds(outline), vec![MaterialKind::Outline; 2]);
    assert_eq!(shadow_flags(outline), vec![(false, false); 2]);

    let mut thicknesses = vec![];
    outline.traverse_meshes(&mut |mesh| {
        thicknesses.extend(mesh.material.as_outline().map(|m| m.thickness));
    });
    assert_eq!(thicknesses, vec![THICKNESS; 2]);
}

#[test]
fn outline_companion_shares_geometry_but_not_materials() {
    let loader = MemoryLoader::new().with("models/plant.glb", Fixture::Meshes(vec!["pot"]));
    let (_, scene) = assemble(
        vec![AssetDescriptor::new("models/plant.glb").outlined()],
        CloneRules::new(),
        &loader,
    );

    let primary = scene.node(0).unwrap().get_children()[0].mesh().unwrap();
    let outline = scene.node(1).unwrap().get_children()[0].mesh().unwrap();
    assert!(Arc::ptr_eq(&primary.geometry, &outline.geometry));
    assert_eq!(primary.material.kind(), MaterialKind::Standard);
    assert_eq!(outline.material.kind(), MaterialKind::Outline);
}

#[test]
fn cabinet_rule_adds_an_outlined_clone() {
    let loader = MemoryLoader::new().with("models/cabinet.glb", Fixture::Meshes(vec!["body", "drawer"]));
    let descriptor = AssetDescriptor::new("models/cabinet.glb")
        .at(0.7, 0.0, 8.0)
        .rotated(0.0, FRAC_PI_2, 0.0)
        .scaled(1.5, 1.5, 1.5)
        .outlined();
    let mut rules = CloneRules::new();
    rules.add(
        "models/cabinet.glb",
        CloneRule::new(Vector3::new(8.0, 0.0, 8.0), Vector3::new(0.0, -FRAC_PI_2, 0.0)),
    );
    let (assembler, scene) = assemble(vec![descriptor], rules, &loader);

    assert_eq!(
        kinds(&scene),
        vec![
            NodeKind::Primary,
            NodeKind::Outline,
            NodeKind::Clone { rule: 0 },
            NodeKind::CloneOutline { rule: 0 },
        ]
    );
    assert_eq!(assembler.state(0), Some(DescriptorState::Installed));

    let clone = scene.node(2).unwrap();
    let transform = clone.get_local_transform();
    assert_eq!(transform.position, Vector3::new(8.0, 0.0, 8.0));
    assert_eq!(transform.rotation, euler_to_quaternion(Vector3::new(0.0, -FRAC_PI_2, 0.0)));
    // Unset rule scale keeps the source's
    assert_eq!(transform.scale, Vector3::new(1.5, 1.5, 1.5));
    assert_eq!(shadow_flags(clone), vec![(true, true); 2]);

    let clone_outline = scene.node(3).unwrap();
    assert_eq!(clone_outline.get_local_transform(), transform);
    assert_eq!(material_kinds(clone_outline), vec![MaterialKind::Outline; 2]);

    let mut needs_update = vec![];
    clone.traverse_meshes(&mut |mesh| needs_update.push(mesh.material.needs_update()));
    assert_eq!(needs_update, vec![true; 2]);
}

#[test]
fn clones_are_independent_of_their_source() {
    let loader = MemoryLoader::new().with("models/cabinet.glb", Fixture::Meshes(vec!["body"]));
    let mut rules = CloneRules::new();
    rules.add(
        "models/cabinet.glb",
        CloneRule::new(Vector3::new(8.0, 0.0, 8.0), Vector3::new(0.0, 0.0, 0.0)),
    );
    let (_, mut scene) = assemble(
        vec![AssetDescriptor::new("models/cabinet.glb")],
        rules,
        &loader,
    );
    assert_eq!(kinds(&scene), vec![NodeKind::Primary, NodeKind::Clone { rule: 0 }]);

    let before = scene.node(0).unwrap().get_local_transform().clone();
    {
        let clone = scene.node_mut(1).unwrap();
        let mut moved = clone.get_local_transform().clone();
        moved.position = Vector3::new(-3.0, 1.0, 2.0);
        clone.set_local_transform(moved);
        clone.traverse_meshes_mut(&mut |mesh| {
            if let Material::Standard(material) = &mut mesh.material {
                material.base_color = [1.0, 0.0, 0.0, 1.0];
            }
        });
    }

    let source = scene.node(0).unwrap();
    assert_eq!(source.get_local_transform(), &before);
    source.traverse_meshes(&mut |mesh| match &mesh.material {
        Material::Standard(material) => assert_eq!(material.base_color, [0.5, 0.5, 0.5, 1.0]),
        Material::Outline(_) => panic!("source lost its standard material"),
    });
}

#[test]
fn every_rule_for_a_path_makes_its_own_clone() {
    let loader = MemoryLoader::new().with("models/chair.glb", Fixture::Meshes(vec!["seat"]));
    let mut rules = CloneRules::new();
    rules
        .add(
            "models/chair.glb",
            CloneRule::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0)),
        )
        .add(
            "models/chair.glb",
            CloneRule::new(Vector3::new(2.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0))
                .with_scale(Vector3::new(0.5, 0.5, 0.5)),
        );
    let (_, scene) = assemble(vec![AssetDescriptor::new("models/chair.glb")], rules, &loader);

    assert_eq!(
        kinds(&scene),
        vec![
            NodeKind::Primary,
            NodeKind::Clone { rule: 0 },
            NodeKind::Clone { rule: 1 },
        ]
    );
    assert_eq!(scene.node(1).unwrap().get_local_transform().position.x, 1.0);
    let second = scene.node(2).unwrap().get_local_transform();
    assert_eq!(second.position.x, 2.0);
    assert_eq!(second.scale, Vector3::new(0.5, 0.5, 0.5));
}

#[test]
fn failed_load_does_not_block_the_others() {
    let loader = MemoryLoader::new()
        .with("models/desk04.glb", Fixture::Meshes(vec!["top"]))
        .with("models/printer.glb", Fixture::Meshes(vec!["printer"]));
    let descriptors = vec![
        AssetDescriptor::new("models/desk04.glb"),
        AssetDescriptor::new("models/missing.glb").outlined(),
        AssetDescriptor::new("models/printer.glb"),
    ];
    let (assembler, scene) = assemble(descriptors, CloneRules::new(), &loader);

    assert_eq!(assembler.state(0), Some(DescriptorState::Installed));
    assert_eq!(assembler.state(1), Some(DescriptorState::Failed));
    assert_eq!(assembler.state(2), Some(DescriptorState::Installed));
    assert!(assembler.is_settled());
    assert_eq!(scene.len(), 2);
    assert!(scene.attributed_to(1).is_empty());
}

#[test]
fn every_load_is_issued_before_any_completes() {
    let loader = MemoryLoader::new();
    let assembler = SceneAssembler::new(
        vec![
            AssetDescriptor::new("models/a.glb"),
            AssetDescriptor::new("models/b.glb"),
            AssetDescriptor::new("models/c.glb"),
        ],
        CloneRules::new(),
        THICKNESS,
    );
    let loads = assembler.issue_loads(&loader);
    assert_eq!(loads.len(), 3);
    assert_eq!(
        loader.requested(),
        vec!["models/a.glb", "models/b.glb", "models/c.glb"]
    );
    assert_eq!(assembler.state(0), Some(DescriptorState::Pending));
}

#[test]
fn completions_install_in_arrival_order() {
    let loader = MemoryLoader::new()
        .with("models/first.glb", Fixture::Meshes(vec!["a"]))
        .with("models/second.glb", Fixture::Meshes(vec!["b"]));
    let mut assembler = SceneAssembler::new(
        vec![
            AssetDescriptor::new("models/first.glb").outlined(),
            AssetDescriptor::new("models/second.glb"),
        ],
        CloneRules::new(),
        THICKNESS,
    );
    let mut scene = SceneRoot::new();

    let second = block_on(loader.load("models/second.glb"));
    assert_eq!(assembler.install(&mut scene, 1, second), DescriptorState::Installed);
    assert!(!assembler.is_settled());

    let first = block_on(loader.load("models/first.glb"));
    assert_eq!(assembler.install(&mut scene, 0, first), DescriptorState::Installed);
    assert!(assembler.is_settled());

    assert_eq!(scene.attributed_to(1), vec![0]);
    assert_eq!(scene.attributed_to(0), vec![1, 2]);
}

#[test]
fn empty_file_fails_the_descriptor() {
    let loader = MemoryLoader::new().with("models/empty.glb", Fixture::Empty);
    let (assembler, scene) = assemble(
        vec![AssetDescriptor::new("models/empty.glb").outlined()],
        CloneRules::new(),
        &loader,
    );
    assert_eq!(assembler.state(0), Some(DescriptorState::Failed));
    assert!(scene.is_empty());
}

#[test]
fn repeated_completion_is_ignored() {
    let loader = MemoryLoader::new().with("models/plant.glb", Fixture::Meshes(vec!["leaf"]));
    let (mut assembler, mut scene) = assemble(
        vec![AssetDescriptor::new("models/plant.glb").outlined()],
        CloneRules::new(),
        &loader,
    );
    assert_eq!(scene.len(), 2);

    let again = block_on(loader.load("models/plant.glb"));
    assert_eq!(assembler.install(&mut scene, 0, again), DescriptorState::Installed);
    assert_eq!(scene.len(), 2);

    let unknown = Ok(LoadedAsset::new(vec![Box::new(model("stray"))]));
    assert_eq!(assembler.install(&mut scene, 7, unknown), DescriptorState::Failed);
    assert_eq!(scene.len(), 2);
}

#[test]
fn shadow_stamping_is_idempotent() {
    let mut node = common::model("lamp");
    stamp_shadows(&mut node);
    stamp_shadows(&mut node);
    assert_eq!(shadow_flags(&node), vec![(true, true)]);
}

#[test]
fn office_scene_assembles_every_model() {
    let manifest = SceneManifest::office();
    let loader = manifest
        .assets
        .iter()
        .fold(MemoryLoader::new(), |loader, asset| {
            loader.with(&asset.path, Fixture::Meshes(vec!["mesh"]))
        });
    let mut assembler = SceneAssembler::from_manifest(&manifest);
    let mut scene = SceneRoot::new();
    block_on(assembler.assemble(&mut scene, &loader));

    assert!(assembler.is_settled());
    // 12 models, 6 outlines, outlined cabinet and plant clones
    assert_eq!(scene.len(), 12 + 6 + 2 + 2);

    let cabinet = manifest
        .assets
        .iter()
        .position(|a| a.path == "models/cabinet.glb")
        .unwrap();
    let cabinet_kinds: Vec<NodeKind> = scene
        .attributed_to(cabinet)
        .into_iter()
        .filter_map(|idx| scene.attribution(idx).map(|a| a.kind))
        .collect();
    assert_eq!(
        cabinet_kinds,
        vec![
            NodeKind::Primary,
            NodeKind::Outline,
            NodeKind::Clone { rule: 0 },
            NodeKind::CloneOutline { rule: 0 },
        ]
    );

    let plant = manifest
        .assets
        .iter()
        .position(|a| a.path == "models/plant.glb")
        .unwrap();
    let plant_clone = scene
        .attributed_to(plant)
        .into_iter()
        .find(|idx| scene.attribution(*idx).map(|a| a.kind) == Some(NodeKind::Clone { rule: 0 }))
        .and_then(|idx| scene.node(idx))
        .unwrap();
    assert_eq!(
        plant_clone.get_local_transform().scale,
        Vector3::new(1.0, 1.0, 1.0)
    );
}
