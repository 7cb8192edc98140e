use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use cubicle_viewer::{
    data_structures::{
        model::{Geometry, Material, MeshNode, ModelVertex, StandardMaterial},
        scene_graph::{ContainerNode, ModelNode, SceneNode},
    },
    resources::{AssetLoadFailure, AssetLoader, LoadCause, LoadFuture, LoadResult, LoadedAsset},
};
use futures::FutureExt;

/// What the in-memory loader answers for a path.
#[allow(dead_code)]
pub enum Fixture {
    /// A file whose first top-level node groups one mesh per name.
    Meshes(Vec<&'static str>),
    /// A file with no top-level node.
    Empty,
}

/// Serves prebuilt CPU scene trees. Unknown paths fail like a missing file.
pub struct MemoryLoader {
    fixtures: HashMap<String, Fixture>,
    pub requested: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MemoryLoader {
    pub fn new() -> Self {
        Self {
            fixtures: HashMap::new(),
            requested: Mutex::new(vec![]),
        }
    }

    pub fn with(mut self, path: &str, fixture: Fixture) -> Self {
        self.fixtures.insert(path.to_string(), fixture);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn answer(&self, path: &str) -> LoadResult {
        match self.fixtures.get(path) {
            Some(Fixture::Meshes(names)) => {
                let mut root = ContainerNode::new(path);
                for name in names {
                    root.add_child(Box::new(model(name)));
                }
                Ok(LoadedAsset::new(vec![Box::new(root)]))
            }
            Some(Fixture::Empty) => Ok(LoadedAsset::new(vec![])),
            None => Err(AssetLoadFailure::new(
                path,
                LoadCause::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such fixture",
                )),
            )),
        }
    }
}

impl AssetLoader for MemoryLoader {
    fn load(&self, path: &str) -> LoadFuture<LoadResult> {
        self.requested.lock().unwrap().push(path.to_string());
        futures::future::ready(self.answer(path)).boxed()
    }
}

/// A single triangle mesh with a plain grey material.
pub fn model(name: &str) -> ModelNode {
    let vertex = |position: [f32; 3]| ModelVertex {
        position,
        tex_coords: [0.0, 0.0],
        normal: [0.0, 0.0, 1.0],
    };
    let geometry = Geometry::new(
        name,
        vec![
            vertex([0.0, 0.0, 0.0]),
            vertex([1.0, 0.0, 0.0]),
            vertex([0.0, 1.0, 0.0]),
        ],
        vec![0, 1, 2],
    );
    let material = Material::Standard(StandardMaterial::new(name, [0.5, 0.5, 0.5, 1.0], None));
    ModelNode::new(name, MeshNode::new(Arc::new(geometry), material))
}

/// Collects `(cast_shadow, receive_shadow)` for every mesh below `node`.
#[allow(dead_code)]
pub fn shadow_flags(node: &dyn SceneNode) -> Vec<(bool, bool)> {
    let mut flags = vec![];
    node.traverse_meshes(&mut |mesh| flags.push((mesh.cast_shadow, mesh.receive_shadow)));
    flags
}
