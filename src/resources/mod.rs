//! Loading model files into scene nodes.
//!
//! Loading happens off the render thread and never touches the GPU: a loader
//! returns CPU side [`SceneNode`] trees which the renderer uploads lazily the
//! first time they are drawn.

use thiserror::Error;

use crate::data_structures::scene_graph::SceneNode;

pub mod loader;

pub use loader::GltfLoader;

/// Boxed load future. Must be `Send` natively so loads can run on the tokio
/// runtime; the browser only has one thread.
#[cfg(not(target_arch = "wasm32"))]
pub type LoadFuture<T> = futures::future::BoxFuture<'static, T>;
#[cfg(target_arch = "wasm32")]
pub type LoadFuture<T> = futures::future::LocalBoxFuture<'static, T>;

pub type LoadResult = Result<LoadedAsset, AssetLoadFailure>;

/// Something that can turn an asset path into scene nodes.
pub trait AssetLoader {
    fn load(&self, path: &str) -> LoadFuture<LoadResult>;
}

/// The top-level nodes of a loaded file.
pub struct LoadedAsset {
    pub children: Vec<Box<dyn SceneNode>>,
}

impl LoadedAsset {
    pub fn new(children: Vec<Box<dyn SceneNode>>) -> Self {
        Self { children }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, idx: usize) -> Option<&dyn SceneNode> {
        self.children.get(idx).map(|c| c.as_ref())
    }

    /// Takes child 0, dropping the rest.
    pub fn into_first_child(self) -> Option<Box<dyn SceneNode>> {
        self.children.into_iter().next()
    }
}

impl std::fmt::Debug for LoadedAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.children.iter().map(|c| c.name()).collect();
        f.debug_struct("LoadedAsset")
            .field("children", &names)
            .finish()
    }
}

#[derive(Debug, Error)]
#[error("failed to load {path}: {cause}")]
pub struct AssetLoadFailure {
    pub path: String,
    #[source]
    pub cause: LoadCause,
}

impl AssetLoadFailure {
    pub fn new(path: impl Into<String>, cause: LoadCause) -> Self {
        Self {
            path: path.into(),
            cause,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadCause {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request failed: {0}")]
    Http(String),
    #[error("invalid glTF: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("missing data: {0}")]
    MissingData(String),
    #[error("the file contains no top-level node")]
    EmptyAsset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::scene_graph::ContainerNode;

    #[test]
    fn first_child_is_taken_in_order() {
        let asset = LoadedAsset::new(vec![
            Box::new(ContainerNode::new("first")),
            Box::new(ContainerNode::new("second")),
        ]);
        assert_eq!(asset.len(), 2);
        assert_eq!(asset.child(1).map(|c| c.name()), Some("second"));
        let first = asset.into_first_child().unwrap();
        assert_eq!(first.name(), "first");
    }

    #[test]
    fn failure_message_names_the_path() {
        let failure = AssetLoadFailure::new("models/desk04.glb", LoadCause::EmptyAsset);
        assert_eq!(
            failure.to_string(),
            "failed to load models/desk04.glb: the file contains no top-level node"
        );
    }
}
