//! Scene assembly: turns asset descriptors into placed, shadowed and outlined
//! scene nodes.
//!
//! Every descriptor's load is issued up front without waiting on the others.
//! Completions are installed one at a time, in whatever order they finish:
//!
//! 1. child 0 of the loaded file becomes the descriptor's primary node
//! 2. the descriptor's position, rotation and scale are applied to it
//! 3. every mesh below it casts and receives shadows
//! 4. it is appended to the scene root
//! 5. with `apply_outline`, an outline companion with the same transform is appended
//! 6. each clone rule registered for the asset's path appends a deep copy at
//!    the rule's placement (plus its own outline companion)
//!
//! A failed load is logged and leaves the scene untouched.

use futures::{FutureExt, StreamExt, stream::FuturesUnordered};
use log::{debug, error, info, warn};

use crate::{
    data_structures::scene_graph::{Attribution, NodeKind, SceneNode, SceneRoot},
    manifest::SceneManifest,
    resources::{AssetLoadFailure, AssetLoader, LoadCause, LoadFuture, LoadResult},
};

mod clone_rules;
mod descriptor;

pub use clone_rules::{CloneRule, CloneRules};
pub use descriptor::AssetDescriptor;

/// Where a descriptor is in its lifecycle.
///
/// `Pending -> Loaded -> Transformed -> (Outlined) -> (Cloned) -> Installed`,
/// or `Pending -> Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorState {
    Pending,
    Loaded,
    Transformed,
    Outlined,
    Cloned,
    Installed,
    Failed,
}

/// A finished load, tagged with the descriptor that asked for it.
#[derive(Debug)]
pub struct LoadOutcome {
    pub index: usize,
    pub result: LoadResult,
}

pub struct SceneAssembler {
    descriptors: Vec<AssetDescriptor>,
    clone_rules: CloneRules,
    outline_thickness: f32,
    states: Vec<DescriptorState>,
}

impl SceneAssembler {
    pub fn new(
        descriptors: Vec<AssetDescriptor>,
        clone_rules: CloneRules,
        outline_thickness: f32,
    ) -> Self {
        let states = vec![DescriptorState::Pending; descriptors.len()];
        Self {
            descriptors,
            clone_rules,
            outline_thickness,
            states,
        }
    }

    pub fn from_manifest(manifest: &SceneManifest) -> Self {
        Self::new(
            manifest.assets.clone(),
            manifest.clone_rules.clone(),
            manifest.config.outline_thickness,
        )
    }

    pub fn descriptors(&self) -> &[AssetDescriptor] {
        &self.descriptors
    }

    pub fn state(&self, index: usize) -> Option<DescriptorState> {
        self.states.get(index).copied()
    }

    /// True once every descriptor is either installed or failed.
    pub fn is_settled(&self) -> bool {
        self.states
            .iter()
            .all(|s| matches!(s, DescriptorState::Installed | DescriptorState::Failed))
    }

    /// One future per descriptor, in descriptor order. Nothing is awaited here.
    pub fn issue_loads(&self, loader: &impl AssetLoader) -> Vec<LoadFuture<LoadOutcome>> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                debug!("issuing load for {}", descriptor.path);
                let load = loader.load(&descriptor.path);
                let fut = async move {
                    LoadOutcome {
                        index,
                        result: load.await,
                    }
                };
                #[cfg(not(target_arch = "wasm32"))]
                let fut = fut.boxed();
                #[cfg(target_arch = "wasm32")]
                let fut = fut.boxed_local();
                fut
            })
            .collect()
    }

    /// Loads everything and installs each asset as soon as its load completes.
    pub async fn assemble(&mut self, scene: &mut SceneRoot, loader: &impl AssetLoader) {
        let mut pending: FuturesUnordered<_> = self.issue_loads(loader).into_iter().collect();
        while let Some(outcome) = pending.next().await {
            self.install(scene, outcome.index, outcome.result);
        }
    }

    /// Installs the completion of descriptor `index` into `scene`.
    pub fn install(
        &mut self,
        scene: &mut SceneRoot,
        index: usize,
        result: LoadResult,
    ) -> DescriptorState {
        let Self {
            descriptors,
            clone_rules,
            outline_thickness,
            states,
        } = self;

        let (Some(descriptor), Some(state)) = (descriptors.get(index), states.get_mut(index)) else {
            warn!("load completed for unknown descriptor {index}");
            return DescriptorState::Failed;
        };
        if *state != DescriptorState::Pending {
            warn!(
                "{} completed again while {:?}, ignoring",
                descriptor.path, state
            );
            return *state;
        }

        let mut node = match result.and_then(|asset| {
            asset
                .into_first_child()
                .ok_or_else(|| AssetLoadFailure::new(&descriptor.path, LoadCause::EmptyAsset))
        }) {
            Ok(node) => node,
            Err(failure) => {
                error!("Error loading model {}: {}", descriptor.path, failure.cause);
                *state = DescriptorState::Failed;
                return *state;
            }
        };
        advance(state, DescriptorState::Loaded, &descriptor.path);

        node.set_local_transform(descriptor.transform());
        stamp_shadows(node.as_mut());
        advance(state, DescriptorState::Transformed, &descriptor.path);

        let outline = descriptor
            .apply_outline
            .then(|| solidify(node.as_ref(), *outline_thickness));
        let primary = scene.insert(Attribution::of(index, NodeKind::Primary), node);
        info!("Model loaded: {}", descriptor.path);

        if let Some(outline) = outline {
            scene.insert(Attribution::of(index, NodeKind::Outline), outline);
            advance(state, DescriptorState::Outlined, &descriptor.path);
        }

        let rules = clone_rules.rules_for(&descriptor.path);
        for (rule_idx, rule) in rules.iter().enumerate() {
            let Some(mut copy) = scene.node(primary).map(|n| n.deep_clone()) else {
                break;
            };
            rule.apply(copy.as_mut());
            stamp_shadows(copy.as_mut());
            refresh_materials(copy.as_mut());

            let outline = descriptor
                .apply_outline
                .then(|| solidify(copy.as_ref(), *outline_thickness));
            scene.insert(
                Attribution::of(index, NodeKind::Clone { rule: rule_idx }),
                copy,
            );
            if let Some(outline) = outline {
                scene.insert(
                    Attribution::of(index, NodeKind::CloneOutline { rule: rule_idx }),
                    outline,
                );
            }
            info!("{} cloned and added to scene", descriptor.path);
        }
        if !rules.is_empty() {
            advance(state, DescriptorState::Cloned, &descriptor.path);
        }

        advance(state, DescriptorState::Installed, &descriptor.path);
        *state
    }
}

fn advance(state: &mut DescriptorState, next: DescriptorState, path: &str) {
    debug!("{path}: {state:?} -> {next:?}");
    *state = next;
}

/// Makes every mesh in the subtree cast and receive shadows.
pub fn stamp_shadows(node: &mut dyn SceneNode) {
    node.traverse_meshes_mut(&mut |mesh| {
        mesh.cast_shadow = true;
        mesh.receive_shadow = true;
    });
}

/// Asks the renderer to rebuild every material's GPU state in the subtree.
pub fn refresh_materials(node: &mut dyn SceneNode) {
    node.traverse_meshes_mut(&mut |mesh| mesh.material.mark_needs_update());
}

/// Builds the outline companion of `node`: same geometry and transform, every
/// material replaced by a fresh outline material, no shadow flags.
pub fn solidify(node: &dyn SceneNode, thickness: f32) -> Box<dyn SceneNode> {
    node.to_outline(thickness)
}
