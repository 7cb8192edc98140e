//! Clone rules: extra placements of an asset, keyed by its path.
//!
//! Whenever an asset with rules finishes loading, each rule adds an
//! independent copy of it at the rule's position and rotation.

use std::collections::HashMap;

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    assembly::descriptor::zero,
    data_structures::{
        instance::{Instance, euler_to_quaternion},
        scene_graph::SceneNode,
    },
};

/// Extra placement for a copy of a loaded asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloneRule {
    pub position: Vector3<f32>,
    /// Euler angles in radians, XYZ order.
    #[serde(default = "zero")]
    pub rotation: Vector3<f32>,
    /// Keeps the source's scale when unset.
    #[serde(default)]
    pub scale: Option<Vector3<f32>>,
}

impl CloneRule {
    pub fn new(position: Vector3<f32>, rotation: Vector3<f32>) -> Self {
        Self {
            position,
            rotation,
            scale: None,
        }
    }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Overwrites the node's placement with this rule's.
    pub fn apply(&self, node: &mut dyn SceneNode) {
        let scale = self.scale.unwrap_or(node.get_local_transform().scale);
        node.set_local_transform(Instance {
            position: self.position,
            rotation: euler_to_quaternion(self.rotation),
            scale,
        });
    }
}

/// Asset path to the clones that are made whenever that asset loads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloneRules {
    rules: HashMap<String, Vec<CloneRule>>,
}

impl CloneRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the same path are applied in the order they were added.
    pub fn add(&mut self, path: impl Into<String>, rule: CloneRule) -> &mut Self {
        self.rules.entry(path.into()).or_default().push(rule);
        self
    }

    pub fn rules_for(&self, path: &str) -> &[CloneRule] {
        self.rules.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::scene_graph::ContainerNode;

    #[test]
    fn rules_keep_insertion_order_per_path() {
        let mut rules = CloneRules::new();
        rules
            .add("a.glb", CloneRule::new(Vector3::new(1.0, 0.0, 0.0), zero()))
            .add("a.glb", CloneRule::new(Vector3::new(2.0, 0.0, 0.0), zero()))
            .add("b.glb", CloneRule::new(Vector3::new(3.0, 0.0, 0.0), zero()));
        let a = rules.rules_for("a.glb");
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].position.x, 1.0);
        assert_eq!(a[1].position.x, 2.0);
        assert_eq!(rules.len(), 3);
        assert!(rules.rules_for("c.glb").is_empty());
    }

    #[test]
    fn unset_scale_keeps_the_source_scale() {
        let mut node = ContainerNode::new("cabinet");
        node.set_local_transform(Instance {
            scale: Vector3::new(1.2, 1.2, 1.2),
            ..Instance::new()
        });
        CloneRule::new(Vector3::new(8.0, 0.0, 8.0), zero()).apply(&mut node);
        assert_eq!(node.get_local_transform().scale, Vector3::new(1.2, 1.2, 1.2));
        assert_eq!(node.get_local_transform().position, Vector3::new(8.0, 0.0, 8.0));

        CloneRule::new(Vector3::new(8.0, 0.97, 8.0), zero())
            .with_scale(Vector3::new(1.0, 1.0, 1.0))
            .apply(&mut node);
        assert_eq!(node.get_local_transform().scale, Vector3::new(1.0, 1.0, 1.0));
    }
}
