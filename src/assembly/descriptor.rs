//! Asset descriptors: one model file and its placement.

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::data_structures::instance::Instance;

pub(crate) fn zero() -> Vector3<f32> {
    Vector3::new(0.0, 0.0, 0.0)
}

pub(crate) fn one() -> Vector3<f32> {
    Vector3::new(1.0, 1.0, 1.0)
}

/// One model file and where it goes in the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub path: String,
    #[serde(default = "zero")]
    pub position: Vector3<f32>,
    /// Euler angles in radians, applied X then Y then Z.
    #[serde(default = "zero")]
    pub rotation: Vector3<f32>,
    #[serde(default = "one")]
    pub scale: Vector3<f32>,
    #[serde(default)]
    pub apply_outline: bool,
}

impl AssetDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            position: zero(),
            rotation: zero(),
            scale: one(),
            apply_outline: false,
        }
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vector3::new(x, y, z);
        self
    }

    pub fn rotated(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = Vector3::new(x, y, z);
        self
    }

    pub fn scaled(mut self, x: f32, y: f32, z: f32) -> Self {
        self.scale = Vector3::new(x, y, z);
        self
    }

    pub fn outlined(mut self) -> Self {
        self.apply_outline = true;
        self
    }

    pub fn transform(&self) -> Instance {
        Instance::from_euler(self.position, self.rotation, self.scale)
    }
}
