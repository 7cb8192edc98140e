//! Viewer settings and scene manifests.
//!
//! A [`SceneManifest`] bundles the ordered asset list, the clone-rule table and
//! the [`ViewerConfig`]. Manifests are plain RON; every field of the config has
//! a default so a manifest only needs to name what it changes.

use std::{f32::consts::FRAC_PI_2, path::Path};

use cgmath::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assembly::{AssetDescriptor, CloneRule, CloneRules};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not read manifest {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse manifest: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vector3<f32>,
    /// Point the orbit controls circle around.
    pub target: Vector3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            position: Vector3::new(11.0, 2.0, 11.0),
            target: Vector3::new(5.0, 0.0, 5.0),
            enable_damping: true,
            damping_factor: 0.05,
        }
    }
}

/// Directional light plus the ambient term.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub color: u32,
    pub intensity: f32,
    pub position: Vector3<f32>,
    pub target: Vector3<f32>,
    pub ambient_color: u32,
    pub ambient_intensity: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            color: 0xffffff,
            intensity: 3.0,
            position: Vector3::new(10.0, 8.0, 10.0),
            target: Vector3::new(0.0, 0.0, 0.0),
            ambient_color: 0xffffff,
            ambient_intensity: 1.5,
        }
    }
}

/// Orthographic shadow camera of the directional light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub enabled: bool,
    pub map_size: u32,
    pub bias: f32,
    pub normal_bias: f32,
    pub near: f32,
    pub far: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            map_size: 2048,
            bias: -0.0005,
            normal_bias: 0.02,
            near: 1.0,
            far: 20.0,
            left: -10.0,
            right: 10.0,
            top: 10.0,
            bottom: -10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundConfig {
    pub enabled: bool,
    pub width: f32,
    pub depth: f32,
    pub height: f32,
    pub color: u32,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 50.0,
            depth: 50.0,
            height: -1.0,
            color: 0xcccccc,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub title: String,
    /// Clear colour as 0xRRGGBB in sRGB.
    pub background: u32,
    pub outline_thickness: f32,
    /// Directory (native) or URL path (web) asset paths are resolved against.
    pub asset_root: String,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub shadow: ShadowConfig,
    pub ground: GroundConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "cubicle-viewer".to_string(),
            background: 0x666666,
            outline_thickness: 0.005,
            asset_root: "assets".to_string(),
            camera: CameraConfig::default(),
            light: LightConfig::default(),
            shadow: ShadowConfig::default(),
            ground: GroundConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn clear_colour(&self) -> wgpu::Color {
        let [r, g, b] = srgb_hex_to_linear(self.background);
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        }
    }
}

/// Converts a 0xRRGGBB sRGB colour to linear RGB.
pub fn srgb_hex_to_linear(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    #[serde(default)]
    pub config: ViewerConfig,
    pub assets: Vec<AssetDescriptor>,
    #[serde(default)]
    pub clone_rules: CloneRules,
}

impl SceneManifest {
    pub fn from_ron_str(source: &str) -> Result<Self, ManifestError> {
        Ok(ron::from_str(source)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&source)
    }

    /// The furnished office cubicle.
    pub fn office() -> Self {
        let quarter = FRAC_PI_2;
        let assets = vec![
            AssetDescriptor::new("models/cubicle03.glb")
                .at(0.0, -0.2, 0.0)
                .outlined(),
            AssetDescriptor::new("models/desk04.glb")
                .at(6.0, 0.0, 5.0)
                .outlined(),
            AssetDescriptor::new("models/computer.glb").at(6.0, 0.98, 5.2),
            AssetDescriptor::new("models/cabinet.glb")
                .at(0.7, 0.0, 8.0)
                .rotated(0.0, quarter, 0.0)
                .outlined(),
            AssetDescriptor::new("models/chair.glb")
                .at(6.0, 0.0, 6.0)
                .rotated(0.0, std::f32::consts::PI, 0.0)
                .outlined(),
            AssetDescriptor::new("models/cabinetobjects.glb")
                .at(0.7, 0.0, 8.0)
                .rotated(0.0, quarter, 0.0),
            AssetDescriptor::new("models/wallart01.glb")
                .at(0.2, 1.6, 6.0)
                .rotated(0.0, quarter, 0.0),
            AssetDescriptor::new("models/wallart02.glb").at(4.0, 1.6, 0.2),
            AssetDescriptor::new("models/wallart03.glb").at(5.2, 1.6, 0.2),
            AssetDescriptor::new("models/wallart04.glb").at(6.4, 1.6, 0.2),
            AssetDescriptor::new("models/plant.glb")
                .at(1.0, 0.0, 1.0)
                .scaled(1.2, 1.2, 1.2)
                .outlined(),
            AssetDescriptor::new("models/printer.glb")
                .at(0.7, 0.98, 8.0)
                .rotated(0.0, quarter, 0.0)
                .outlined(),
        ];

        let mut clone_rules = CloneRules::default();
        clone_rules.add(
            "models/cabinet.glb",
            CloneRule::new(Vector3::new(8.0, 0.0, 8.0), Vector3::new(0.0, -quarter, 0.0)),
        );
        clone_rules.add(
            "models/plant.glb",
            CloneRule::new(Vector3::new(8.0, 0.97, 8.0), Vector3::new(0.0, -quarter, 0.0))
                .with_scale(Vector3::new(1.0, 1.0, 1.0)),
        );

        Self {
            config: ViewerConfig::default(),
            assets,
            clone_rules,
        }
    }
}
