//! Scene data: geometry, materials, textures, instances and the scene graph.
//!
//! - `model` contains shared geometry, per-mesh materials and their GPU state
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `instance` holds per-node transformation data
//! - `scene_graph` enables hierarchical scene organization

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
