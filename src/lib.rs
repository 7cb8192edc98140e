//! cubicle-viewer
//!
//! A small wgpu scene viewer that assembles an office cubicle out of glTF
//! furniture. Assets are described by a [`manifest::SceneManifest`], loaded
//! concurrently and installed into the scene as each load completes. Loaded
//! meshes cast and receive shadows from a single directional light and can be
//! paired with an inverted-hull outline companion.
//!
//! High-level modules
//! - `assembly`: asset descriptors, clone rules and the scene assembler
//! - `camera`: camera, projection, uniforms and orbit controls
//! - `context`: GPU context and the scene state owned by the frame loop
//! - `data_structures`: geometry, materials, instances and the scene graph
//! - `flow`: window, event loop and frame rendering
//! - `manifest`: viewer configuration and the scene manifest format
//! - `pipelines`: lit, outline and shadow pipelines
//! - `resources`: asynchronous glTF loading
//! - `render`: per-frame draw lists batched by pipeline
//! - `stats`: frame timing
//!

pub mod assembly;
pub mod camera;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod manifest;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod stats;

pub use flow::run;
pub use manifest::SceneManifest;
