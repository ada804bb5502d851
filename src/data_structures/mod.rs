//! Viewer data structures: models, textures, environments and the scene graph.
//!
//! - `model` contains mesh and material definitions, GPU resources for glTF primitives
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `environment` holds the prefiltered environment cube
//! - `transform` holds node transformations and their per-instance GPU layout
//! - `scene_graph` enables hierarchical scene organization

pub mod environment;
pub mod model;
pub mod scene_graph;
pub mod texture;
pub mod transform;
