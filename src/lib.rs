//! helmet-viewer
//!
//! A small cross-platform viewer for a single glTF model lit by an HDR
//! environment. It runs natively and in the browser (WebGL2 through wgpu).
//!
//! High-level modules
//! - `animation`: easing curves and the value tween driving the rotation
//! - `camera`: fixed perspective camera and its uniform
//! - `composer`: the post-processing chain (scene pass followed by effects)
//! - `config`: every tunable of the viewer
//! - `context`: window, surface and GPU handles
//! - `controls`: maps the pointer to a model rotation
//! - `data_structures`: GPU side meshes, materials, textures and the scene graph
//! - `flow`: the event loop, loaders and the render loop
//! - `pipelines`: PBR, environment prefiltering and the RGB shift effect
//! - `render`: draw lists and the frame renderer
//! - `resources`: fetching and decoding glTF files and HDR panoramas
//!

pub mod animation;
pub mod camera;
pub mod composer;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    flow::run().map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{:#}", e)))
}
