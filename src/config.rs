//! Viewer configuration.
//!
//! All tunables of the viewer live in [`ViewerConfig`]. The [`Default`] impl holds
//! the values the viewer ships with; [`crate::flow::run`] uses them as-is while
//! [`crate::flow::run_with`] accepts an adjusted copy.

use std::f32::consts::PI;

use instant::Duration;

use crate::animation::Easing;

pub const CANVAS_ID: &str = "canvas";
pub const HDRI_URL: &str =
    "https://dl.polyhaven.org/file/ph-assets/HDRIs/hdr/1k/pond_bridge_night_1k.hdr";
pub const MODEL_PATH: &str = "DamagedHelmet.gltf";

/// Every parameter of the viewer in one place.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    /// Element id of the canvas the viewer draws into (web only).
    pub canvas_id: String,
    /// Radiance (`.hdr`) panorama used as image based lighting.
    pub hdri_url: String,
    /// glTF/GLB file, relative to the asset root or an absolute URL.
    pub model_path: String,
    pub fov_y: cgmath::Deg<f32>,
    pub z_near: f32,
    pub z_far: f32,
    /// Distance of the camera from the origin along +Z.
    pub camera_distance: f32,
    /// Upper bound for the device pixel ratio used to size the drawing buffer.
    pub max_pixel_ratio: f64,
    pub exposure: f32,
    pub environment_intensity: f32,
    /// Edge length of the largest cube face of the prefiltered environment.
    pub environment_size: u32,
    pub rgb_shift_amount: f32,
    /// Direction of the channel shift in radians.
    pub rgb_shift_angle: f32,
    /// Full rotation range covered when the pointer crosses the viewport.
    pub rotation_scale: f32,
    pub rotation_duration: Duration,
    pub rotation_easing: Easing,
    pub msaa_samples: u32,
    pub clear_colour: wgpu::Color,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            canvas_id: CANVAS_ID.to_string(),
            hdri_url: HDRI_URL.to_string(),
            model_path: MODEL_PATH.to_string(),
            fov_y: cgmath::Deg(40.0),
            z_near: 0.1,
            z_far: 100.0,
            camera_distance: 3.5,
            max_pixel_ratio: 2.0,
            exposure: 1.0,
            environment_intensity: 1.0,
            environment_size: 256,
            rgb_shift_amount: 0.003,
            rgb_shift_angle: 0.0,
            rotation_scale: PI * 0.3,
            rotation_duration: Duration::from_millis(1800),
            rotation_easing: Easing::Power3Out,
            msaa_samples: 4,
            clear_colour: wgpu::Color::TRANSPARENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_shipped_scene() {
        let config = ViewerConfig::default();
        assert_eq!(config.fov_y, cgmath::Deg(40.0));
        assert_eq!(config.camera_distance, 3.5);
        assert_eq!(config.max_pixel_ratio, 2.0);
        assert_eq!(config.rgb_shift_amount, 0.003);
        assert_eq!(config.rotation_duration, Duration::from_millis(1800));
        assert_eq!(config.rotation_easing, Easing::Power3Out);
        assert!((config.rotation_scale - PI * 0.3).abs() < f32::EPSILON);
        assert!(config.hdri_url.ends_with(".hdr"));
    }
}
