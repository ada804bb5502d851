#![cfg(feature = "integration-tests")]

mod common;

use common::test_utils::{Headless, block_on};
use helmet_viewer::{
    config::ViewerConfig,
    data_structures::environment::mip_count,
    pipelines::pmrem::PmremGenerator,
    resources::environment::HdrImage,
};

fn grey_panorama(width: u32, height: u32) -> HdrImage {
    HdrImage {
        width,
        height,
        pixels: [0.5, 0.5, 0.5, 1.0].repeat((width * height) as usize),
    }
}

#[test]
fn prefiltered_cube_has_a_mip_per_roughness_step() {
    block_on(async {
        let gpu = Headless::new().await.expect("No graphics adapter for the test.");
        let mut generator = PmremGenerator::new(&gpu.device);
        let map = generator.from_equirectangular(&gpu.device, &gpu.queue, &grey_panorama(128, 64), 256);
        generator.dispose();

        assert_eq!(map.size, 256);
        assert_eq!(map.mip_level_count, mip_count(256));
        assert_eq!(map.mip_level_count, 5);
        assert_eq!(map.max_mip(), 4.0);
        assert_eq!(map.texture.depth_or_array_layers(), 6);
    });
}

#[test]
fn environment_replaces_the_placeholder() {
    block_on(async {
        let gpu = Headless::new().await.expect("No graphics adapter for the test.");
        let config = ViewerConfig::default();
        let (mut renderer, mut scene) = gpu.viewer(&config);
        assert!(!scene.lighting.has_environment());

        let mut generator = PmremGenerator::new(&gpu.device);
        let map = generator.from_equirectangular(&gpu.device, &gpu.queue, &grey_panorama(64, 32), 32);
        generator.dispose();
        scene.set_environment(&gpu.device, &gpu.queue, map);

        assert!(scene.lighting.has_environment());
        assert_eq!(scene.lighting.uniform.max_mip, 1.0);
        // Still renders with the new bind group in place.
        renderer.render(&gpu.device, &gpu.queue, &scene, &gpu.target.view);
        gpu.read_target().await.expect("Readback failed.");
    });
}
