#![cfg(feature = "integration-tests")]

mod common;

use common::test_utils::{HEIGHT, Headless, WIDTH, block_on};
use helmet_viewer::{composer::Pass, config::ViewerConfig};

#[test]
fn should_render_clear_colour() {
    block_on(async {
        let gpu = Headless::new().await.expect("No graphics adapter for the test.");
        let config = ViewerConfig {
            clear_colour: wgpu::Color::WHITE,
            ..Default::default()
        };
        let (mut renderer, scene) = gpu.viewer(&config);

        // Without a model the scene pass only clears, and shifting a uniform
        // image leaves it unchanged.
        for _ in 0..3 {
            renderer.render(&gpu.device, &gpu.queue, &scene, &gpu.target.view);
        }
        let image = gpu.read_target().await.expect("Readback failed.");
        assert_eq!((image.width(), image.height()), (WIDTH, HEIGHT));
        for pixel in image.pixels() {
            assert_eq!(*pixel, image::Rgba([255, 255, 255, 255]));
        }
    });
}

#[test]
fn resize_reaches_every_pass() {
    block_on(async {
        let gpu = Headless::new().await.expect("No graphics adapter for the test.");
        let (mut renderer, _) = gpu.viewer(&ViewerConfig::default());
        assert_eq!(renderer.composer.passes().len(), 2);

        renderer.resize(&gpu.device, &gpu.queue, 128, 32);
        assert_eq!(renderer.composer.size(), (128, 32));
        for pass in renderer.composer.passes() {
            assert_eq!(pass.size(), (128, 32), "{} kept its old size", pass.name());
        }
        assert!((renderer.camera.projection.aspect() - 4.0).abs() < 1e-6);
    });
}
