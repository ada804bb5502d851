//! Pointer driven model rotation.
//!
//! The cursor position inside the viewport is mapped to a pair of Euler angles
//! and the model is tweened towards them. The mapping is symmetric around the
//! viewport centre and bounded by half of the configured rotation scale.

use cgmath::{Rad, Vector2};
use instant::Duration;
use winit::dpi::{PhysicalPosition, PhysicalSize};

use crate::{
    animation::{Easing, Tween},
    config::ViewerConfig,
};

/// Rotation around the X (pitch) and Y (yaw) axes in radians.
pub type Rotation = Vector2<f32>;

pub fn to_quaternion(rotation: Rotation) -> cgmath::Quaternion<f32> {
    cgmath::Euler::new(Rad(rotation.x), Rad(rotation.y), Rad(0.0)).into()
}

#[derive(Clone, Copy, Debug)]
pub struct PointerMapping {
    pub scale: f32,
}

impl PointerMapping {
    /// Target angles for a cursor at `cursor` in a viewport of size `viewport`.
    ///
    /// Vertical offset drives the X axis, horizontal offset the Y axis. Positions
    /// outside of the viewport are clamped to its border.
    pub fn target(&self, cursor: PhysicalPosition<f64>, viewport: PhysicalSize<u32>) -> Rotation {
        if viewport.width == 0 || viewport.height == 0 {
            return Rotation::new(0.0, 0.0);
        }
        let nx = (cursor.x / viewport.width as f64).clamp(0.0, 1.0) as f32;
        let ny = (cursor.y / viewport.height as f64).clamp(0.0, 1.0) as f32;
        Rotation::new((ny - 0.5) * self.scale, (nx - 0.5) * self.scale)
    }
}

#[derive(Clone, Debug)]
pub struct RotationControl {
    mapping: PointerMapping,
    duration: Duration,
    easing: Easing,
    tween: Tween<Rotation>,
    /// A retarget the next update hasn't reported yet.
    dirty: bool,
}

impl RotationControl {
    pub fn new(mapping: PointerMapping, duration: Duration, easing: Easing) -> Self {
        Self {
            mapping,
            duration,
            easing,
            tween: Tween::new(Rotation::new(0.0, 0.0)),
            dirty: false,
        }
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(
            PointerMapping {
                scale: config.rotation_scale,
            },
            config.rotation_duration,
            config.rotation_easing,
        )
    }

    /// Retargets the rotation towards the cursor.
    ///
    /// Returns `false` without touching the animation when there is no model to
    /// rotate yet.
    pub fn pointer_moved(
        &mut self,
        model_present: bool,
        cursor: PhysicalPosition<f64>,
        viewport: PhysicalSize<u32>,
    ) -> bool {
        if !model_present {
            return false;
        }
        let target = self.mapping.target(cursor, viewport);
        self.tween.to(target, self.duration, self.easing);
        self.dirty = true;
        true
    }

    /// Advances the animation. Returns the new rotation whenever it changed
    /// since the last update.
    pub fn update(&mut self, dt: Duration) -> Option<Rotation> {
        if !self.tween.is_animating() && !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.tween.advance(dt))
    }

    pub fn rotation(&self) -> Rotation {
        self.tween.value()
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_animating()
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    const VIEWPORT: PhysicalSize<u32> = PhysicalSize::new(1280, 720);

    fn control() -> RotationControl {
        RotationControl::from_config(&ViewerConfig::default())
    }

    #[test]
    fn centre_maps_to_no_rotation() {
        let mapping = PointerMapping { scale: PI * 0.3 };
        for size in [PhysicalSize::new(1280, 720), PhysicalSize::new(3, 5), PhysicalSize::new(1, 1)] {
            let centre = PhysicalPosition::new(size.width as f64 / 2.0, size.height as f64 / 2.0);
            assert_eq!(mapping.target(centre, size), Rotation::new(0.0, 0.0));
        }
    }

    #[test]
    fn rotation_is_bounded_by_half_the_scale() {
        let mapping = PointerMapping { scale: PI * 0.3 };
        let bound = PI * 0.3 / 2.0 + 1e-6;
        for x in (-200..=1500).step_by(50) {
            for y in (-200..=1000).step_by(50) {
                let target = mapping.target(PhysicalPosition::new(x as f64, y as f64), VIEWPORT);
                assert!(target.x.abs() <= bound, "x out of bounds at ({x}, {y})");
                assert!(target.y.abs() <= bound, "y out of bounds at ({x}, {y})");
            }
        }
    }

    #[test]
    fn corners_are_symmetric() {
        let mapping = PointerMapping { scale: 1.0 };
        let top_left = mapping.target(PhysicalPosition::new(0.0, 0.0), VIEWPORT);
        let bottom_right = mapping.target(PhysicalPosition::new(1280.0, 720.0), VIEWPORT);
        assert_eq!(top_left, Rotation::new(-0.5, -0.5));
        assert_eq!(bottom_right, -top_left);
    }

    #[test]
    fn degenerate_viewport_yields_no_rotation() {
        let mapping = PointerMapping { scale: 1.0 };
        let target = mapping.target(PhysicalPosition::new(10.0, 10.0), PhysicalSize::new(0, 0));
        assert_eq!(target, Rotation::new(0.0, 0.0));
    }

    #[test]
    fn pointer_without_model_schedules_nothing() {
        let mut control = control();
        assert!(!control.pointer_moved(false, PhysicalPosition::new(0.0, 0.0), VIEWPORT));
        assert!(!control.is_animating());
        assert_eq!(control.update(Duration::from_millis(16)), None);
        assert_eq!(control.rotation(), Rotation::new(0.0, 0.0));
    }

    #[test]
    fn second_pointer_move_supersedes_the_first() {
        let mut control = control();
        assert!(control.pointer_moved(true, PhysicalPosition::new(0.0, 0.0), VIEWPORT));
        control.update(Duration::from_millis(16));
        assert!(control.pointer_moved(true, PhysicalPosition::new(1280.0, 720.0), VIEWPORT));

        let second = PointerMapping { scale: PI * 0.3 }
            .target(PhysicalPosition::new(1280.0, 720.0), VIEWPORT);
        let mut last = control.rotation();
        for _ in 0..200 {
            if let Some(rotation) = control.update(Duration::from_millis(16)) {
                last = rotation;
            }
        }
        assert!(!control.is_animating());
        assert_eq!(last, second);
    }

    #[test]
    fn instant_rotation_is_reported_once() {
        let mut control = RotationControl::new(
            PointerMapping { scale: 1.0 },
            Duration::ZERO,
            Easing::Power3Out,
        );
        let viewport = PhysicalSize::new(100, 100);
        assert!(control.pointer_moved(true, PhysicalPosition::new(0.0, 0.0), viewport));
        assert!(!control.is_animating());
        assert_eq!(
            control.update(Duration::from_millis(16)),
            Some(Rotation::new(-0.5, -0.5))
        );
        assert_eq!(control.update(Duration::from_millis(16)), None);
    }

    #[test]
    fn quaternion_of_zero_rotation_is_identity() {
        use cgmath::One;
        let q = to_quaternion(Rotation::new(0.0, 0.0));
        assert_eq!(q, cgmath::Quaternion::one());
    }
}
